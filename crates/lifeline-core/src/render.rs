use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono_tz::Tz;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datetime::{format_local, local_date};
use crate::event::{Event, EventType};
use crate::media::describe_image;
use crate::notice::{Notice, Severity};

const TITLE_COLUMN_WIDTH: usize = 40;
const DETAIL_COLUMN_WIDTH: usize = 48;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    tz: Tz,
}

impl Renderer {
    pub fn new(cfg: &Config, tz: Tz) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color, tz })
    }

    pub fn plain(tz: Tz) -> Self {
        Self { color: false, tz }
    }

    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    pub fn print_event_table(&self, events: &[&Event]) -> anyhow::Result<()> {
        self.write_event_table(io::stdout().lock(), events)
    }

    pub fn write_event_table<W: Write>(&self, writer: W, events: &[&Event]) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "When".to_string(),
            "Type".to_string(),
            "Title".to_string(),
            "Details".to_string(),
        ];

        let rows = events
            .iter()
            .map(|event| {
                vec![
                    self.paint(event.short_id(), "33"),
                    format_local(event.timestamp, &self.tz, "%Y-%m-%d %H:%M"),
                    self.paint_type(event.event_type),
                    truncate(&event.title, TITLE_COLUMN_WIDTH),
                    truncate(&details(event), DETAIL_COLUMN_WIDTH),
                ]
            })
            .collect();

        write_table(writer, headers, rows)
    }

    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    pub fn print_timeline(&self, events: &[&Event]) -> anyhow::Result<()> {
        self.write_timeline(io::stdout().lock(), events)
    }

    /// Vertical timeline, one heading per local day.
    pub fn write_timeline<W: Write>(&self, mut writer: W, events: &[&Event]) -> anyhow::Result<()> {
        let mut current_day = None;

        for event in events {
            let day = local_date(event.timestamp, &self.tz);
            if current_day != Some(day) {
                if current_day.is_some() {
                    writeln!(writer, "│")?;
                }
                let heading = day.format("%A, %B %-d, %Y").to_string();
                writeln!(writer, "{}", self.paint(&heading, "1"))?;
                current_day = Some(day);
            }

            writeln!(
                writer,
                "├─ {} {} {}  {}",
                format_local(event.timestamp, &self.tz, "%H:%M"),
                self.paint_type(event.event_type),
                event.title,
                self.paint(event.short_id(), "90"),
            )?;
            if let Some(description) = event.description.as_deref() {
                for line in description.lines() {
                    writeln!(writer, "│    {line}")?;
                }
            }
            if let Some(image) = event.image_url.as_deref() {
                writeln!(writer, "│    image: {}", describe_image(image))?;
            }
            if let Some(attachment) = &event.attachment {
                writeln!(writer, "│    attachment: {}", attachment.name)?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, event), fields(id = %event.id))]
    pub fn print_event_info(&self, event: &Event) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "id          {}", event.id)?;
        writeln!(out, "type        {}", event.event_type.label())?;
        writeln!(out, "title       {}", event.title)?;
        writeln!(
            out,
            "timestamp   {}",
            format_local(event.timestamp, &self.tz, "%Y-%m-%d %H:%M:%S %Z")
        )?;
        if let Some(description) = event.description.as_deref() {
            writeln!(out, "description {description}")?;
        }
        if let Some(image) = event.image_url.as_deref() {
            writeln!(out, "image       {}", describe_image(image))?;
        }
        if let Some(attachment) = &event.attachment {
            writeln!(out, "attachment  {}", attachment.name)?;
        }

        Ok(())
    }

    pub fn print_notice(&self, notice: &Notice) -> anyhow::Result<()> {
        let code = match notice.severity {
            Severity::Success => "32",
            Severity::Info => "36",
            Severity::Error => "31",
            Severity::Configuration => "35",
        };
        let title = self.paint(&notice.title, code);
        if notice.is_failure() {
            let mut err = io::stderr().lock();
            writeln!(err, "{title}")?;
            writeln!(err, "{}", notice.message)?;
        } else {
            let mut out = io::stdout().lock();
            writeln!(out, "{title}")?;
            writeln!(out, "{}", notice.message)?;
        }
        Ok(())
    }

    fn paint_type(&self, event_type: EventType) -> String {
        let code = match event_type {
            EventType::Note => "34",
            EventType::Todo => "33",
            EventType::Schedule => "32",
        };
        self.paint(event_type.label(), code)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn details(event: &Event) -> String {
    let mut parts = Vec::new();
    if let Some(description) = event.description.as_deref() {
        let first_line = description.lines().next().unwrap_or_default();
        if !first_line.is_empty() {
            parts.push(first_line.to_string());
        }
    }
    if event.has_image() {
        parts.push("[image]".to_string());
    }
    if let Some(attachment) = &event.attachment {
        parts.push(format!("[{}]", attachment.name));
    }
    parts.join(" ")
}

/// Cuts `text` to at most `max` columns, ending in an ellipsis when cut.
fn truncate(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event::{Attachment, EventDraft};
    use crate::timeline::Timeline;

    fn timeline() -> Timeline {
        let mut timeline = Timeline::new();
        let first = Utc
            .with_ymd_and_hms(2024, 1, 1, 9, 30, 0)
            .single()
            .expect("valid");
        let second = Utc
            .with_ymd_and_hms(2024, 1, 2, 18, 5, 0)
            .single()
            .expect("valid");

        let mut note = EventDraft::new(EventType::Note, "Kickoff");
        note.description = Some("Agenda\nNotes".to_string());
        timeline.add(note, first);

        let mut todo = EventDraft::new(EventType::Todo, "Send report");
        todo.attachment = Some(Attachment {
            name: "q4.pdf".to_string(),
        });
        timeline.add(todo, second);
        timeline
    }

    #[test]
    fn table_aligns_columns_ignoring_color_codes() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["\x1b[33mxyz\x1b[0m".to_string(), "1".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A   B ");
        assert_eq!(lines[1], "--- - ");
        assert_eq!(strip_ansi(lines[2]), "xyz 1 ");
    }

    #[test]
    fn truncates_by_display_width() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("日本語テキスト", 6), "日本…");
    }

    #[test]
    fn timeline_groups_by_local_day() {
        let timeline = timeline();
        let events: Vec<&Event> = timeline.events().iter().collect();
        let mut out = Vec::new();
        Renderer::plain(chrono_tz::UTC)
            .write_timeline(&mut out, &events)
            .expect("timeline");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("Monday, January 1, 2024\n├─ 09:30 Note Kickoff"));
        assert!(text.contains("│    Agenda\n│    Notes\n"));
        assert!(text.contains("Tuesday, January 2, 2024\n├─ 18:05 To-Do Send report"));
        assert!(text.contains("│    attachment: q4.pdf"));
    }

    #[test]
    fn card_table_shows_details() {
        let timeline = timeline();
        let events: Vec<&Event> = timeline.events().iter().collect();
        let mut out = Vec::new();
        Renderer::plain(chrono_tz::UTC)
            .write_event_table(&mut out, &events)
            .expect("table");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.starts_with("ID "));
        assert!(text.contains("2024-01-01 09:30"));
        assert!(text.contains("Agenda"));
        assert!(text.contains("[q4.pdf]"));
    }
}
