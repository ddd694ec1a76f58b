use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, trace};

use crate::event::{Event, EventType};
use crate::range::{DateFilter, ResolvedRange, is_in_range, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(EventType),
}

impl TypeFilter {
    pub fn matches(self, event_type: EventType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(wanted) => wanted == event_type,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(TypeFilter::All);
        }
        s.parse::<EventType>().map(TypeFilter::Only)
    }
}

/// Read-only view over a timeline: type, date range and free text must all
/// match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub event_type: TypeFilter,
    pub date: DateFilter,
    pub search: Option<String>,
}

impl EventQuery {
    /// Parses filter terms: `type:<t>`, `range:<token>`; every other term is
    /// search text.
    #[tracing::instrument(skip(terms))]
    pub fn parse(terms: &[String]) -> anyhow::Result<Self> {
        let mut query = Self::default();
        let mut words = Vec::new();

        for term in terms {
            if let Some(value) = term.strip_prefix("type:") {
                query.event_type = value.parse()?;
            } else if let Some(value) = term
                .strip_prefix("range:")
                .or_else(|| term.strip_prefix("date:"))
            {
                query.date = value.parse()?;
            } else if term.is_empty() {
                continue;
            } else {
                words.push(term.as_str());
            }
        }

        if !words.is_empty() {
            query.search = Some(words.join(" "));
        }
        debug!(?query, "parsed event query");
        Ok(query)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.event_type == TypeFilter::All
            && self.date == DateFilter::All
            && self.search.as_deref().is_none_or(|s| s.trim().is_empty())
    }

    pub fn apply<'a>(&self, events: &'a [Event], now: DateTime<Utc>, tz: &Tz) -> Vec<&'a Event> {
        let range = resolve(self.date, now, tz);
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let out: Vec<&Event> = events
            .iter()
            .filter(|event| self.matches_with(event, &range, needle.as_deref()))
            .collect();
        trace!(total = events.len(), matched = out.len(), "applied event query");
        out
    }

    fn matches_with(&self, event: &Event, range: &ResolvedRange, needle: Option<&str>) -> bool {
        self.event_type.matches(event.event_type)
            && is_in_range(event.timestamp, range)
            && needle.is_none_or(|needle| text_matches(event, needle))
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let TypeFilter::Only(event_type) = self.event_type {
            parts.push(format!("type {event_type}"));
        }
        if self.date != DateFilter::All {
            parts.push(self.date.label().to_ascii_lowercase());
        }
        if let Some(search) = self.search.as_deref() {
            parts.push(format!("matching \"{search}\""));
        }
        if parts.is_empty() {
            "all events".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn text_matches(event: &Event, needle: &str) -> bool {
    event.title.to_lowercase().contains(needle)
        || event
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event::EventDraft;
    use crate::timeline::Timeline;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0)
            .single()
            .expect("valid instant")
    }

    fn sample() -> Timeline {
        let mut timeline = Timeline::new();
        timeline.add(EventDraft::new(EventType::Note, "Morning pages"), at(1, 10));
        let mut todo = EventDraft::new(EventType::Todo, "Buy milk");
        todo.description = Some("Oat, not Almond".to_string());
        timeline.add(todo, at(2, 10));
        timeline
    }

    #[test]
    fn today_selects_only_events_from_the_current_day() {
        let timeline = sample();
        let query = EventQuery {
            date: DateFilter::Today,
            ..EventQuery::default()
        };

        let hits = query.apply(timeline.events(), at(2, 12), &chrono_tz::UTC);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].event_type, EventType::Todo);
    }

    #[test]
    fn all_keeps_everything_in_order() {
        let timeline = sample();
        let hits = EventQuery::default().apply(timeline.events(), at(2, 12), &chrono_tz::UTC);
        let types: Vec<EventType> = hits.iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec![EventType::Note, EventType::Todo]);
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let timeline = sample();
        let now = at(2, 12);

        let by_title = EventQuery::parse(&["MORNING".to_string()]).expect("parse");
        assert_eq!(by_title.apply(timeline.events(), now, &chrono_tz::UTC).len(), 1);

        let by_description = EventQuery::parse(&["almond".to_string()]).expect("parse");
        let hits = by_description.apply(timeline.events(), now, &chrono_tz::UTC);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Buy milk");
    }

    #[test]
    fn criteria_intersect() {
        let timeline = sample();
        let query = EventQuery::parse(&[
            "type:note".to_string(),
            "range:last7days".to_string(),
            "milk".to_string(),
        ])
        .expect("parse");
        assert_eq!(query.event_type, TypeFilter::Only(EventType::Note));
        assert_eq!(query.date, DateFilter::Last7Days);
        assert!(query.apply(timeline.events(), at(2, 12), &chrono_tz::UTC).is_empty());
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(EventQuery::parse(&["range:someday".to_string()]).is_err());
        assert!(EventQuery::parse(&["type:meeting".to_string()]).is_err());
        assert!(EventQuery::parse(&[]).expect("parse").is_unconstrained());
    }
}
