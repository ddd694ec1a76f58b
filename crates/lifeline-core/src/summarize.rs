//! Natural-language summaries of a set of events.
//!
//! The model sits behind [`ModelClient`]; [`summarize`] builds the prompt,
//! makes exactly one call and turns anything unusable into
//! [`SummaryOutcome::Unavailable`] instead of an error. Only a malformed
//! request is an error.

use std::fmt::Write as _;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::event::Event;

pub const NOTHING_TO_SUMMARIZE: &str = "There are no events to summarize.";
pub const SUMMARY_FALLBACK: &str = "Sorry, a summary could not be generated right now.";

pub trait ModelClient {
    fn generate(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummarizeRequest {
    pub query: String,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SummarizeResponse {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SummarizeError {
    #[error("summary query cannot be empty")]
    EmptyQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    Transport(String),
    MalformedOutput(String),
    EmptySummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Generated(String),
    NothingToSummarize,
    Unavailable(UnavailableReason),
}

impl SummaryOutcome {
    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            SummaryOutcome::Generated(summary) => summary,
            SummaryOutcome::NothingToSummarize => NOTHING_TO_SUMMARIZE,
            SummaryOutcome::Unavailable(_) => SUMMARY_FALLBACK,
        }
    }
}

#[tracing::instrument(skip_all, fields(query_len = request.query.len(), events = request.events.len()))]
pub async fn summarize<M: ModelClient>(
    model: &M,
    request: &SummarizeRequest,
) -> Result<SummaryOutcome, SummarizeError> {
    if request.events.is_empty() {
        info!("no events to summarize; skipping model call");
        return Ok(SummaryOutcome::NothingToSummarize);
    }
    if request.query.trim().is_empty() {
        return Err(SummarizeError::EmptyQuery);
    }

    let prompt = build_prompt(request);
    debug!(prompt_len = prompt.len(), "sending summary prompt");

    let raw = match model.generate(&prompt).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "summary request failed");
            return Ok(SummaryOutcome::Unavailable(UnavailableReason::Transport(
                format!("{err:#}"),
            )));
        }
    };

    Ok(parse_model_output(&raw))
}

pub fn build_prompt(request: &SummarizeRequest) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are an assistant that summarizes entries from a personal timeline journal.\n\
         Answer the user's request using only the events listed below.\n\
         Output ONLY raw JSON, no prose, markdown, or code fences.\n\
         The JSON shape must be exactly:\n\
         {\"summary\":\"<string>\"}\n\n",
    );
    let _ = writeln!(prompt, "User request: \"{}\"", request.query.trim());
    prompt.push_str("\nEvents:\n");

    for event in &request.events {
        let _ = write!(
            prompt,
            "- Timestamp: {}, Type: {}",
            event.timestamp.to_rfc3339(),
            event.event_type
        );
        match event.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                let _ = write!(prompt, ", Description: {description}");
            }
            _ => prompt.push_str(", Description: (none)"),
        }
        if event.has_image() {
            prompt.push_str(" [has image]");
        }
        if event.has_attachment() {
            prompt.push_str(" [has attachment]");
        }
        prompt.push('\n');
    }

    prompt
}

pub fn parse_model_output(raw: &str) -> SummaryOutcome {
    let cleaned = strip_code_fence(raw.trim());

    match serde_json::from_str::<SummarizeResponse>(cleaned) {
        Ok(response) => {
            let summary = response.summary.trim();
            if summary.is_empty() {
                warn!("model returned an empty summary");
                SummaryOutcome::Unavailable(UnavailableReason::EmptySummary)
            } else {
                SummaryOutcome::Generated(summary.to_string())
            }
        }
        Err(err) => {
            warn!(error = %err, "model output did not match the summary schema");
            SummaryOutcome::Unavailable(UnavailableReason::MalformedOutput(err.to_string()))
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::event::{Attachment, EventDraft, EventType};
    use crate::timeline::Timeline;

    struct FakeModel {
        reply: anyhow::Result<String>,
        calls: AtomicUsize,
    }

    impl FakeModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(anyhow::anyhow!("connection refused")),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ModelClient for FakeModel {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    fn events() -> Vec<Event> {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 2, 10, 0, 0)
            .single()
            .expect("valid now");
        let mut timeline = Timeline::new();
        let mut draft = EventDraft::new(EventType::Todo, "Dentist");
        draft.description = Some("Book a cleaning".to_string());
        draft.attachment = Some(Attachment {
            name: "insurance.pdf".to_string(),
        });
        timeline.add(draft, now);
        timeline.into_events()
    }

    #[tokio::test]
    async fn empty_event_list_never_calls_the_model() {
        let model = FakeModel::replying("{\"summary\":\"unused\"}");
        for query in ["", "what happened?"] {
            let request = SummarizeRequest {
                query: query.to_string(),
                events: vec![],
            };
            let outcome = summarize(&model, &request).await.expect("outcome");
            assert_eq!(outcome, SummaryOutcome::NothingToSummarize);
            assert_eq!(outcome.text(), NOTHING_TO_SUMMARIZE);
        }
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn returns_generated_summary() {
        let model = FakeModel::replying("```json\n{\"summary\":\"One dentist to-do.\"}\n```");
        let request = SummarizeRequest {
            query: "What do I need to do?".to_string(),
            events: events(),
        };
        let outcome = summarize(&model, &request).await.expect("outcome");
        assert_eq!(outcome.text(), "One dentist to-do.");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unusable_output_falls_back() {
        let request = SummarizeRequest {
            query: "summary please".to_string(),
            events: events(),
        };

        let prose = FakeModel::replying("Sure! Here is your summary.");
        let outcome = summarize(&prose, &request).await.expect("outcome");
        assert!(matches!(
            outcome,
            SummaryOutcome::Unavailable(UnavailableReason::MalformedOutput(_))
        ));
        assert_eq!(outcome.text(), SUMMARY_FALLBACK);

        let blank = FakeModel::replying("{\"summary\":\"  \"}");
        assert_eq!(
            summarize(&blank, &request).await.expect("outcome"),
            SummaryOutcome::Unavailable(UnavailableReason::EmptySummary)
        );

        let down = FakeModel::failing();
        let outcome = summarize(&down, &request).await.expect("outcome");
        assert!(matches!(
            outcome,
            SummaryOutcome::Unavailable(UnavailableReason::Transport(_))
        ));
    }

    #[tokio::test]
    async fn blank_query_with_events_is_rejected() {
        let model = FakeModel::replying("{\"summary\":\"x\"}");
        let request = SummarizeRequest {
            query: "   ".to_string(),
            events: events(),
        };
        assert_eq!(
            summarize(&model, &request).await,
            Err(SummarizeError::EmptyQuery)
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn prompt_lists_events_with_presence_flags() {
        let request = SummarizeRequest {
            query: "recap".to_string(),
            events: events(),
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("User request: \"recap\""));
        assert!(prompt.contains(
            "- Timestamp: 2024-01-02T10:00:00+00:00, Type: todo, Description: Book a cleaning [has attachment]"
        ));
        assert!(!prompt.contains("[has image]"));
    }

    #[test]
    fn request_schema_uses_camel_case_events() {
        let request = SummarizeRequest {
            query: "recap".to_string(),
            events: events(),
        };
        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value["events"][0]["eventType"], "todo");
        assert_eq!(value["events"][0]["attachment"]["name"], "insurance.pdf");
    }
}
