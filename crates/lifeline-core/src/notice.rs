use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Error,
    Configuration,
}

/// User-facing notification: what the front end shows after an external
/// call finishes or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.severity, Severity::Error | Severity::Configuration)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// A missing or rejected credential. Carries the steps needed to fix it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{title}: {summary}")]
pub struct ConfigurationError {
    pub title: String,
    pub summary: String,
    pub steps: Vec<String>,
}

impl ConfigurationError {
    pub fn new(title: &str, summary: &str, steps: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            summary: summary.to_string(),
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn missing_ai_key() -> Self {
        Self::new(
            "AI summaries are not configured",
            "No API key is set for the summarization model.",
            &[
                "Create an API key with your model provider.",
                "Add `ai.api_key = <key>` to ~/.lifelinerc, or export LIFELINE_AI_API_KEY.",
                "Optionally set `ai.endpoint` and `ai.model` for a compatible provider.",
                "Run the summarize command again.",
            ],
        )
    }

    pub fn to_notice(&self) -> Notice {
        let mut message = self.summary.clone();
        for (idx, step) in self.steps.iter().enumerate() {
            message.push_str(&format!("\n  {}. {}", idx + 1, step));
        }
        Notice {
            severity: Severity::Configuration,
            title: self.title.clone(),
            message,
        }
    }
}
