use std::time::Duration;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{AI_KEY_ENV_VAR, Config, DEFAULT_AI_ENDPOINT, DEFAULT_AI_MODEL};
use crate::notice::ConfigurationError;
use crate::summarize::ModelClient;

const SYSTEM_MESSAGE: &str = "You are a strict JSON summarization engine. Reply ONLY with a \
                              single JSON object, with no markdown, no backticks, and no extra \
                              text.";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(endpoint: &str, model: &str, api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .context("failed building HTTP client for summaries")?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let api_key = cfg
            .secret("ai.api_key", AI_KEY_ENV_VAR)
            .ok_or_else(ConfigurationError::missing_ai_key)?;
        let endpoint = cfg
            .get("ai.endpoint")
            .unwrap_or_else(|| DEFAULT_AI_ENDPOINT.to_string());
        let model = cfg
            .get("ai.model")
            .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string());
        Self::new(&endpoint, &model, &api_key)
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ModelClient for ChatCompletionsClient {
    #[tracing::instrument(skip_all, fields(model = %self.model, endpoint = %self.endpoint))]
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MESSAGE,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: 1024,
            temperature: 0.2,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("summary request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed reading summary response body")?;

        if !status.is_success() {
            warn!(status = %status, body = %text, "summary endpoint returned an error");
            return Err(anyhow!("summary request failed with status {status}"));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse chat completion: {text}"))?;
        debug!(choices = parsed.choices.len(), "received chat completion");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("summary response contained no message"))
    }
}
