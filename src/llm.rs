use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ModelOptions;
use crate::error::{self, AgentError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
}

/// Single-turn text completion. Implementations must bound their own latency.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    fn model_name(&self) -> &str;
}

/// Sends exactly one user message and returns the reply text.
pub async fn complete(model: &dyn LanguageModel, prompt: &str) -> Result<String, AgentError> {
    let request = ChatRequest {
        model: model.model_name().to_string(),
        messages: vec![ChatMessage::user(prompt)],
        stream: false,
    };
    let response = model.chat(&request).await?;
    Ok(response.message.content)
}

/// Drops reasoning blocks and markdown fences (with an optional `json` tag)
/// around a model reply, leaving the payload.
pub fn strip_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some((_, after)) = text.split_once("</think>") {
        text = after.trim();
    }

    if let Some(start) = text.find("```") {
        let inner = &text[start + 3..];
        let inner = inner
            .strip_prefix("json")
            .or_else(|| inner.strip_prefix("JSON"))
            .unwrap_or(inner);
        let end = inner.rfind("```").unwrap_or(inner.len());
        text = &inner[..end];
    }

    text.trim()
}

/// Chat client for an Ollama-compatible `/api/chat` endpoint.
pub struct OllamaClient {
    options: ModelOptions,
    client: wreq::Client,
}

impl OllamaClient {
    pub fn new(options: ModelOptions) -> Result<Self, AgentError> {
        let client = wreq::Client::builder()
            .timeout(Duration::from_secs(options.timeout))
            .build()
            .map_err(error::from_http_error)?;
        Ok(Self { options, client })
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let url = format!("{}/api/chat", self.options.base_url.trim_end_matches('/'));
        debug!(model = %request.model, messages = request.messages.len(), "sending chat request");

        let response = self
            .client
            .post(url.as_str())
            .json(request)
            .send()
            .await
            .map_err(error::from_http_error)?;

        let status = response.status();
        let body = response.text().await.map_err(error::from_http_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "language model request failed");
            return Err(AgentError::LanguageModel {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AgentError::Decode(e.to_string()))
    }

    fn model_name(&self) -> &str {
        &self.options.model
    }
}
