//! Inference API client.
//!
//! Speaks the chat-completions wire format with JSON-object replies. Prompt
//! construction and reply validation live in [`crate::coaching`]; this module
//! only moves a system/user message pair over the wire and hands back the
//! assistant's raw text.

use crate::config::InferenceConfig;
use crate::hevy::classify_failure;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Service name used in error messages
pub const SERVICE_NAME: &str = "OpenAI";

/// One JSON-mode completion request
#[derive(Clone, Debug, PartialEq)]
pub struct JsonCompletion {
    pub system: String,
    pub user: String,
    pub max_tokens: Option<u32>,
}

/// Backend able to answer a system/user prompt with JSON text
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run the completion and return the assistant message content
    async fn complete_json(&self, request: &JsonCompletion) -> Result<String>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_request<'a>(model: &'a str, completion: &'a JsonCompletion) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: [
            ChatMessage {
                role: "system",
                content: &completion.system,
            },
            ChatMessage {
                role: "user",
                content: &completion.user,
            },
        ],
        response_format: ResponseFormat {
            format_type: "json_object",
        },
        max_tokens: completion.max_tokens,
    }
}

/// Pull the first choice's content out of a chat-completions body
fn extract_content(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("Unexpected inference response: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| Error::Parse("Inference response contained no message content".into()))
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// HTTP client for an OpenAI-compatible chat-completions endpoint
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    /// Create a client for the configured endpoint and model
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &InferenceConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("spotter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl InferenceBackend for OpenAiClient {
    async fn complete_json(&self, request: &JsonCompletion) -> Result<String> {
        debug!(
            "Requesting completion from {} (prompt {} chars)",
            self.model,
            request.user.len()
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&build_request(&self.model, request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Inference request failed with status {}: {}", status, body);
            return Err(classify_failure(SERVICE_NAME, status, body));
        }

        let body = response.text().await?;
        extract_content(&body)
    }
}
