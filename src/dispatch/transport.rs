//! Transport traits and their HTTP implementations.
//!
//! [`ChatTransport`] calls any OpenAI-compatible `/v1/chat/completions`
//! endpoint; [`SpeechTransport`] calls an ElevenLabs-style text-to-speech
//! endpoint.  Both are async traits so tests can substitute in-memory
//! doubles.  All connection details come from configuration; nothing is
//! hardcoded.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{LlmConfig, TtsConfig};
use crate::template::CallOptions;

use super::outcome::DispatchError;

// ---------------------------------------------------------------------------
// WireMessage
// ---------------------------------------------------------------------------

/// One message in the outgoing chat-completions payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: &'static str,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport traits
// ---------------------------------------------------------------------------

/// Async seam for LLM text calls.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ChatTransport>` across the dispatcher and pipeline.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the message list and return the assistant's reply text.
    async fn complete(
        &self,
        messages: &[WireMessage],
        options: &CallOptions,
    ) -> Result<String, DispatchError>;
}

/// Async seam for speech synthesis calls.
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// Synthesize `text` with `voice_id` and return the audio bytes.
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, DispatchError>;
}

// ---------------------------------------------------------------------------
// Request body construction
// ---------------------------------------------------------------------------

/// Build the chat-completions JSON body for `options.model`.
///
/// Models in the `gpt-5` family take `max_completion_tokens` instead of
/// `max_tokens`, and only `gpt-5-chat-latest` accepts a custom temperature;
/// other providers silently ignore options they do not support, which is
/// tolerated by design.
pub(crate) fn chat_body(messages: &[WireMessage], options: &CallOptions) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": options.model,
        "messages": messages,
        "stream": false,
    });

    if options.model.to_lowercase().contains("gpt-5") {
        body["max_completion_tokens"] = options.max_output_tokens.into();
        if options.model == "gpt-5-chat-latest" {
            body["temperature"] = options.temperature.into();
        }
    } else {
        body["max_tokens"] = options.max_output_tokens.into();
        body["temperature"] = options.temperature.into();
    }

    body
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Classify a non-success HTTP response into a [`DispatchError`].
///
/// Consumes the response to pull the provider's error detail out of the
/// body (`error.message` or `detail`, falling back to the raw text).
pub(crate) async fn classify_error(response: reqwest::Response) -> DispatchError {
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(std::time::Duration::from_secs);
        return DispatchError::RateLimited { retry_after };
    }

    if status.as_u16() == 401 || status.as_u16() == 403 {
        return DispatchError::Auth;
    }

    let transient = status.is_server_error();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("detail"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });

    DispatchError::Provider {
        code: status.as_u16(),
        detail,
        transient,
    }
}

// ---------------------------------------------------------------------------
// OpenAiChatTransport
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiChatTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChatTransport {
    /// Build a transport from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ChatTransport for OpenAiChatTransport {
    async fn complete(
        &self,
        messages: &[WireMessage],
        options: &CallOptions,
    ) -> Result<String, DispatchError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = chat_body(messages, options);

        let mut req = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let response = req.send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }

        let status = response.status().as_u16();
        let json: serde_json::Value = response.json().await.map_err(|e| {
            DispatchError::Provider {
                code: status,
                detail: format!("unparseable response body: {e}"),
                transient: false,
            }
        })?;

        let text = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or(DispatchError::EmptyReply)?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(DispatchError::EmptyReply);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// ElevenLabsSpeechTransport
// ---------------------------------------------------------------------------

/// Calls an ElevenLabs-style `/v1/text-to-speech/{voice}` endpoint and
/// returns the raw audio bytes.
pub struct ElevenLabsSpeechTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ElevenLabsSpeechTransport {
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl SpeechTransport for ElevenLabsSpeechTransport {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, DispatchError> {
        let url = format!("{}/v1/text-to-speech/{voice_id}", self.base_url);
        let body = serde_json::json!({
            "text": text,
            "model_id": self.model,
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(DispatchError::EmptyReply);
        }
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
