//! LLM client: the single point of entry for all chat-completion calls.
//!
//! ARCHITECTURAL RULE: No other module may call the LLM provider directly.
//! All LLM interactions MUST go through an `Arc<dyn LlmProvider>` built by `from_policy`.
//!
//! Policy is resolved once at startup. A strict provider never falls back to
//! simulated output; misconfiguration surfaces as `LlmError::Auth`.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;

use crate::config::{BackendPolicy, Config};

pub mod openrouter;
pub mod simulated;
pub mod sse;

pub use openrouter::OpenRouterClient;
pub use simulated::SimulatedLlm;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Network failures and 5xx responses are worth one more attempt.
    /// Auth and rate-limit failures never are.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A complete, non-streamed completion.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u32,
}

/// One fragment of a streamed completion. `finish_reason` marks the end of
/// the text; the token total may only arrive in a later, content-free chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    pub finish_reason: Option<String>,
    pub tokens_used: u32,
}

pub type ChunkStream = BoxStream<'static, Result<StreamChunk, LlmError>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation, LlmError>;

    /// Dropping the returned stream releases the upstream connection.
    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError>;

    fn policy(&self) -> BackendPolicy;

    fn model(&self) -> &str;
}

/// Builds the provider selected by `config.llm_policy`.
pub fn from_policy(config: &Config) -> Arc<dyn LlmProvider> {
    match config.llm_policy {
        BackendPolicy::Strict => Arc::new(OpenRouterClient::new(config)),
        BackendPolicy::Simulated => Arc::new(SimulatedLlm::new(config.simulated_token_delay)),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub(crate) fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
