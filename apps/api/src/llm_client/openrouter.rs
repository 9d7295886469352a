use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{BackendPolicy, Config};
use crate::llm_client::sse::{parse_data_line, LineBuffer, UpstreamEvent};
use crate::llm_client::{
    ChatMessage, ChunkStream, Generation, LlmError, LlmProvider, StreamChunk,
};

/// Non-streaming calls get one retry on transient failures.
const MAX_RETRIES: u32 = 1;
const RETRY_DELAY: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const APP_TITLE: &str = "Resume Chat";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Strict-policy provider: an OpenAI-compatible chat-completions endpoint
/// (OpenRouter by default).
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    request_timeout: Duration,
}

impl OpenRouterClient {
    /// Only the connect phase has a client-wide timeout. Non-streaming calls
    /// get `request_timeout` per request; streams are bounded by the caller.
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: config.openrouter_api_key.clone(),
            base_url: config.openrouter_base_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
            max_tokens: config.llm_max_tokens,
            temperature: config.llm_temperature,
            request_timeout: config.request_timeout,
        }
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage], stream: bool) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        }
    }

    fn completion_request(&self, messages: &[ChatMessage], stream: bool) -> RequestBuilder {
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", APP_TITLE)
            .json(&self.request(messages, stream));

        if stream {
            builder
        } else {
            builder.timeout(self.request_timeout)
        }
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Auth("OpenRouter API key not configured".to_string()));
        }

        let response = self.completion_request(messages, stream).send().await?;
        check_status(response).await
    }

    async fn generate_once(&self, messages: &[ChatMessage]) -> Result<Generation, LlmError> {
        let response = self.send(messages, false).await?;
        let body: CompletionResponse = response.json().await?;

        let tokens_used = body.usage.map(|u| u.total_tokens).unwrap_or(0);
        let choice = body.choices.into_iter().next().ok_or(LlmError::EmptyContent)?;
        let text = choice.message.content.ok_or(LlmError::EmptyContent)?;

        debug!(
            tokens_used,
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "LLM completion received"
        );

        Ok(Generation { text, tokens_used })
    }
}

#[async_trait]
impl LlmProvider for OpenRouterClient {
    /// Retries once on network and 5xx errors; 401 and 429 fail immediately.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation, LlmError> {
        let started = Instant::now();
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let mut attempt = 0;

        loop {
            match self.generate_once(messages).await {
                Ok(generation) => {
                    info!(
                        model = %self.model,
                        stream = false,
                        prompt_chars,
                        tokens_used = generation.tokens_used,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "LLM call succeeded"
                    );
                    return Ok(generation);
                }
                Err(e) if e.is_transient() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    warn!(
                        "LLM call attempt {} failed ({}), retrying after {}ms...",
                        attempt,
                        e,
                        RETRY_DELAY.as_millis()
                    );
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Err(e) => {
                    warn!(
                        model = %self.model,
                        stream = false,
                        prompt_chars,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "LLM call failed: {e}"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let response = self.send(messages, true).await?;

        info!(
            model = %self.model,
            stream = true,
            prompt_chars,
            "LLM stream opened"
        );

        let state = StreamState {
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()))
                .boxed(),
            lines: LineBuffer::default(),
            pending: VecDeque::new(),
            tokens_used: 0,
            chunks: 0,
            started: Instant::now(),
            model: self.model.clone(),
            finished: false,
        };

        Ok(stream::unfold(state, next_chunk).boxed())
    }

    fn policy(&self) -> BackendPolicy {
        BackendPolicy::Strict
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming
// ─────────────────────────────────────────────────────────────────────────────

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    lines: LineBuffer,
    pending: VecDeque<String>,
    tokens_used: u32,
    chunks: usize,
    started: Instant,
    model: String,
    finished: bool,
}

impl StreamState {
    fn log_completion(&self, finish_reason: &str) {
        info!(
            model = %self.model,
            stream = true,
            chunks = self.chunks,
            tokens_used = self.tokens_used,
            latency_ms = self.started.elapsed().as_millis() as u64,
            finish_reason,
            "LLM stream completed"
        );
    }
}

async fn next_chunk(
    mut state: StreamState,
) -> Option<(Result<StreamChunk, LlmError>, StreamState)> {
    loop {
        if state.finished {
            return None;
        }

        while let Some(line) = state.pending.pop_front() {
            match parse_data_line(&line) {
                Some(UpstreamEvent::Done) => {
                    state.finished = true;
                    state.log_completion("stop");
                    let chunk = StreamChunk {
                        content: String::new(),
                        finish_reason: Some("stop".to_string()),
                        tokens_used: state.tokens_used,
                    };
                    return Some((Ok(chunk), state));
                }
                Some(UpstreamEvent::Delta {
                    content,
                    finish_reason,
                    total_tokens,
                }) => {
                    if let Some(total) = total_tokens {
                        state.tokens_used = total;
                    }
                    if content.is_empty() && finish_reason.is_none() {
                        continue;
                    }
                    state.chunks += 1;
                    let chunk = StreamChunk {
                        content,
                        finish_reason,
                        tokens_used: state.tokens_used,
                    };
                    return Some((Ok(chunk), state));
                }
                None => {}
            }
        }

        match state.body.next().await {
            Some(Ok(bytes)) => {
                let lines = state.lines.push(&bytes);
                state.pending.extend(lines);
            }
            Some(Err(e)) => {
                state.finished = true;
                warn!(model = %state.model, chunks = state.chunks, "LLM stream failed: {e}");
                return Some((Err(LlmError::Http(e)), state));
            }
            None => match state.lines.finish() {
                Some(rest) => state.pending.push_back(rest),
                None => {
                    state.finished = true;
                    state.log_completion("eof");
                    return None;
                }
            },
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // Try to parse error message
    let message = serde_json::from_str::<ProviderError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    match status.as_u16() {
        401 => Err(LlmError::Auth(message)),
        429 => Err(LlmError::RateLimited(message)),
        code => Err(LlmError::Api {
            status: code,
            message,
        }),
    }
}
