//! Stream events produced by a chat turn and their SSE framing.
//!
//! Event types and field names are part of the client contract:
//! `retrieval`, `token` and `error` travel as `data: {"type": ...}` frames;
//! `stats` as `event: stats`; `end` as `event: end` with `data: [DONE]`.

use axum::response::sse::Event;
use serde::Serialize;

/// Sent as the data of the terminal `end` frame.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// At most once, before any token.
    Retrieval { chunks: usize },
    Token { content: String },
    Stats(TurnStats),
    Error { error: String },
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnStats {
    pub chunks_retrieved: usize,
    pub tokens_used: u32,
    pub elapsed_seconds: f64,
    pub trace_id: String,
}

impl TurnStats {
    pub fn new(chunks_retrieved: usize, tokens_used: u32, elapsed_secs: f64, trace_id: &str) -> Self {
        Self {
            chunks_retrieved,
            tokens_used,
            elapsed_seconds: (elapsed_secs * 100.0).round() / 100.0,
            trace_id: trace_id.to_string(),
        }
    }
}

impl StreamEvent {
    pub fn token(content: impl Into<String>) -> Self {
        StreamEvent::Token {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Retrieval { .. } => "retrieval",
            StreamEvent::Token { .. } => "token",
            StreamEvent::Stats(_) => "stats",
            StreamEvent::Error { .. } => "error",
            StreamEvent::End => "end",
        }
    }

    pub fn to_sse(&self) -> Result<Event, axum::Error> {
        match self {
            StreamEvent::Stats(stats) => Event::default().event("stats").json_data(stats),
            StreamEvent::End => Ok(Event::default().event("end").data(DONE_MARKER)),
            _ => Event::default().json_data(self),
        }
    }
}
