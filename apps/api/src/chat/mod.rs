//! Chat: question answering over the candidate's resume.
//!
//! `ChatOrchestrator` drives one turn through the input gate, retrieval,
//! prompt assembly and streamed generation, then records it in the session.
//! Pre-stream failures are returned as `ChatError`; failures after the
//! stream has started are reported as a single `error` event.

use std::time::Duration;

use thiserror::Error;

use crate::guardrails::BlockCategory;
use crate::llm_client::LlmError;
use crate::retrieval::RetrievalError;

pub mod events;
pub mod handlers;
pub mod orchestrator;
pub mod prompts;
pub mod query_rewrite;
pub mod suggestions;

pub use events::{StreamEvent, TurnStats};
pub use orchestrator::{ChatOrchestrator, ChatReply, ChatRequest, ChatSettings, ChatStream};

#[derive(Debug, Error)]
pub enum ChatError {
    /// Empty or oversized input. Carries the helpful response for the caller.
    #[error("input rejected ({category:?})")]
    InputRejected {
        category: BlockCategory,
        response: String,
        suggested_questions: Vec<String>,
    },

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("generation exceeded the {0:?} deadline")]
    Timeout(Duration),
}

impl ChatError {
    /// Safe to show to the caller; never includes internal detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ChatError::InputRejected { .. } => "Please enter a question about the candidate.",
            ChatError::Retrieval(RetrievalError::Unavailable(_)) => {
                "Search service unavailable. Please try again later."
            }
            ChatError::Retrieval(RetrievalError::Backend(_)) => {
                "Search service error. Please try again later."
            }
            ChatError::Llm(LlmError::Auth(_)) => {
                "AI service not configured. Please contact the administrator."
            }
            ChatError::Llm(LlmError::RateLimited(_)) => {
                "The AI service is receiving too many requests. Please wait a moment and try again."
            }
            ChatError::Llm(_) => "The AI service encountered an error. Please try again.",
            ChatError::Timeout(_) => "The response took too long and was stopped. Please try again.",
        }
    }
}
