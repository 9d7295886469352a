use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::chat::ChatError;
use crate::fit::FitError;
use crate::llm_client::LlmError;
use crate::retrieval::RetrievalError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Rejected by the input guardrail. Carries a helpful response and
    /// suggested questions; never the rejected text.
    #[error("Input rejected: {message}")]
    InputRejected {
        message: String,
        response: String,
        suggested_questions: Vec<String>,
    },

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("LLM not configured: {0}")]
    LlmNotConfigured(String),

    #[error("LLM rate limited: {0}")]
    LlmRateLimited(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Generation timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InputRejected { message, .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message.clone())
            }
            AppError::RetrievalUnavailable(msg) => {
                tracing::error!("Retrieval unavailable: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "RETRIEVAL_UNAVAILABLE",
                    "Search service unavailable. Please try again later.".to_string(),
                )
            }
            AppError::Retrieval(msg) => {
                tracing::error!("Retrieval error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "RETRIEVAL_ERROR",
                    "Search service error. Please try again later.".to_string(),
                )
            }
            AppError::LlmNotConfigured(msg) => {
                tracing::error!("LLM not configured: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "LLM_NOT_CONFIGURED",
                    "AI service not configured. Please contact the administrator.".to_string(),
                )
            }
            AppError::LlmRateLimited(msg) => {
                tracing::warn!("LLM rate limited: {msg}");
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    "LLM_RATE_LIMITED",
                    "The AI service is receiving too many requests. Please wait a moment and try again."
                        .to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "TIMEOUT",
                "The response took too long and was stopped. Please try again.".to_string(),
            ),
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Too many requests. Please retry in {retry_after_secs} seconds."),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        if let AppError::InputRejected {
            response,
            suggested_questions,
            ..
        } = &self
        {
            body["error"]["response"] = json!(response);
            body["error"]["suggested_questions"] = json!(suggested_questions);
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = retry_after_secs.to_string().parse() {
                response.headers_mut().insert("retry-after", value);
            }
        }
        response
    }
}

impl From<RetrievalError> for AppError {
    fn from(e: RetrievalError) -> Self {
        match e {
            RetrievalError::Unavailable(msg) => AppError::RetrievalUnavailable(msg),
            RetrievalError::Backend(msg) => AppError::Retrieval(msg),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Auth(msg) => AppError::LlmNotConfigured(msg),
            LlmError::RateLimited(msg) => AppError::LlmRateLimited(msg),
            other => AppError::Llm(other.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::InputRejected {
                category,
                response,
                suggested_questions,
            } => AppError::InputRejected {
                message: category.describe().to_string(),
                response,
                suggested_questions,
            },
            ChatError::Retrieval(e) => e.into(),
            ChatError::Llm(e) => e.into(),
            ChatError::Timeout(_) => AppError::Timeout,
        }
    }
}

impl From<FitError> for AppError {
    fn from(e: FitError) -> Self {
        match e {
            FitError::Validation(msg) => AppError::Validation(msg),
            // The handler attaches a helpful response; this is the bare mapping.
            FitError::InputRejected(category) => AppError::InputRejected {
                message: category.describe().to_string(),
                response: String::new(),
                suggested_questions: Vec::new(),
            },
            FitError::Retrieval(e) => e.into(),
            FitError::Llm(e) => e.into(),
            FitError::Timeout(_) => AppError::Timeout,
        }
    }
}
