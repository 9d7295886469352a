//! Axum route handlers for the Chat API.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Extension, Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::suggestions::{suggested_questions, SuggestedQuestion};
use crate::chat::{ChatRequest, StreamEvent};
use crate::errors::AppError;
use crate::middleware::TraceId;
use crate::models::CandidateProfile;
use crate::retrieval::load_profile;
use crate::state::AppState;

pub const SESSION_ID_HEADER: &str = "x-session-id";

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SuggestedQuestionsQuery {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct SuggestedQuestionsResponse {
    pub questions: Vec<SuggestedQuestion>,
}

#[derive(Debug, Serialize)]
pub struct ClearSessionResponse {
    pub session_id: Uuid,
    pub cleared: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat
///
/// Streams the answer as SSE by default; `stream: false` returns one JSON reply.
/// The session id is returned in `X-Session-ID` for streamed replies.
pub async fn handle_chat(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Json(body): Json<ChatBody>,
) -> Result<Response, AppError> {
    info!(
        message_chars = body.message.chars().count(),
        stream = body.stream,
        has_session = body.session_id.is_some(),
        "Chat request received"
    );

    let request = ChatRequest {
        message: body.message,
        session_id: body.session_id,
        trace_id: trace_id.0,
    };

    if !body.stream {
        let reply = state.chat.complete(request).await?;
        return Ok(Json(reply).into_response());
    }

    let stream = state.chat.stream(request).await?;
    let session_id = stream.session_id;
    let events = stream.events.map(|event| Ok::<Event, Infallible>(frame(&event)));

    let mut response = Sse::new(events)
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&session_id.to_string()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}

/// GET /api/v1/suggested-questions?session_id=
///
/// Questions the caller has not asked yet in this session. Never empty.
pub async fn handle_suggested_questions(
    State(state): State<AppState>,
    Query(query): Query<SuggestedQuestionsQuery>,
) -> Json<SuggestedQuestionsResponse> {
    let profile = load_profile(state.retrieval.as_ref()).await;
    let session = query.session_id.and_then(|id| state.sessions.get(id));
    Json(SuggestedQuestionsResponse {
        questions: suggested_questions(profile.as_ref(), session.as_ref()),
    })
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
) -> Result<Json<CandidateProfile>, AppError> {
    state
        .retrieval
        .profile()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Candidate profile not found".to_string()))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_clear_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<(StatusCode, Json<ClearSessionResponse>), AppError> {
    if !state.sessions.clear(session_id) {
        return Err(AppError::NotFound(format!("Session {session_id} not found")));
    }
    info!(%session_id, "Session cleared");
    Ok((
        StatusCode::OK,
        Json(ClearSessionResponse {
            session_id,
            cleared: true,
        }),
    ))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn frame(event: &StreamEvent) -> Event {
    event.to_sse().unwrap_or_else(|e| {
        error!(error = %e, event = event.name(), "Failed to encode stream event");
        Event::default().data(r#"{"type":"error","error":"Failed to encode response."}"#)
    })
}
