use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::config::BackendPolicy;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub retrieval_connected: bool,
    pub frame_count: Option<u64>,
    pub active_sessions: usize,
    pub version: &'static str,
    pub retrieval_policy: BackendPolicy,
    pub llm_policy: BackendPolicy,
}

/// GET /health, GET /api/v1/health
/// Degraded (still 200) when the retrieval backend cannot be reached.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let (retrieval_connected, frame_count) = match state.retrieval.health().await {
        Ok(health) => (health.serving, health.frame_count),
        Err(e) => {
            warn!(error = %e, "Retrieval health check failed");
            (false, None)
        }
    };

    Json(HealthResponse {
        status: if retrieval_connected { "healthy" } else { "degraded" },
        retrieval_connected,
        frame_count,
        active_sessions: state.sessions.stats().active_sessions,
        version: env!("CARGO_PKG_VERSION"),
        retrieval_policy: state.retrieval.policy(),
        llm_policy: state.llm.policy(),
    })
}

/// GET /api/v1/ready
/// 200 only when the retrieval backend is serving.
pub async fn ready_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let ready = matches!(state.retrieval.health().await, Ok(health) if health.serving);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "ready": ready })))
}
