pub mod health;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};

use crate::chat::handlers as chat;
use crate::fit::handlers as fit;
use crate::middleware::{rate_limit_middleware, trace_id_middleware};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    // Generation endpoints are rate limited per caller.
    let limited = Router::new()
        .route("/api/v1/chat", post(chat::handle_chat))
        .route("/api/v1/assess-fit", post(fit::handle_assess_fit))
        .route_layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(Extension(state.rate_limiter.clone()));

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/health", get(health::health_handler))
        .route("/api/v1/ready", get(health::ready_handler))
        .route("/api/v1/profile", get(chat::handle_get_profile))
        .route(
            "/api/v1/suggested-questions",
            get(chat::handle_suggested_questions),
        )
        .route("/api/v1/sessions/:id", delete(chat::handle_clear_session))
        .merge(limited)
        .layer(axum::middleware::from_fn(trace_id_middleware))
        .with_state(state)
}
