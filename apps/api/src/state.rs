use std::sync::Arc;

use crate::chat::{ChatOrchestrator, ChatSettings};
use crate::config::Config;
use crate::fit::FitAssessmentEngine;
use crate::llm_client::{self, LlmProvider};
use crate::middleware::RateLimiter;
use crate::retrieval::{self, RetrievalGateway};
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionStore>,
    pub retrieval: Arc<dyn RetrievalGateway>,
    pub llm: Arc<dyn LlmProvider>,
    pub chat: ChatOrchestrator,
    pub fit: FitAssessmentEngine,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    /// Backends are chosen once here from the configured policies.
    pub fn new(config: Config) -> Self {
        let retrieval = retrieval::from_policy(&config);
        let llm = llm_client::from_policy(&config);
        Self::with_backends(config, retrieval, llm)
    }

    pub fn with_backends(
        config: Config,
        retrieval: Arc<dyn RetrievalGateway>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_ttl, config.max_sessions));
        let chat = ChatOrchestrator::new(
            sessions.clone(),
            retrieval.clone(),
            llm.clone(),
            ChatSettings::from_config(&config),
        );
        let fit = FitAssessmentEngine::new(retrieval.clone(), llm.clone(), config.request_timeout);
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);

        Self {
            config,
            sessions,
            retrieval,
            llm,
            chat,
            fit,
            rate_limiter,
        }
    }
}
