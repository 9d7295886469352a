//! Retrieval gateway: typed client contract to the external search service.
//!
//! Two implementations, chosen once at startup from `BackendPolicy`:
//! - `HttpRetrievalGateway` (strict): calls the search backend over HTTP and
//!   fails loudly with `RetrievalError::Unavailable` when it cannot be reached.
//! - `SimulatedRetrieval`: deterministic canned results for tests and local runs.
//!
//! `AppState` holds an `Arc<dyn RetrievalGateway>`; callers never branch on policy.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::{BackendPolicy, Config};
use crate::models::CandidateProfile;

pub mod http;
pub mod models;
pub mod simulated;

pub use http::HttpRetrievalGateway;
pub use models::{AskRequest, BackendHealth, Evidence, RetrievalResult, RetrievalStats, SearchMode};
pub use simulated::SimulatedRetrieval;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backend could not be reached at all (connect failure or timeout).
    #[error("retrieval backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered, but with an error or an unreadable payload.
    #[error("retrieval backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<RetrievalResult, RetrievalError>;

    async fn health(&self) -> Result<BackendHealth, RetrievalError>;

    /// Candidate profile card, if the corpus carries one.
    async fn profile(&self) -> Result<Option<CandidateProfile>, RetrievalError>;

    fn policy(&self) -> BackendPolicy;
}

/// Profile for prompts, guardrail text and suggestions. A failing backend
/// reads as "no profile" here; callers that need it strictly use `profile()`.
pub async fn load_profile(gateway: &dyn RetrievalGateway) -> Option<CandidateProfile> {
    gateway.profile().await.unwrap_or_else(|e| {
        warn!(error = %e, "Candidate profile unavailable");
        None
    })
}

/// Builds the gateway selected by `config.retrieval_policy`.
pub fn from_policy(config: &Config) -> Arc<dyn RetrievalGateway> {
    match config.retrieval_policy {
        BackendPolicy::Strict => Arc::new(HttpRetrievalGateway::new(
            config.retrieval_url.clone(),
            config.retrieval_timeout,
        )),
        BackendPolicy::Simulated => Arc::new(SimulatedRetrieval::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_load_profile_reads_unreachable_backend_as_absent() {
        let down = HttpRetrievalGateway::new("http://127.0.0.1:9".to_string(), Duration::from_secs(2));
        assert!(down.profile().await.is_err());
        assert!(load_profile(&down).await.is_none());

        let profile = load_profile(&SimulatedRetrieval::new()).await;
        assert_eq!(
            profile.as_ref().and_then(CandidateProfile::display_name),
            Some("Jordan Lee")
        );
    }
}
