use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::BackendPolicy;
use crate::models::CandidateProfile;
use crate::retrieval::models::{
    AskRequest, BackendHealth, Evidence, RetrievalResult, RetrievalStats, SearchMode,
};
use crate::retrieval::{RetrievalError, RetrievalGateway};

/// Entity under which the ingestion pipeline stores the profile card.
const PROFILE_ENTITY: &str = "__profile__";

#[derive(Debug, Serialize)]
struct AskWireRequest<'a> {
    question: &'a str,
    top_k: usize,
    snippet_chars: usize,
    mode: SearchMode,
    filters: &'a HashMap<String, String>,
    start: i64,
    end: i64,
}

#[derive(Debug, Deserialize)]
struct AskWireResponse {
    #[serde(default)]
    evidence: Vec<Evidence>,
    #[serde(default)]
    stats: Option<AskWireStats>,
}

#[derive(Debug, Default, Deserialize)]
struct AskWireStats {
    #[serde(default)]
    candidates_retrieved: u32,
    #[serde(default)]
    results_returned: Option<u32>,
    #[serde(default)]
    retrieval_ms: u64,
    #[serde(default)]
    reranking_ms: u64,
}

#[derive(Debug, Deserialize)]
struct HealthWireResponse {
    status: String,
    #[serde(default)]
    frame_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StateWireResponse {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    slots: HashMap<String, String>,
}

/// Strict-policy gateway: talks to the search backend's HTTP API.
#[derive(Clone)]
pub struct HttpRetrievalGateway {
    client: Client,
    base_url: String,
}

impl HttpRetrievalGateway {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RetrievalGateway for HttpRetrievalGateway {
    async fn ask(&self, request: &AskRequest) -> Result<RetrievalResult, RetrievalError> {
        let started = Instant::now();
        let body = AskWireRequest {
            question: &request.question,
            top_k: request.top_k,
            snippet_chars: request.snippet_chars,
            mode: request.mode,
            filters: &request.filters,
            start: request.start.unwrap_or(0),
            end: request.end.unwrap_or(0),
        };

        let response = self
            .client
            .post(self.url("/v1/ask"))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(
                    question_preview = %preview(&request.question),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Retrieval ask failed: {e}"
                );
                classify_transport_error(e)
            })?;

        let response = check_status(response).await?;
        let wire: AskWireResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Backend(format!("invalid ask response: {e}")))?;

        let mut evidence = wire.evidence;
        if !request.tags.is_empty() {
            evidence.retain(|e| e.has_all_tags(&request.tags));
        }

        let wire_stats = wire.stats.unwrap_or_default();
        let results_returned = if request.tags.is_empty() {
            wire_stats
                .results_returned
                .unwrap_or(evidence.len() as u32)
        } else {
            evidence.len() as u32
        };
        let stats = RetrievalStats {
            candidates_considered: wire_stats.candidates_retrieved,
            results_returned,
            retrieval_latency_ms: wire_stats.retrieval_ms,
            rerank_latency_ms: wire_stats.reranking_ms,
        };

        info!(
            question_preview = %preview(&request.question),
            mode = ?request.mode,
            top_k = request.top_k,
            evidence_count = evidence.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Retrieval ask completed"
        );

        Ok(RetrievalResult::new(evidence, stats))
    }

    async fn health(&self) -> Result<BackendHealth, RetrievalError> {
        let response = self
            .client
            .get(self.url("/v1/health"))
            .send()
            .await
            .map_err(classify_transport_error)?;
        let response = check_status(response).await?;
        let wire: HealthWireResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Backend(format!("invalid health response: {e}")))?;

        Ok(BackendHealth {
            serving: wire.status.eq_ignore_ascii_case("SERVING"),
            frame_count: wire.frame_count,
        })
    }

    async fn profile(&self) -> Result<Option<CandidateProfile>, RetrievalError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/state/{PROFILE_ENTITY}")))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let wire: StateWireResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Backend(format!("invalid state response: {e}")))?;

        if !wire.found {
            return Ok(None);
        }
        let Some(data) = wire.slots.get("data") else {
            error!("Profile card found but its data slot is empty");
            return Ok(None);
        };
        serde_json::from_str(data)
            .map(Some)
            .map_err(|e| RetrievalError::Backend(format!("invalid profile card: {e}")))
    }

    fn policy(&self) -> BackendPolicy {
        BackendPolicy::Strict
    }
}

fn classify_transport_error(e: reqwest::Error) -> RetrievalError {
    if e.is_connect() || e.is_timeout() {
        RetrievalError::Unavailable(e.to_string())
    } else {
        RetrievalError::Backend(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RetrievalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        Err(RetrievalError::Unavailable(format!("status {status}: {body}")))
    } else {
        Err(RetrievalError::Backend(format!("status {status}: {body}")))
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
