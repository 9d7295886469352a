use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Retrieval strategy requested from the search backend. Hybrid combines
/// lexical and vector similarity and re-ranks the merged candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Sem,
    Lex,
}

/// One question sent to the search backend.
#[derive(Debug, Clone)]
pub struct AskRequest {
    pub question: String,
    pub top_k: usize,
    pub snippet_chars: usize,
    pub mode: SearchMode,
    /// Metadata filters forwarded to the backend (e.g. `section=experience`).
    pub filters: HashMap<String, String>,
    /// Every listed tag must be present on a returned evidence item.
    pub tags: Vec<String>,
    /// Optional time range, unix seconds.
    pub start: Option<i64>,
    pub end: Option<i64>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: 5,
            snippet_chars: 200,
            mode: SearchMode::Hybrid,
            filters: HashMap::new(),
            tags: Vec::new(),
            start: None,
            end: None,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A single retrieved frame of resume content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub title: String,
    pub snippet: String,
    pub score: f32,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Evidence {
    pub fn has_all_tags(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|tag| self.tags.contains(tag))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalStats {
    pub candidates_considered: u32,
    pub results_returned: u32,
    pub retrieval_latency_ms: u64,
    pub rerank_latency_ms: u64,
}

/// Result of one `ask` call. Built fresh per request and never cached.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    /// Evidence pre-rendered for prompt injection.
    pub context: String,
    pub evidence: Vec<Evidence>,
    pub stats: RetrievalStats,
}

impl RetrievalResult {
    pub fn new(evidence: Vec<Evidence>, stats: RetrievalStats) -> Self {
        Self {
            context: format_context(&evidence),
            evidence,
            stats,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), RetrievalStats::default())
    }

    /// Zero results is a valid outcome, not an error.
    pub fn is_empty(&self) -> bool {
        self.stats.results_returned == 0 || self.evidence.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.evidence.len()
    }
}

/// Connectivity report from the search backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendHealth {
    pub serving: bool,
    pub frame_count: Option<u64>,
}

/// Renders evidence as `**title**\nsnippet` blocks separated by blank lines.
pub fn format_context(evidence: &[Evidence]) -> String {
    evidence
        .iter()
        .map(|e| format!("**{}**\n{}", e.title, e.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}
