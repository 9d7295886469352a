use async_trait::async_trait;

use crate::config::BackendPolicy;
use crate::models::profile::{AiContext, Experience, Skills};
use crate::models::CandidateProfile;
use crate::retrieval::models::{
    AskRequest, BackendHealth, Evidence, RetrievalResult, RetrievalStats,
};
use crate::retrieval::{RetrievalError, RetrievalGateway};

const TAG_BOOST: f32 = 0.05;
const WORD_BOOST: f32 = 0.03;

struct CannedFrame {
    title: &'static str,
    score: f32,
    snippet: &'static str,
    tags: &'static [&'static str],
}

const FRAMES: &[CannedFrame] = &[
    CannedFrame {
        title: "Senior Engineering Manager at Northwind Industrial",
        score: 0.95,
        snippet: "Led a cross-functional team of 12 software engineers building an industrial IoT \
                  platform on Kubernetes. Implemented CI/CD pipelines reducing deployment time by 60%.",
        tags: &["experience", "leadership", "northwind"],
    },
    CannedFrame {
        title: "Technical Skills - Programming Languages",
        score: 0.88,
        snippet: "Proficient in Rust, Python, TypeScript, Go. Experience with systems programming, \
                  backend web services, APIs and microservices, and ML pipelines.",
        tags: &["skills", "programming", "languages"],
    },
    CannedFrame {
        title: "GenAI and Machine Learning Experience",
        score: 0.92,
        snippet: "Built AI retrieval systems using vector databases and LLM APIs. Shipped machine \
                  learning features on a shared data platform with semantic search.",
        tags: &["skills", "ai", "ml", "genai"],
    },
    CannedFrame {
        title: "Security Engineering Background",
        score: 0.85,
        snippet: "Implemented zero-trust security architecture for industrial control systems. \
                  Led security audits and penetration testing initiatives.",
        tags: &["experience", "security", "architecture"],
    },
    CannedFrame {
        title: "VP Engineering Qualifications",
        score: 0.90,
        snippet: "10+ years of engineering leadership experience. Built and scaled teams from 5 \
                  to 50+ engineers across platform, infrastructure and product engineering.",
        tags: &["leadership", "management", "executive"],
    },
    CannedFrame {
        title: "Cloud Infrastructure and Reliability",
        score: 0.87,
        snippet: "Owned cloud infrastructure for distributed systems serving millions of devices. \
                  Introduced DevOps and SRE practices, scalable observability, and automated \
                  deployment across regions.",
        tags: &["experience", "infrastructure", "cloud"],
    },
];

/// Simulated-policy gateway: deterministic canned resume frames.
#[derive(Debug, Clone, Default)]
pub struct SimulatedRetrieval;

impl SimulatedRetrieval {
    pub fn new() -> Self {
        Self
    }

    fn search(&self, request: &AskRequest) -> Vec<Evidence> {
        let query = request.question.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();

        let mut scored: Vec<Evidence> = FRAMES
            .iter()
            .map(|frame| {
                let mut score = frame.score;
                for tag in frame.tags {
                    if query.contains(tag) {
                        score = (score + TAG_BOOST).min(1.0);
                    }
                }
                let snippet_lower = frame.snippet.to_lowercase();
                if words.iter().any(|w| snippet_lower.contains(w)) {
                    score = (score + WORD_BOOST).min(1.0);
                }
                Evidence {
                    title: frame.title.to_string(),
                    snippet: frame.snippet.chars().take(request.snippet_chars).collect(),
                    score,
                    tags: frame.tags.iter().map(|t| t.to_string()).collect(),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(request.top_k);
        if !request.tags.is_empty() {
            scored.retain(|e| e.has_all_tags(&request.tags));
        }
        scored
    }
}

#[async_trait]
impl RetrievalGateway for SimulatedRetrieval {
    async fn ask(&self, request: &AskRequest) -> Result<RetrievalResult, RetrievalError> {
        let evidence = self.search(request);
        let stats = RetrievalStats {
            candidates_considered: FRAMES.len() as u32,
            results_returned: evidence.len() as u32,
            retrieval_latency_ms: 2,
            rerank_latency_ms: 0,
        };
        Ok(RetrievalResult::new(evidence, stats))
    }

    async fn health(&self) -> Result<BackendHealth, RetrievalError> {
        Ok(BackendHealth {
            serving: true,
            frame_count: Some(FRAMES.len() as u64),
        })
    }

    async fn profile(&self) -> Result<Option<CandidateProfile>, RetrievalError> {
        Ok(Some(canned_profile()))
    }

    fn policy(&self) -> BackendPolicy {
        BackendPolicy::Simulated
    }
}

fn canned_profile() -> CandidateProfile {
    CandidateProfile {
        name: "Jordan Lee".to_string(),
        title: "Senior Engineering Manager".to_string(),
        email: "jordan.lee@example.com".to_string(),
        linkedin: "https://linkedin.com/in/example".to_string(),
        location: "Remote".to_string(),
        status: "Open to VP Engineering and platform leadership roles".to_string(),
        suggested_questions: vec![
            "What's Jordan's experience with platform engineering?".to_string(),
            "How large were the teams Jordan has led?".to_string(),
            "What has Jordan built with AI and machine learning?".to_string(),
            "Tell me about Jordan's security background".to_string(),
        ],
        tags: vec![
            "leadership".to_string(),
            "platform".to_string(),
            "cloud".to_string(),
            "ai".to_string(),
        ],
        experience: vec![Experience {
            company: "Northwind Industrial".to_string(),
            role: "Senior Engineering Manager".to_string(),
            period: "2018 - Present".to_string(),
            location: "Remote".to_string(),
            tags: vec!["platform".to_string(), "kubernetes".to_string()],
            highlights: vec![
                "Scaled the software engineering org from 5 to 50+ engineers".to_string(),
                "Cut deployment time by 60% with CI/CD".to_string(),
            ],
            ai_context: AiContext::default(),
        }],
        skills: Skills {
            strong: vec![
                "Kubernetes".to_string(),
                "Distributed systems".to_string(),
                "Engineering leadership".to_string(),
            ],
            moderate: vec!["Machine learning".to_string()],
            gaps: vec!["Consumer mobile apps".to_string()],
        },
        system_prompt: None,
    }
}
