//! Fit Assessment Engine: scores a pasted job description against the candidate.
//!
//! Pipeline: injection gate → classify → retrieve (broad: top 10, 500-char
//! snippets) → candidate domain + alignment → persona → non-streaming
//! generate → strict verdict parse. One retry on malformed output, then a
//! generic failed outcome. Retrieval and provider errors propagate as typed
//! failures; nothing else is retried.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::classifier::{Domain, DomainClassification, RoleClassifier};
use crate::fit::personas::select_persona;
use crate::fit::prompts::{self, build_fit_messages, schema_reminder, FitPromptInput};
use crate::fit::verdict::{parse_verdict, FitVerdict};
use crate::guardrails::{BlockCategory, GuardrailEngine, InputVerdict};
use crate::llm_client::{ChatMessage, LlmError, LlmProvider};
use crate::models::CandidateProfile;
use crate::retrieval::{load_profile, AskRequest, RetrievalError, RetrievalGateway};

pub const MIN_JOB_DESCRIPTION_CHARS: usize = 50;
pub const MAX_JOB_DESCRIPTION_CHARS: usize = 20_000;

const FIT_TOP_K: usize = 10;
const FIT_SNIPPET_CHARS: usize = 500;
const MAX_ATTEMPTS: usize = 2;

pub const ASSESSMENT_FAILED_MESSAGE: &str =
    "The fit assessment could not be completed. Please try again in a moment.";

#[derive(Debug, Error)]
pub enum FitError {
    #[error("{0}")]
    Validation(String),

    #[error("job description rejected by the input guardrail ({0:?})")]
    InputRejected(BlockCategory),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("fit assessment exceeded {0:?}")]
    Timeout(Duration),
}

/// Whether the role sits in the candidate's own career domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainAlignment {
    Aligned,
    Mismatch,
    Unknown,
}

impl DomainAlignment {
    /// A role is aligned when the candidate's domain is its primary or
    /// secondary domain. Unknown when either side could not be classified.
    pub fn evaluate(candidate: Option<Domain>, role: &DomainClassification) -> Self {
        match (candidate, role.primary_domain) {
            (Some(candidate), Some(primary))
                if candidate == primary || role.secondary_domain == Some(candidate) =>
            {
                DomainAlignment::Aligned
            }
            (Some(_), Some(_)) => DomainAlignment::Mismatch,
            _ => DomainAlignment::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainAlignment::Aligned => "aligned",
            DomainAlignment::Mismatch => "mismatch",
            DomainAlignment::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Assessed(FitVerdict),
    Failed { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct FitAssessment {
    #[serde(flatten)]
    pub outcome: AssessmentOutcome,
    pub classification: DomainClassification,
    pub candidate_domain: Option<Domain>,
    pub domain_alignment: DomainAlignment,
    pub persona: String,
    pub chunks_retrieved: usize,
    pub tokens_used: u32,
}

impl FitAssessment {
    pub fn verdict(&self) -> Option<&FitVerdict> {
        match &self.outcome {
            AssessmentOutcome::Assessed(verdict) => Some(verdict),
            AssessmentOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct FitAssessmentEngine {
    retrieval: Arc<dyn RetrievalGateway>,
    llm: Arc<dyn LlmProvider>,
    classifier: RoleClassifier,
    guardrails: GuardrailEngine,
    request_timeout: Duration,
}

impl FitAssessmentEngine {
    /// `request_timeout` bounds the whole verdict generation, retries included.
    pub fn new(
        retrieval: Arc<dyn RetrievalGateway>,
        llm: Arc<dyn LlmProvider>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            retrieval,
            llm,
            classifier: RoleClassifier::new(),
            guardrails: GuardrailEngine::new(),
            request_timeout,
        }
    }

    pub async fn assess(&self, job_description: &str) -> Result<FitAssessment, FitError> {
        let started = Instant::now();
        let job_description = job_description.trim();
        validate_length(job_description)?;

        if let InputVerdict::Blocked { category, .. } =
            self.guardrails.check_injection(job_description)
        {
            return Err(FitError::InputRejected(category));
        }

        let classification = self.classifier.classify(job_description);

        let request = AskRequest::new(prompts::retrieval_query(job_description))
            .top_k(FIT_TOP_K)
            .snippet_chars(FIT_SNIPPET_CHARS);
        let retrieved = self.retrieval.ask(&request).await?;
        if retrieved.is_empty() {
            warn!(
                jd_title = %classification.jd_title,
                "Fit assessment proceeding without candidate context"
            );
        }

        let profile = load_profile(self.retrieval.as_ref()).await;
        let candidate_domain =
            self.candidate_domain(profile.as_ref(), &retrieved.context);
        let alignment = DomainAlignment::evaluate(candidate_domain, &classification);
        let persona = select_persona(&classification);

        let messages = build_fit_messages(
            &persona,
            &FitPromptInput {
                job_description,
                classification: &classification,
                candidate_domain,
                alignment,
                context: &retrieved.context,
            },
        );
        let (outcome, tokens_used) =
            tokio::time::timeout(self.request_timeout, self.generate_verdict(messages))
                .await
                .map_err(|_| {
                    warn!(
                        jd_title = %classification.jd_title,
                        timeout_secs = self.request_timeout.as_secs(),
                        "Fit assessment timed out"
                    );
                    FitError::Timeout(self.request_timeout)
                })??;

        let assessment = FitAssessment {
            outcome,
            classification,
            candidate_domain,
            domain_alignment: alignment,
            persona: persona.key,
            chunks_retrieved: retrieved.chunk_count(),
            tokens_used,
        };
        info!(
            jd_title = %assessment.classification.jd_title,
            primary = ?assessment.classification.primary_domain,
            level = ?assessment.classification.role_level,
            alignment = alignment.as_str(),
            persona = %assessment.persona,
            chunks_retrieved = assessment.chunks_retrieved,
            tokens_used,
            stars = ?assessment.verdict().map(|v| v.stars),
            latency_ms = started.elapsed().as_millis() as u64,
            "Fit assessment completed"
        );

        Ok(assessment)
    }

    /// The candidate's evident domain, from the profile card and retrieved context.
    fn candidate_domain(&self, profile: Option<&CandidateProfile>, context: &str) -> Option<Domain> {
        let mut background = profile.map(CandidateProfile::background_text).unwrap_or_default();
        background.push('\n');
        background.push_str(context);
        self.classifier.classify(&background).primary_domain
    }

    async fn generate_verdict(
        &self,
        mut messages: Vec<ChatMessage>,
    ) -> Result<(AssessmentOutcome, u32), FitError> {
        let mut tokens_used = 0;

        for attempt in 1..=MAX_ATTEMPTS {
            let generation = self.llm.generate(&messages).await?;
            tokens_used += generation.tokens_used;

            match parse_verdict(&generation.text) {
                Ok(verdict) => return Ok((AssessmentOutcome::Assessed(verdict), tokens_used)),
                Err(e) => {
                    warn!(attempt, error = %e, "Malformed fit verdict from model");
                    messages.push(ChatMessage::assistant(generation.text));
                    messages.push(schema_reminder(&e.to_string()));
                }
            }
        }

        Ok((
            AssessmentOutcome::Failed {
                message: ASSESSMENT_FAILED_MESSAGE.to_string(),
            },
            tokens_used,
        ))
    }
}

fn validate_length(job_description: &str) -> Result<(), FitError> {
    let chars = job_description.chars().count();
    if chars < MIN_JOB_DESCRIPTION_CHARS {
        return Err(FitError::Validation(format!(
            "Job description must be at least {MIN_JOB_DESCRIPTION_CHARS} characters"
        )));
    }
    if chars > MAX_JOB_DESCRIPTION_CHARS {
        return Err(FitError::Validation(format!(
            "Job description must be at most {MAX_JOB_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(())
}
