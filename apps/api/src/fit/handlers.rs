//! Axum route handlers for the Fit Assessment API.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{info, warn};

use crate::chat::suggestions::{question_texts, suggested_questions};
use crate::errors::AppError;
use crate::fit::{FitAssessment, FitError};
use crate::guardrails::blocked_response;
use crate::models::CandidateProfile;
use crate::retrieval::load_profile;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AssessFitRequest {
    pub job_description: String,
}

/// POST /api/v1/assess-fit
///
/// Scores the job description against the candidate. A malformed model reply
/// still answers 200, with `status: "failed"`.
pub async fn handle_assess_fit(
    State(state): State<AppState>,
    Json(request): Json<AssessFitRequest>,
) -> Result<Json<FitAssessment>, AppError> {
    info!(
        jd_chars = request.job_description.chars().count(),
        "Fit assessment requested"
    );

    match state.fit.assess(&request.job_description).await {
        Ok(assessment) => Ok(Json(assessment)),
        Err(FitError::InputRejected(category)) => {
            warn!(?category, "Job description rejected");
            let profile = load_profile(state.retrieval.as_ref()).await;
            let suggestions = question_texts(&suggested_questions(profile.as_ref(), None));
            Err(AppError::InputRejected {
                message: category.describe().to_string(),
                response: blocked_response(
                    profile.as_ref().and_then(CandidateProfile::display_name),
                    &suggestions,
                ),
                suggested_questions: suggestions,
            })
        }
        Err(e) => Err(e.into()),
    }
}
