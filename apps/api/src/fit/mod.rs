//! Fit assessment of a pasted job description against the candidate.
//!
//! The engine classifies the role, retrieves broad candidate context, picks
//! an assessor persona and asks the model for a strict-schema verdict.

pub mod engine;
pub mod handlers;
pub mod personas;
pub mod prompts;
pub mod verdict;

pub use engine::{
    AssessmentOutcome, DomainAlignment, FitAssessment, FitAssessmentEngine, FitError,
};
pub use verdict::{FitLevel, FitVerdict};
