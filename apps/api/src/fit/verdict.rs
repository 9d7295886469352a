//! FitVerdict: strict schema for the model's structured fit assessment.
//!
//! The model must return a JSON object whose `fit_level` agrees with its
//! `stars` under the rubric; anything else is malformed and rejected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm_client::strip_json_fences;

/// Rubric vocabulary. Each level corresponds to exactly one star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitLevel {
    /// 1 star: a different profession than the candidate's background.
    DifferentDomain,
    /// 2 stars: under 40% of requirements evidenced.
    WeakFit,
    /// 3 stars: 40–60%.
    PartialFit,
    /// 4 stars: 60–80%.
    GoodFit,
    /// 5 stars: over 80%.
    StrongFit,
}

impl FitLevel {
    pub fn for_stars(stars: u8) -> Option<Self> {
        match stars {
            1 => Some(FitLevel::DifferentDomain),
            2 => Some(FitLevel::WeakFit),
            3 => Some(FitLevel::PartialFit),
            4 => Some(FitLevel::GoodFit),
            5 => Some(FitLevel::StrongFit),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FitLevel::DifferentDomain => "Different domain",
            FitLevel::WeakFit => "Weak fit",
            FitLevel::PartialFit => "Partial fit",
            FitLevel::GoodFit => "Good fit",
            FitLevel::StrongFit => "Strong fit",
        }
    }
}

/// Exactly what the model is asked to return.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    stars: u8,
    fit_level: FitLevel,
    key_matches: Vec<String>,
    gaps: Vec<String>,
    recommendation: String,
    #[serde(default)]
    role_level_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FitVerdict {
    pub stars: u8,
    pub fit_level: FitLevel,
    /// Display summary, e.g. "⭐⭐⭐⭐ Good fit".
    pub verdict: String,
    pub key_matches: Vec<String>,
    pub gaps: Vec<String>,
    pub recommendation: String,
    pub role_level_note: String,
}

#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("verdict is not valid JSON for the schema: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("stars must be between 1 and 5, got {0}")]
    StarsOutOfRange(u8),

    #[error("fit_level {fit_level:?} does not match {stars} stars")]
    LevelMismatch { stars: u8, fit_level: FitLevel },

    #[error("recommendation is empty")]
    EmptyRecommendation,
}

/// Parses and validates model output against the rubric.
pub fn parse_verdict(text: &str) -> Result<FitVerdict, VerdictError> {
    let raw: RawVerdict = serde_json::from_str(strip_json_fences(text))?;

    let expected = FitLevel::for_stars(raw.stars).ok_or(VerdictError::StarsOutOfRange(raw.stars))?;
    if expected != raw.fit_level {
        return Err(VerdictError::LevelMismatch {
            stars: raw.stars,
            fit_level: raw.fit_level,
        });
    }

    let recommendation = raw.recommendation.trim().to_string();
    if recommendation.is_empty() {
        return Err(VerdictError::EmptyRecommendation);
    }

    Ok(FitVerdict {
        stars: raw.stars,
        fit_level: raw.fit_level,
        verdict: format!("{} {}", "⭐".repeat(raw.stars as usize), raw.fit_level.label()),
        key_matches: clean_items(raw.key_matches),
        gaps: clean_items(raw.gaps),
        recommendation,
        role_level_note: raw.role_level_note.unwrap_or_default().trim().to_string(),
    })
}

fn clean_items(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "stars": 4,
        "fit_level": "good_fit",
        "key_matches": ["Kubernetes platform ownership", "  ", "Scaled team to 50 engineers"],
        "gaps": ["No public cloud cost ownership"],
        "recommendation": "  Strong candidate for the platform org.  ",
        "role_level_note": "Senior manager moving to VP scope."
    }"#;

    #[test]
    fn test_valid_verdict_parses() {
        let verdict = parse_verdict(GOOD).unwrap();
        assert_eq!(verdict.stars, 4);
        assert_eq!(verdict.fit_level, FitLevel::GoodFit);
        assert_eq!(verdict.verdict, "⭐⭐⭐⭐ Good fit");
        assert_eq!(verdict.key_matches.len(), 2);
        assert_eq!(verdict.recommendation, "Strong candidate for the platform org.");
    }

    #[test]
    fn test_fenced_verdict_parses() {
        let fenced = format!("```json\n{GOOD}\n```");
        assert!(parse_verdict(&fenced).is_ok());
    }

    #[test]
    fn test_missing_role_level_note_defaults_to_empty() {
        let text = r#"{"stars": 1, "fit_level": "different_domain", "key_matches": [],
                       "gaps": ["Culinary role"], "recommendation": "Different profession."}"#;
        let verdict = parse_verdict(text).unwrap();
        assert_eq!(verdict.role_level_note, "");
        assert!(verdict.key_matches.is_empty());
    }

    #[test]
    fn test_level_must_match_stars() {
        let text = r#"{"stars": 5, "fit_level": "weak_fit", "key_matches": [], "gaps": [],
                       "recommendation": "x"}"#;
        assert!(matches!(
            parse_verdict(text),
            Err(VerdictError::LevelMismatch { stars: 5, .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_and_unknown_vocabulary() {
        let zero = r#"{"stars": 0, "fit_level": "weak_fit", "key_matches": [], "gaps": [],
                       "recommendation": "x"}"#;
        assert!(matches!(parse_verdict(zero), Err(VerdictError::StarsOutOfRange(0))));

        let unknown = r#"{"stars": 3, "fit_level": "maybe", "key_matches": [], "gaps": [],
                          "recommendation": "x"}"#;
        assert!(matches!(parse_verdict(unknown), Err(VerdictError::Malformed(_))));
    }

    #[test]
    fn test_rejects_prose_and_empty_recommendation() {
        assert!(matches!(
            parse_verdict("VERDICT: ⭐⭐⭐⭐ Strong fit"),
            Err(VerdictError::Malformed(_))
        ));
        let blank = r#"{"stars": 2, "fit_level": "weak_fit", "key_matches": [], "gaps": [],
                        "recommendation": "   "}"#;
        assert!(matches!(parse_verdict(blank), Err(VerdictError::EmptyRecommendation)));
    }
}
