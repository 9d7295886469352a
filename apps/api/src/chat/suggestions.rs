// Session-aware suggested questions: profile questions the caller has not
// asked yet, then a built-in list. Never empty.

use serde::Serialize;

use crate::models::CandidateProfile;
use crate::session::Session;

const BUILT_IN: &[(&str, &str)] = &[
    ("What is their leadership experience?", "leadership"),
    ("What technical skills do they have?", "skills"),
    ("What industries have they worked in?", "experience"),
    ("What is their most significant project?", "experience"),
    ("How would they fit a VP of Engineering role?", "fit"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedQuestion {
    pub question: String,
    pub category: String,
}

impl SuggestedQuestion {
    fn new(question: &str, category: &str) -> Self {
        Self {
            question: question.to_string(),
            category: category.to_string(),
        }
    }
}

pub fn suggested_questions(
    profile: Option<&CandidateProfile>,
    session: Option<&Session>,
) -> Vec<SuggestedQuestion> {
    let asked: Vec<String> = session
        .map(|s| s.user_questions().map(normalize).collect())
        .unwrap_or_default();
    let not_asked = |q: &str| !asked.contains(&normalize(q));

    let from_profile: Vec<SuggestedQuestion> = profile
        .map(|p| p.suggested_questions.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty() && not_asked(q))
        .map(|q| SuggestedQuestion::new(q, "general"))
        .collect();
    if !from_profile.is_empty() {
        return from_profile;
    }

    let built_in: Vec<SuggestedQuestion> = BUILT_IN
        .iter()
        .filter(|(q, _)| not_asked(q))
        .map(|(q, c)| SuggestedQuestion::new(q, c))
        .collect();
    if !built_in.is_empty() {
        return built_in;
    }

    BUILT_IN
        .iter()
        .map(|(q, c)| SuggestedQuestion::new(q, c))
        .collect()
}

/// Just the question texts, for guardrail responses.
pub fn question_texts(questions: &[SuggestedQuestion]) -> Vec<String> {
    questions.iter().map(|q| q.question.clone()).collect()
}

fn normalize(question: &str) -> String {
    question
        .trim()
        .trim_end_matches('?')
        .to_lowercase()
}
