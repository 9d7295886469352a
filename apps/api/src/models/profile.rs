use serde::{Deserialize, Serialize};

/// Narrative context attached to one experience entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiContext {
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub approach: String,
    #[serde(default)]
    pub technical_work: String,
    #[serde(default)]
    pub lessons_learned: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub role: String,
    pub period: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub ai_context: AiContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skills {
    #[serde(default)]
    pub strong: Vec<String>,
    #[serde(default)]
    pub moderate: Vec<String>,
    #[serde(default)]
    pub gaps: Vec<String>,
}

/// Candidate profile card, produced by the ingestion pipeline and read from
/// the retrieval backend's state store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub linkedin: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub suggested_questions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub skills: Skills,
    /// Overrides the configured chat system prompt when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl CandidateProfile {
    /// Flattened text used to infer the candidate's own career domain.
    pub fn background_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.title.as_str()];
        parts.extend(self.tags.iter().map(String::as_str));
        parts.extend(self.skills.strong.iter().map(String::as_str));
        for exp in &self.experience {
            parts.push(exp.role.as_str());
            parts.extend(exp.tags.iter().map(String::as_str));
            parts.extend(exp.highlights.iter().map(String::as_str));
        }
        parts.join("\n")
    }

    pub fn display_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }
}
