//! Fit assessment prompts.
//!
//! The user message carries labelled lines (classification, requirement
//! signals, domain alignment) ahead of the job description and the candidate
//! context block, so the model sees the deterministic analysis before the
//! free text. The system message is the selected persona plus the star rubric.

use crate::classifier::{Domain, DomainClassification};
use crate::fit::engine::DomainAlignment;
use crate::fit::personas::Persona;
use crate::llm_client::ChatMessage;

pub const ROLE_CLASSIFICATION_LABEL: &str = "ROLE CLASSIFICATION:";
pub const REQUIREMENT_SIGNALS_LABEL: &str = "REQUIREMENT SIGNALS:";
pub const DOMAIN_ALIGNMENT_LABEL: &str = "DOMAIN ALIGNMENT:";
pub const CANDIDATE_CONTEXT_START: &str = "CANDIDATE CONTEXT:";
pub const CANDIDATE_CONTEXT_END: &str = "END CANDIDATE CONTEXT";

const RETRIEVAL_QUERY_PREFIX: &str = "relevant experience and skills for role fit assessment";
const RETRIEVAL_QUERY_JD_CHARS: usize = 200;

const NO_CONTEXT_NOTE: &str = "No candidate context was retrieved.";

const RUBRIC: &str = "\
STAR RATING RUBRIC (apply exactly):
- 1 star, fit_level \"different_domain\": the role belongs to a different profession or domain than the candidate's evident background. Use this whenever DOMAIN ALIGNMENT is mismatch.
- 2 stars, fit_level \"weak_fit\": fewer than 40% of the stated requirements are evidenced.
- 3 stars, fit_level \"partial_fit\": 40% to 60% of the stated requirements are evidenced.
- 4 stars, fit_level \"good_fit\": 60% to 80% of the stated requirements are evidenced.
- 5 stars, fit_level \"strong_fit\": more than 80% of the stated requirements are evidenced.

Only count a requirement as evidenced when the candidate context supports it. Do not invent experience, \
do not oversell, and be direct about gaps. Hiring managers value credibility over enthusiasm.";

const OUTPUT_SCHEMA: &str = r#"Respond with a single JSON object and nothing else:
{
  "stars": <integer 1-5>,
  "fit_level": "<different_domain | weak_fit | partial_fit | good_fit | strong_fit>",
  "key_matches": ["<3-5 specific qualifications from the candidate context that match the role>"],
  "gaps": ["<2-4 honest gaps or limitations>"],
  "recommendation": "<2-3 sentence balanced recommendation>",
  "role_level_note": "<seniority comparison, or an empty string>"
}"#;

/// Synthesised retrieval query: a fixed prefix plus the head of the job description.
pub fn retrieval_query(job_description: &str) -> String {
    let head: String = job_description
        .trim()
        .chars()
        .take(RETRIEVAL_QUERY_JD_CHARS)
        .collect();
    format!("{RETRIEVAL_QUERY_PREFIX}: {head}")
}

/// Persona, evaluation criteria, rubric and output schema.
pub fn system_prompt(persona: &Persona) -> String {
    let criteria = persona
        .eval_criteria
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nEvaluate the candidate against these criteria:\n{criteria}\n\n{RUBRIC}\n\n{OUTPUT_SCHEMA}",
        persona.system_prompt
    )
}

pub struct FitPromptInput<'a> {
    pub job_description: &'a str,
    pub classification: &'a DomainClassification,
    pub candidate_domain: Option<Domain>,
    pub alignment: DomainAlignment,
    pub context: &'a str,
}

pub fn build_fit_messages(persona: &Persona, input: &FitPromptInput<'_>) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(persona)),
        ChatMessage::user(user_prompt(input)),
    ]
}

/// Appended after a reply that failed schema validation.
pub fn schema_reminder(problem: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "Your previous reply could not be accepted ({problem}). Reply again with only the JSON \
         object described in the instructions. The fit_level must be the one the rubric assigns \
         to your star rating."
    ))
}

fn user_prompt(input: &FitPromptInput<'_>) -> String {
    let classification = input.classification;
    let mut lines = vec![
        "Assess the candidate's fit for the job description below.".to_string(),
        String::new(),
        format!("{ROLE_CLASSIFICATION_LABEL} {}", describe_classification(classification)),
        format!("{REQUIREMENT_SIGNALS_LABEL} {}", requirement_signals(classification)),
        format!(
            "{DOMAIN_ALIGNMENT_LABEL} {}",
            describe_alignment(input.alignment, input.candidate_domain, classification)
        ),
    ];

    if let Some(note) = ambiguity_note(classification) {
        lines.push(note);
    }

    let context = input.context.trim();
    lines.extend([
        String::new(),
        "JOB DESCRIPTION:".to_string(),
        input.job_description.trim().to_string(),
        "END JOB DESCRIPTION".to_string(),
        String::new(),
        CANDIDATE_CONTEXT_START.to_string(),
        if context.is_empty() { NO_CONTEXT_NOTE.to_string() } else { context.to_string() },
        CANDIDATE_CONTEXT_END.to_string(),
        String::new(),
        role_level_instruction(classification),
    ]);

    lines.join("\n")
}

fn describe_classification(c: &DomainClassification) -> String {
    let domain = |d: Option<Domain>| d.map(|d| d.label()).unwrap_or("none");
    format!(
        "title \"{}\"; primary domain {} (score {}); secondary domain {}; level {}; confident {}",
        c.jd_title,
        domain(c.primary_domain),
        c.primary_score,
        domain(c.secondary_domain),
        c.role_level.map(|l| l.as_str()).unwrap_or("unknown"),
        if c.confident { "yes" } else { "no" },
    )
}

fn requirement_signals(c: &DomainClassification) -> String {
    if c.matched_keywords.is_empty() {
        "none".to_string()
    } else {
        c.matched_keywords.join(", ")
    }
}

fn describe_alignment(
    alignment: DomainAlignment,
    candidate: Option<Domain>,
    role: &DomainClassification,
) -> String {
    let label = |d: Option<Domain>| d.map(|d| d.as_str()).unwrap_or("unknown");
    format!(
        "{} (candidate: {}, role: {})",
        alignment.as_str(),
        label(candidate),
        label(role.primary_domain)
    )
}

fn ambiguity_note(c: &DomainClassification) -> Option<String> {
    let primary = match c.primary_domain {
        Some(primary) => primary,
        None => {
            return Some(
                "NOTE: The role could not be classified into a known domain. Judge the domain \
                 from the job description itself and say so in the recommendation."
                    .to_string(),
            )
        }
    };
    if !c.is_ambiguous() {
        return None;
    }

    let secondary = c
        .secondary_domain
        .map(|d| format!(" and {}", d.label()))
        .unwrap_or_default();
    Some(format!(
        "NOTE: Ambiguous classification. The role spans {}{secondary}; state this ambiguity \
         explicitly in the recommendation rather than committing to a single domain.",
        primary.label()
    ))
}

fn role_level_instruction(c: &DomainClassification) -> String {
    match c.role_level {
        Some(level) => format!(
            "The role is at the {} level. In role_level_note, compare it with the most senior \
             scope the candidate context evidences; use an empty string if they match.",
            level.as_str()
        ),
        None => "No seniority level was detected for the role; set role_level_note to an empty \
                 string."
            .to_string(),
    }
}
