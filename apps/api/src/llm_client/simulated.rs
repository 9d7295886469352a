//! Simulated-policy provider: deterministic answers without a network call.
//!
//! Chat prompts get a canned answer that names the retrieved evidence titles.
//! Fit prompts are scored from the labelled lines the fit prompt builder writes
//! (requirement signals, domain alignment, candidate context), following the
//! same star rubric the real model is instructed to use.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use regex::RegexBuilder;
use serde_json::json;

use crate::chat::query_rewrite::REWRITE_SYSTEM_PROMPT;
use crate::config::BackendPolicy;
use crate::fit::prompts::{
    CANDIDATE_CONTEXT_END, CANDIDATE_CONTEXT_START, DOMAIN_ALIGNMENT_LABEL,
    REQUIREMENT_SIGNALS_LABEL,
};
use crate::llm_client::{
    ChatMessage, ChatRole, ChunkStream, Generation, LlmError, LlmProvider, StreamChunk,
};

const MODEL_NAME: &str = "simulated";

#[derive(Debug, Clone, Default)]
pub struct SimulatedLlm {
    token_delay: Duration,
}

impl SimulatedLlm {
    pub fn new(token_delay: Duration) -> Self {
        Self { token_delay }
    }

    fn respond(&self, messages: &[ChatMessage]) -> String {
        let all_text = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        if all_text.contains(REQUIREMENT_SIGNALS_LABEL) {
            return simulate_fit_verdict(&all_text);
        }
        if messages
            .iter()
            .any(|m| m.role == ChatRole::System && m.content == REWRITE_SYSTEM_PROMPT)
        {
            return simulate_keywords(last_user(messages));
        }
        simulate_chat_answer(&all_text)
    }
}

#[async_trait]
impl LlmProvider for SimulatedLlm {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<Generation, LlmError> {
        let text = self.respond(messages);
        let tokens_used = text.split_whitespace().count() as u32;
        Ok(Generation { text, tokens_used })
    }

    async fn generate_stream(&self, messages: &[ChatMessage]) -> Result<ChunkStream, LlmError> {
        let text = self.respond(messages);
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        let total = words.len();
        let delay = self.token_delay;

        let fragments = stream::iter(words.into_iter().enumerate()).then(move |(i, word)| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let content = if i + 1 < total { format!("{word} ") } else { word };
            Ok::<_, LlmError>(StreamChunk {
                content,
                finish_reason: None,
                tokens_used: 0,
            })
        });
        let finish = stream::once(async move {
            Ok::<_, LlmError>(StreamChunk {
                content: String::new(),
                finish_reason: Some("stop".to_string()),
                tokens_used: total as u32,
            })
        });

        Ok(fragments.chain(finish).boxed())
    }

    fn policy(&self) -> BackendPolicy {
        BackendPolicy::Simulated
    }

    fn model(&self) -> &str {
        MODEL_NAME
    }
}

fn last_user(messages: &[ChatMessage]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.as_str())
        .unwrap_or_default()
}

fn simulate_chat_answer(prompt: &str) -> String {
    let titles: Vec<&str> = prompt
        .lines()
        .filter_map(|line| line.strip_prefix("**")?.strip_suffix("**"))
        .take(2)
        .collect();

    if titles.is_empty() {
        return "I don't have resume context for that question yet. \
                This is a simulated response; set LLM_POLICY=strict to enable real answers."
            .to_string();
    }
    format!(
        "Based on the resume, the most relevant background is {}. \
         This is a simulated response; set LLM_POLICY=strict to enable real answers.",
        titles.join(" and ")
    )
}

/// Echoes the question line of the keyword prompt back as keywords.
fn simulate_keywords(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Question:"))
        .unwrap_or(prompt)
        .trim()
        .to_string()
}

fn simulate_fit_verdict(prompt: &str) -> String {
    let signals: Vec<&str> = labelled_line(prompt, REQUIREMENT_SIGNALS_LABEL)
        .map(|line| {
            line.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("none"))
                .collect()
        })
        .unwrap_or_default();
    let alignment = labelled_line(prompt, DOMAIN_ALIGNMENT_LABEL)
        .and_then(|line| line.split_whitespace().next())
        .unwrap_or("unknown");
    let context = candidate_context(prompt);

    let (matched, missing): (Vec<&str>, Vec<&str>) =
        signals.iter().copied().partition(|term| mentions(context, term));

    let stars: u8 = if alignment == "mismatch" {
        1
    } else if signals.is_empty() {
        3
    } else {
        let share = matched.len() as f32 / signals.len() as f32;
        match share {
            s if s < 0.4 => 2,
            s if s < 0.6 => 3,
            s if s <= 0.8 => 4,
            _ => 5,
        }
    };
    let fit_level = match stars {
        1 => "different_domain",
        2 => "weak_fit",
        3 => "partial_fit",
        4 => "good_fit",
        _ => "strong_fit",
    };
    let recommendation = if stars == 1 {
        "This role belongs to a different profession than the candidate's background."
    } else if stars >= 4 {
        "The candidate's evidenced experience covers most of the role's requirements."
    } else {
        "The candidate covers part of the role; probe the listed gaps in interviews."
    };
    let (key_matches, gaps) = if stars == 1 {
        (Vec::new(), signals.clone())
    } else {
        (matched, missing)
    };

    json!({
        "stars": stars,
        "fit_level": fit_level,
        "key_matches": key_matches,
        "gaps": gaps,
        "recommendation": recommendation,
        "role_level_note": null,
    })
    .to_string()
}

fn labelled_line<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(label))
        .map(str::trim)
}

fn candidate_context(prompt: &str) -> &str {
    let Some(start) = prompt.find(CANDIDATE_CONTEXT_START) else {
        return "";
    };
    let rest = &prompt[start + CANDIDATE_CONTEXT_START.len()..];
    match rest.find(CANDIDATE_CONTEXT_END) {
        Some(end) => &rest[..end],
        None => rest,
    }
}

fn mentions(text: &str, term: &str) -> bool {
    RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
        .case_insensitive(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}
