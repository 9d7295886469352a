//! Optional keyword rewriting of chat questions before retrieval.
//!
//! Off by default: expanding acronyms into long forms ("AI" into "artificial
//! intelligence") regressed retrieval against resume text that uses the
//! acronyms. When enabled, any failure falls back to the original question.

use tracing::{debug, info, warn};

use crate::llm_client::{ChatMessage, LlmProvider};

pub const REWRITE_SYSTEM_PROMPT: &str =
    "You are a search query optimizer. Extract keywords concisely.";

/// Questions of at most this many words are already keyword-like.
const MAX_WORDS_UNCHANGED: usize = 3;
const MAX_KEYWORDS: usize = 7;
const MIN_KEYWORD_CHARS: usize = 3;

fn keyword_prompt(question: &str) -> String {
    format!(
        "Extract 5-10 search keywords from this question.\n\
         Include the original key terms plus closely related terms that would help find relevant resume content.\n\
         Keep acronyms such as AI, ML, DevOps and CI/CD exactly as written.\n\
         Output only keywords, space-separated, no punctuation.\n\n\
         Question: {question}\n\
         Keywords:"
    )
}

/// Returns retrieval keywords for `question`, or the question unchanged.
pub async fn rewrite_query(llm: &dyn LlmProvider, question: &str) -> String {
    if question.split_whitespace().count() <= MAX_WORDS_UNCHANGED {
        debug!(query = %question, "Query too short for rewriting");
        return question.to_string();
    }

    let messages = [
        ChatMessage::system(REWRITE_SYSTEM_PROMPT),
        ChatMessage::user(keyword_prompt(question)),
    ];
    match llm.generate(&messages).await {
        Ok(generation) => match clean_keywords(&generation.text) {
            Some(keywords) => {
                info!(
                    original = %question.chars().take(50).collect::<String>(),
                    keywords = %keywords,
                    tokens_used = generation.tokens_used,
                    "Query rewritten"
                );
                keywords
            }
            None => {
                warn!(output = %generation.text.chars().take(100).collect::<String>(), "No usable keywords extracted");
                question.to_string()
            }
        },
        Err(e) => {
            warn!(error = %e, "Query rewriting failed, using original question");
            question.to_string()
        }
    }
}

/// Lowercases, strips punctuation, drops short words and duplicates, keeps at most 7.
pub fn clean_keywords(raw: &str) -> Option<String> {
    let mut seen: Vec<String> = Vec::new();
    for word in raw.split_whitespace() {
        let word = word
            .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | '"' | '\''))
            .to_lowercase();
        if word.chars().count() >= MIN_KEYWORD_CHARS && !seen.contains(&word) {
            seen.push(word);
            if seen.len() == MAX_KEYWORDS {
                break;
            }
        }
    }
    (!seen.is_empty()).then(|| seen.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::SimulatedLlm;

    #[test]
    fn test_clean_keywords() {
        assert_eq!(
            clean_keywords("Kubernetes, kubernetes AI platform. leadership!").as_deref(),
            Some("kubernetes platform leadership")
        );
        assert_eq!(clean_keywords("a an of ..."), None);
        let many = "one two three four five six seven eight nine";
        assert_eq!(clean_keywords(many).unwrap().split(' ').count(), 7);
    }

    #[tokio::test]
    async fn test_short_questions_are_unchanged() {
        let llm = SimulatedLlm::default();
        assert_eq!(rewrite_query(&llm, "Kubernetes experience?").await, "Kubernetes experience?");
    }

    #[tokio::test]
    async fn test_rewrites_longer_questions() {
        let llm = SimulatedLlm::default();
        let rewritten = rewrite_query(&llm, "What is their experience with Kubernetes platforms?").await;
        assert_eq!(rewritten, "what their experience with kubernetes platforms");
    }
}
