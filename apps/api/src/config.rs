use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;

/// Default chat system prompt, used when the candidate profile does not carry one.
const DEFAULT_SYSTEM_PROMPT: &str = "You are an AI assistant representing a job candidate. \
Your role is to answer questions about their professional background, skills, and experience \
based on the context provided.

Guidelines:
- Only answer based on the provided context from the resume
- Be honest and accurate - don't make up information
- If you don't have information to answer a question, say so
- Be professional but personable
- Highlight relevant achievements and skills when appropriate
- Keep responses concise but informative";

/// Whether an external collaborator is called for real or answered from
/// deterministic canned data. Resolved once at startup; never switched per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPolicy {
    Strict,
    Simulated,
}

impl FromStr for BackendPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(BackendPolicy::Strict),
            "simulated" => Ok(BackendPolicy::Simulated),
            other => bail!("unknown backend policy '{other}' (expected 'strict' or 'simulated')"),
        }
    }
}

/// Application configuration loaded from environment variables once at startup.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub retrieval_policy: BackendPolicy,
    pub llm_policy: BackendPolicy,
    pub retrieval_url: String,
    pub retrieval_timeout: Duration,
    pub openrouter_api_key: String,
    pub openrouter_base_url: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub session_ttl: Duration,
    pub max_sessions: usize,
    pub max_history_messages: usize,
    pub rate_limit_per_minute: u32,
    pub request_timeout: Duration,
    pub query_rewrite_enabled: bool,
    pub simulated_token_delay: Duration,
    pub system_prompt: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm_policy: BackendPolicy = parse_env("LLM_POLICY", BackendPolicy::Strict)?;
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if llm_policy == BackendPolicy::Strict && openrouter_api_key.trim().is_empty() {
            bail!(
                "OPENROUTER_API_KEY is required when LLM_POLICY=strict \
                 (set LLM_POLICY=simulated for local development)"
            );
        }

        Ok(Config {
            retrieval_policy: parse_env("RETRIEVAL_POLICY", BackendPolicy::Strict)?,
            llm_policy,
            retrieval_url: env_or("RETRIEVAL_URL", "http://localhost:8081"),
            retrieval_timeout: Duration::from_secs(parse_env("RETRIEVAL_TIMEOUT_SECS", 5)?),
            openrouter_api_key,
            openrouter_base_url: env_or("OPENROUTER_BASE_URL", "https://openrouter.ai/api/v1"),
            llm_model: env_or("LLM_MODEL", "nvidia/nemotron-nano-2407-instruct"),
            llm_max_tokens: parse_env("LLM_MAX_TOKENS", 1024)?,
            llm_temperature: parse_env("LLM_TEMPERATURE", 0.7)?,
            session_ttl: Duration::from_secs(parse_env("SESSION_TTL_SECS", 1800)?),
            max_sessions: parse_env("MAX_SESSIONS", 1000)?,
            max_history_messages: parse_env("MAX_HISTORY_MESSAGES", 20)?,
            rate_limit_per_minute: parse_env("RATE_LIMIT_PER_MINUTE", 10)?,
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 120)?),
            query_rewrite_enabled: parse_env("QUERY_REWRITE_ENABLED", false)?,
            simulated_token_delay: Duration::from_millis(parse_env("SIMULATED_TOKEN_DELAY_MS", 25)?),
            system_prompt: env_or("SYSTEM_PROMPT", DEFAULT_SYSTEM_PROMPT),
            port: parse_env("PORT", 3000)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Fully simulated configuration for tests and local development.
    pub fn simulated() -> Self {
        Config {
            retrieval_policy: BackendPolicy::Simulated,
            llm_policy: BackendPolicy::Simulated,
            retrieval_url: "http://localhost:8081".to_string(),
            retrieval_timeout: Duration::from_secs(5),
            openrouter_api_key: String::new(),
            openrouter_base_url: "https://openrouter.ai/api/v1".to_string(),
            llm_model: "simulated".to_string(),
            llm_max_tokens: 1024,
            llm_temperature: 0.7,
            session_ttl: Duration::from_secs(1800),
            max_sessions: 1000,
            max_history_messages: 20,
            rate_limit_per_minute: 10,
            request_timeout: Duration::from_secs(120),
            query_rewrite_enabled: false,
            simulated_token_delay: Duration::ZERO,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            port: 3000,
            rust_log: "info".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_policy_parses_case_insensitively() {
        assert_eq!("STRICT".parse::<BackendPolicy>().unwrap(), BackendPolicy::Strict);
        assert_eq!(
            " simulated ".parse::<BackendPolicy>().unwrap(),
            BackendPolicy::Simulated
        );
    }

    #[test]
    fn test_backend_policy_rejects_unknown_values() {
        let err = "mock".parse::<BackendPolicy>().unwrap_err();
        assert!(err.to_string().contains("unknown backend policy"));
    }

    #[test]
    fn test_parse_env_uses_default_when_unset() {
        let value: u32 = parse_env("RESUME_CHAT_TEST_SURELY_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_simulated_config_keeps_query_rewrite_off() {
        let config = Config::simulated();
        assert!(!config.query_rewrite_enabled);
        assert_eq!(config.retrieval_policy, BackendPolicy::Simulated);
        assert_eq!(config.llm_policy, BackendPolicy::Simulated);
    }
}
