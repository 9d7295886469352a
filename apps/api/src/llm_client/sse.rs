//! Parser for the provider's upstream `text/event-stream` body.
//!
//! Bytes arrive in arbitrary slices; `LineBuffer` reassembles complete lines
//! (including multi-byte characters split across slices) and
//! `parse_data_line` turns each `data:` line into an `UpstreamEvent`.

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Appends raw bytes and returns every line completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Returns the trailing partial line, if the body ended without a newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Delta {
        content: String,
        finish_reason: Option<String>,
        total_tokens: Option<u32>,
    },
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    total_tokens: u32,
}

/// Comment lines (`: keep-alive`), blank lines and undecodable payloads yield `None`.
pub fn parse_data_line(line: &str) -> Option<UpstreamEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(UpstreamEvent::Done);
    }

    let payload: StreamPayload = match serde_json::from_str(data) {
        Ok(p) => p,
        Err(e) => {
            warn!("Failed to parse streaming chunk: {e}");
            return None;
        }
    };

    let choice = payload.choices.into_iter().next();
    let (content, finish_reason) = match choice {
        Some(c) => (
            c.delta.and_then(|d| d.content).unwrap_or_default(),
            c.finish_reason,
        ),
        None => (String::new(), None),
    };

    Some(UpstreamEvent::Delta {
        content,
        finish_reason,
        total_tokens: payload.usage.map(|u| u.total_tokens),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_reassembles_split_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b": 1}\r\ndata: [DONE]\n");
        assert_eq!(lines, vec!["data: {\"a\": 1}", "data: [DONE]"]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_chars_intact() {
        let text = "data: café\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&text[..split]).is_empty());
        assert_eq!(buffer.push(&text[split..]), vec!["data: café"]);
    }

    #[test]
    fn test_parse_delta_with_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_data_line(line),
            Some(UpstreamEvent::Delta {
                content: "Hello".to_string(),
                finish_reason: None,
                total_tokens: None,
            })
        );
    }

    #[test]
    fn test_parse_usage_and_finish_reason() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"total_tokens":88}}"#;
        assert_eq!(
            parse_data_line(line),
            Some(UpstreamEvent::Delta {
                content: String::new(),
                finish_reason: Some("stop".to_string()),
                total_tokens: Some(88),
            })
        );
    }

    #[test]
    fn test_parse_done_and_ignored_lines() {
        assert_eq!(parse_data_line("data: [DONE]"), Some(UpstreamEvent::Done));
        assert_eq!(parse_data_line(": OPENROUTER PROCESSING"), None);
        assert_eq!(parse_data_line(""), None);
        assert_eq!(parse_data_line("data: {not json"), None);
    }
}
