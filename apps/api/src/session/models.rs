use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversation turn. Never mutated after it is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Set when the assistant text was cut short by a client disconnect.
    #[serde(default)]
    pub partial: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            partial: false,
            timestamp: Utc::now(),
        }
    }

    pub fn partial(role: Role, content: impl Into<String>) -> Self {
        Self {
            partial: true,
            ..Self::new(role, content)
        }
    }
}

/// Snapshot of a conversation as held by the session store.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_activity: now,
            messages: Vec::new(),
        }
    }

    /// Most recent `max_messages` messages in original order, or all of them.
    pub fn recent(&self, max_messages: Option<usize>) -> Vec<Message> {
        let skip = match max_messages {
            Some(max) => self.messages.len().saturating_sub(max),
            None => 0,
        };
        self.messages[skip..].to_vec()
    }

    /// Questions the user has already asked in this conversation.
    pub fn user_questions(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
