use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One persisted conversational turn.
///
/// `created` is a string-encoded unix timestamp and doubles as the sort key
/// when a conversation is listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub created: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>, created: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            created: created.into(),
        }
    }

    pub fn user(content: impl Into<String>, created: impl Into<String>) -> Self {
        Self::new("user", content, created)
    }

    pub fn assistant(content: impl Into<String>, created: impl Into<String>) -> Self {
        Self::new("assistant", content, created)
    }

    pub fn system(content: impl Into<String>, created: impl Into<String>) -> Self {
        Self::new("system", content, created)
    }
}

/// Current time in the same encoding the completion provider uses for
/// streamed chunks: whole unix seconds.
pub fn timestamp_now() -> String {
    Utc::now().timestamp().to_string()
}
