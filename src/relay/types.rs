use serde::{Deserialize, Serialize};

/// One incremental piece of a streamed completion.
///
/// All fragments of one reply share `completion_id`. A non-empty
/// `finish_reason` marks the last fragment of that reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(rename = "id")]
    pub completion_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Fragment {
    pub fn new(completion_id: impl Into<String>, created: impl Into<String>) -> Self {
        Self {
            completion_id: completion_id.into(),
            role: None,
            content: None,
            created: created.into(),
            finish_reason: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.finish_reason.as_deref().is_some_and(|r| !r.is_empty())
    }
}
