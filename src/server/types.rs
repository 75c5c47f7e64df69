use crate::history::ChatMessage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub message: String,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub chat_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// History fetch failure: the error plus an explicitly empty history.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryErrorResponse {
    pub error: String,
    pub messages: Vec<ChatMessage>,
}
