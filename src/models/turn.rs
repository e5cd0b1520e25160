//! Conversation log entries.

use serde::{Deserialize, Serialize};

/// Timestamp format used in persisted conversation logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in a user's conversation log.
///
/// Entries are timestamped at append time; the persisted log is ordered by
/// append, with timestamps monotonically non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

impl ConversationTurn {
    /// Create a turn timestamped now.
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}
