use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sender name attached to system messages (welcome, join/leave notices).
pub const SYSTEM_USERNAME: &str = "System";

/// A single chat message as stored in history and sent on the wire.
/// Timestamps are always server-assigned at receipt, never client-supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub is_system: bool,
}

impl ChatMessage {
    /// A user message from a joined participant.
    pub fn user(username: &str, text: &str) -> Self {
        Self {
            username: username.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            is_system: false,
        }
    }

    /// A system message (presence notices, welcome seed).
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            username: SYSTEM_USERNAME.to_string(),
            text: text.into(),
            timestamp: Utc::now(),
            is_system: true,
        }
    }
}
