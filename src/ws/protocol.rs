//! Typed JSON wire protocol and dispatch for inbound client frames.

use serde::{Deserialize, Serialize};

use crate::chat::message::ChatMessage;
use crate::chat::room::{ConnectionId, JoinError, Room};
use crate::ws::ConnectionSender;

/// Events a client may send. Unknown or malformed frames are logged and
/// ignored; they never terminate the connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Identity announcement. Must arrive before any message send.
    Join { username: String },
    /// A chat message from a joined participant.
    SendMessage { text: String },
}

/// Events the server sends.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Private replay of the buffered history, sent once on join,
    /// oldest message first.
    ChatHistory { messages: Vec<ChatMessage> },
    /// A user message, broadcast to all participants.
    Message { message: ChatMessage },
    /// Join notice plus the roster after the join, broadcast to all
    /// participants including the joiner.
    UserJoined {
        message: ChatMessage,
        users: Vec<String>,
    },
    /// Leave notice plus the roster after the leave.
    UserLeft {
        message: ChatMessage,
        users: Vec<String>,
    },
}

/// Decode one text frame and drive the room accordingly.
pub fn handle_text_frame(text: &str, room: &Room, conn: ConnectionId, tx: &ConnectionSender) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(connection = conn, error = %e, "unparseable client frame");
            return;
        }
    };

    match event {
        ClientEvent::Join { username } => {
            let username = username.trim();
            if username.is_empty() {
                // Not announced: the connection stays pending.
                tracing::debug!(connection = conn, "ignoring join with empty display name");
                return;
            }
            match room.join(conn, username, tx.clone()) {
                Ok(()) => {
                    tracing::info!(connection = conn, username = %username, "user joined");
                }
                Err(JoinError::AlreadyJoined) => {
                    tracing::debug!(
                        connection = conn,
                        "ignoring repeat identity announcement"
                    );
                }
            }
        }
        ClientEvent::SendMessage { text } => {
            room.send(conn, &text);
        }
    }
}
