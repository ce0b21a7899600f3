//! The single global chat room: connection registry, bounded message
//! history, presence notices, and broadcast fan-out.
//!
//! All mutations run under one mutex so that the operations triggered by
//! one inbound event (join, send, disconnect) complete as a unit before
//! the next event's operations begin. Every participant therefore observes
//! broadcast messages in the same order. Outbound delivery itself is an
//! unbounded-channel send and never blocks while the lock is held.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::Message;
use indexmap::IndexMap;

use crate::chat::message::ChatMessage;
use crate::ws::ConnectionSender;
use crate::ws::protocol::ServerEvent;

/// Process-unique identifier for one WebSocket connection. Never reused.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate an id for a newly accepted connection.
pub fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Room::join failure modes.
#[derive(Debug, PartialEq, Eq)]
pub enum JoinError {
    /// The connection already announced an identity. The first identity
    /// wins; a repeat announcement changes nothing.
    AlreadyJoined,
}

/// One registered participant: the announced display name and the sender
/// half of the connection's outbound channel. The room never owns the
/// transport itself and never closes it.
struct Peer {
    username: String,
    sender: ConnectionSender,
}

struct RoomInner {
    /// Registration-ordered map of live, announced connections.
    /// A connection appears here iff it completed its identity
    /// announcement and has not yet disconnected.
    peers: IndexMap<ConnectionId, Peer>,
    /// Insertion-ordered message log, oldest first. Length never exceeds
    /// the room capacity; the oldest entry is evicted first.
    history: VecDeque<ChatMessage>,
}

impl RoomInner {
    fn roster(&self) -> Vec<String> {
        self.peers.values().map(|p| p.username.clone()).collect()
    }

    /// Deliver an event to every registered connection. The frame is
    /// serialized once and cloned per recipient. A failed send means the
    /// recipient's actor already dropped its receiver; the connection's
    /// own close handling removes it from the registry, so the failure is
    /// only logged and the remaining recipients still get the frame.
    fn fan_out(&self, event: &ServerEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize broadcast event");
                return;
            }
        };
        let msg = Message::Text(text.into());

        for (conn, peer) in &self.peers {
            if peer.sender.send(msg.clone()).is_err() {
                tracing::debug!(
                    connection = conn,
                    username = %peer.username,
                    "dropping frame for closed connection"
                );
            }
        }
    }

    /// Deliver an event to a single connection, outside the registry
    /// (used for the private history replay during join).
    fn send_to(sender: &ConnectionSender, event: &ServerEvent) {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize event");
                return;
            }
        };
        let _ = sender.send(Message::Text(text.into()));
    }
}

/// Shared room state. Constructed once at startup and held in AppState.
pub struct Room {
    capacity: usize,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Create the room with a fixed history capacity, seeded with the
    /// welcome message.
    pub fn new(capacity: usize) -> Self {
        let mut history = VecDeque::with_capacity(capacity);
        history.push_back(ChatMessage::system("Welcome to the chat!"));
        Self {
            capacity,
            inner: Mutex::new(RoomInner {
                peers: IndexMap::new(),
                history,
            }),
        }
    }

    /// Bind an identity to a connection. On success the current history is
    /// replayed privately to this connection, then a join notice (with the
    /// updated roster) is broadcast to everyone, the joiner included.
    /// Join notices are ephemeral: they are never appended to history.
    pub fn join(
        &self,
        conn: ConnectionId,
        username: &str,
        sender: ConnectionSender,
    ) -> Result<(), JoinError> {
        let mut inner = self.inner.lock().expect("room lock poisoned");

        if inner.peers.contains_key(&conn) {
            return Err(JoinError::AlreadyJoined);
        }

        // Private replay first, so the joiner never sees its own join
        // notice duplicated into the replayed log.
        let replay = ServerEvent::ChatHistory {
            messages: inner.history.iter().cloned().collect(),
        };
        RoomInner::send_to(&sender, &replay);

        inner.peers.insert(
            conn,
            Peer {
                username: username.to_string(),
                sender,
            },
        );

        let notice = ChatMessage::system(format!("{username} has joined the chat"));
        let users = inner.roster();
        inner.fan_out(&ServerEvent::UserJoined {
            message: notice,
            users,
        });

        Ok(())
    }

    /// Append a user message to history and broadcast it to everyone.
    /// A send from a connection that never announced an identity signals
    /// no session and is discarded. Empty or whitespace-only text is
    /// rejected rather than broadcast.
    pub fn send(&self, conn: ConnectionId, text: &str) {
        if text.trim().is_empty() {
            tracing::debug!(connection = conn, "discarding empty message");
            return;
        }

        let mut inner = self.inner.lock().expect("room lock poisoned");

        let username = match inner.peers.get(&conn) {
            Some(peer) => peer.username.clone(),
            None => {
                tracing::debug!(connection = conn, "discarding message from unannounced connection");
                return;
            }
        };

        let message = ChatMessage::user(&username, text);
        inner.history.push_back(message.clone());
        while inner.history.len() > self.capacity {
            inner.history.pop_front();
        }

        inner.fan_out(&ServerEvent::Message { message });
    }

    /// Remove a connection from the registry. If an identity was bound,
    /// a leave notice is broadcast to the remaining participants and the
    /// removed display name is returned. A disconnect before announcement
    /// removes nothing and produces no notice.
    pub fn leave(&self, conn: ConnectionId) -> Option<String> {
        let mut inner = self.inner.lock().expect("room lock poisoned");

        let peer = inner.peers.shift_remove(&conn)?;

        let notice = ChatMessage::system(format!("{} has left the chat", peer.username));
        let users = inner.roster();
        inner.fan_out(&ServerEvent::UserLeft {
            message: notice,
            users,
        });

        Some(peer.username)
    }

    /// Registration-ordered list of all present display names.
    pub fn roster(&self) -> Vec<String> {
        self.inner.lock().expect("room lock poisoned").roster()
    }

    /// Point-in-time copy of the history, oldest first. Later mutations of
    /// the live buffer do not affect the returned value.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.inner
            .lock()
            .expect("room lock poisoned")
            .history
            .iter()
            .cloned()
            .collect()
    }
}
