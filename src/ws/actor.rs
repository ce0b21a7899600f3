use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::chat::room::{self, Room};
use crate::ws::protocol;

/// Run the actor-per-connection pattern for an accepted WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: decodes inbound frames and drives the room
///
/// The mpsc channel allows the room to push frames to this client by
/// cloning the sender. The connection starts pending; it enters the room
/// only once a join announcement with a non-empty display name arrives.
/// There is no idle timeout: the actor exits only when the transport
/// closes or errors, and that exit is what deregisters the connection.
pub async fn run_connection(socket: WebSocket, room: Arc<Room>) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let conn = room::next_connection_id();

    tracing::info!(connection = conn, "WebSocket actor started");

    // Writer task: forwards mpsc messages to the WebSocket sink.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Reader loop: process incoming WebSocket messages.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_frame(text.as_str(), &room, conn, &tx);
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        connection = conn,
                        "ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Ping(data) => {
                    // Respond to client pings; the server sends none itself.
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Pong(_) => {}
                Message::Close(frame) => {
                    tracing::info!(
                        connection = conn,
                        reason = ?frame,
                        "client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(connection = conn, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                // Stream ended: client disconnected.
                tracing::info!(connection = conn, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();

    // Deregister; a leave notice goes out only if an identity was bound.
    match room.leave(conn) {
        Some(username) => {
            tracing::info!(connection = conn, username = %username, "user left");
        }
        None => {
            tracing::debug!(connection = conn, "closed before announcing an identity");
        }
    }

    tracing::info!(connection = conn, "WebSocket actor stopped");
}

/// Writer task: receives messages from the mpsc channel and forwards them
/// to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken.
            break;
        }
    }
}
