//! Integration tests for the WebSocket relay: join/replay, broadcast
//! ordering, presence notices, and misbehaving-connection handling.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley_server::ws::protocol::ServerEvent;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsWriter = futures_util::stream::SplitSink<WsStream, Message>;
type WsReader = futures_util::stream::SplitStream<WsStream>;

/// Helper: start the server on a random port with the given history
/// capacity and return its address.
async fn start_test_server(history_capacity: usize) -> SocketAddr {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = parley_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = parley_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");
    let room = Arc::new(parley_server::chat::room::Room::new(history_capacity));

    let state = parley_server::state::AppState {
        db,
        jwt_secret,
        room,
    };

    let app = parley_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    addr
}

async fn connect(addr: &SocketAddr) -> (WsWriter, WsReader) {
    let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("Failed to connect to WebSocket");
    stream.split()
}

async fn send_json(write: &mut WsWriter, value: serde_json::Value) {
    write
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Read frames until the next text frame and decode it.
async fn next_event(read: &mut WsReader) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timed out waiting for server event")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("valid server event");
        }
    }
}

/// Assert that no frame arrives within the given window.
async fn expect_silence(read: &mut WsReader, window: Duration) {
    let result = tokio::time::timeout(window, read.next()).await;
    assert!(result.is_err(), "Expected no frame, got: {:?}", result);
}

/// Connect, announce an identity, and drain the replay and own join notice.
async fn join(addr: &SocketAddr, username: &str) -> (WsWriter, WsReader) {
    let (mut write, mut read) = connect(addr).await;
    send_json(&mut write, json!({"type": "join", "username": username})).await;

    match next_event(&mut read).await {
        ServerEvent::ChatHistory { .. } => {}
        other => panic!("Expected chatHistory first, got {other:?}"),
    }
    match next_event(&mut read).await {
        ServerEvent::UserJoined { .. } => {}
        other => panic!("Expected userJoined second, got {other:?}"),
    }

    (write, read)
}

/// Read the next event and assert it is a user message; return its
/// (username, text).
async fn next_message(read: &mut WsReader) -> (String, String) {
    match next_event(read).await {
        ServerEvent::Message { message } => (message.username, message.text),
        other => panic!("Expected message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_replays_history_then_announces() {
    let addr = start_test_server(100).await;

    let (mut write, mut read) = connect(&addr).await;
    send_json(&mut write, json!({"type": "join", "username": "alice"})).await;

    // Private replay comes first, seeded with the welcome message only.
    match next_event(&mut read).await {
        ServerEvent::ChatHistory { messages } => {
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].username, "System");
            assert_eq!(messages[0].text, "Welcome to the chat!");
            assert!(messages[0].is_system);
        }
        other => panic!("Expected chatHistory first, got {other:?}"),
    }

    // The joiner receives its own join notice via broadcast, not replay.
    match next_event(&mut read).await {
        ServerEvent::UserJoined { message, users } => {
            assert_eq!(message.text, "alice has joined the chat");
            assert!(message.is_system);
            assert_eq!(users, vec!["alice".to_string()]);
        }
        other => panic!("Expected userJoined second, got {other:?}"),
    }
}

#[tokio::test]
async fn test_replay_includes_prior_messages_without_duplicates() {
    let addr = start_test_server(100).await;

    let (mut alice_write, mut alice_read) = join(&addr, "alice").await;
    send_json(&mut alice_write, json!({"type": "sendMessage", "text": "m1"})).await;
    send_json(&mut alice_write, json!({"type": "sendMessage", "text": "m2"})).await;
    assert_eq!(next_message(&mut alice_read).await.1, "m1");
    assert_eq!(next_message(&mut alice_read).await.1, "m2");

    let (mut bob_write, mut bob_read) = connect(&addr).await;
    send_json(&mut bob_write, json!({"type": "join", "username": "bob"})).await;

    match next_event(&mut bob_read).await {
        ServerEvent::ChatHistory { messages } => {
            let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
            assert_eq!(texts, vec!["Welcome to the chat!", "m1", "m2"]);
            // Presence notices never appear in replay
            assert!(messages.iter().all(|m| !m.text.contains("has joined")));
        }
        other => panic!("Expected chatHistory, got {other:?}"),
    }
    match next_event(&mut bob_read).await {
        ServerEvent::UserJoined { users, .. } => {
            assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
        }
        other => panic!("Expected userJoined, got {other:?}"),
    }

    // No duplicate of the replayed messages arrives via broadcast.
    expect_silence(&mut bob_read, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_total_order_observed_by_all() {
    let addr = start_test_server(100).await;

    let (mut alice_write, mut alice_read) = join(&addr, "alice").await;
    let (mut bob_write, mut bob_read) = join(&addr, "bob").await;

    // Alice still has bob's join notice queued.
    match next_event(&mut alice_read).await {
        ServerEvent::UserJoined { .. } => {}
        other => panic!("Expected userJoined, got {other:?}"),
    }

    send_json(&mut alice_write, json!({"type": "sendMessage", "text": "one"})).await;
    assert_eq!(next_message(&mut alice_read).await.1, "one");
    assert_eq!(next_message(&mut bob_read).await.1, "one");

    send_json(&mut bob_write, json!({"type": "sendMessage", "text": "two"})).await;
    assert_eq!(next_message(&mut alice_read).await.1, "two");
    assert_eq!(next_message(&mut bob_read).await.1, "two");

    send_json(&mut alice_write, json!({"type": "sendMessage", "text": "three"})).await;
    let (sender, text) = next_message(&mut alice_read).await;
    assert_eq!((sender.as_str(), text.as_str()), ("alice", "three"));
    let (sender, text) = next_message(&mut bob_read).await;
    assert_eq!((sender.as_str(), text.as_str()), ("alice", "three"));
}

#[tokio::test]
async fn test_eviction_bounds_replay() {
    let addr = start_test_server(2).await;

    let (mut alice_write, mut alice_read) = join(&addr, "alice").await;
    for text in ["A", "B", "C"] {
        send_json(&mut alice_write, json!({"type": "sendMessage", "text": text})).await;
        next_message(&mut alice_read).await;
    }

    let (mut bob_write, mut bob_read) = connect(&addr).await;
    send_json(&mut bob_write, json!({"type": "join", "username": "bob"})).await;

    match next_event(&mut bob_read).await {
        ServerEvent::ChatHistory { messages } => {
            let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
            // The welcome seed and "A" were evicted first.
            assert_eq!(texts, vec!["B", "C"]);
        }
        other => panic!("Expected chatHistory, got {other:?}"),
    }
}

#[tokio::test]
async fn test_send_before_join_is_discarded() {
    let addr = start_test_server(100).await;

    let (mut pending_write, mut pending_read) = connect(&addr).await;
    send_json(
        &mut pending_write,
        json!({"type": "sendMessage", "text": "sneaky"}),
    )
    .await;
    expect_silence(&mut pending_read, Duration::from_millis(300)).await;

    // The discarded message never reached history.
    let (mut alice_write, mut alice_read) = connect(&addr).await;
    send_json(&mut alice_write, json!({"type": "join", "username": "alice"})).await;
    match next_event(&mut alice_read).await {
        ServerEvent::ChatHistory { messages } => {
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].text, "Welcome to the chat!");
        }
        other => panic!("Expected chatHistory, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_leave_notice_without_announcement() {
    let addr = start_test_server(100).await;

    let (_alice_write, mut alice_read) = join(&addr, "alice").await;

    // A connection that never announces closes again.
    {
        let (mut write, _read) = connect(&addr).await;
        write.send(Message::Close(None)).await.expect("close");
    }

    expect_silence(&mut alice_read, Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_presence_symmetry() {
    let addr = start_test_server(100).await;

    let (_alice_write, mut alice_read) = join(&addr, "alice").await;

    let (mut bob_write, _bob_read) = join(&addr, "bob").await;
    match next_event(&mut alice_read).await {
        ServerEvent::UserJoined { message, users } => {
            assert_eq!(message.text, "bob has joined the chat");
            assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
        }
        other => panic!("Expected userJoined, got {other:?}"),
    }

    bob_write.send(Message::Close(None)).await.expect("close");

    match next_event(&mut alice_read).await {
        ServerEvent::UserLeft { message, users } => {
            assert_eq!(message.text, "bob has left the chat");
            assert_eq!(users, vec!["alice".to_string()]);
        }
        other => panic!("Expected userLeft, got {other:?}"),
    }

    // Exactly one joined and one left notice — nothing else follows.
    expect_silence(&mut alice_read, Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_duplicate_join_keeps_first_identity() {
    let addr = start_test_server(100).await;

    let (mut write, mut read) = join(&addr, "alice").await;

    // A repeat announcement is ignored: no second notice goes out.
    send_json(&mut write, json!({"type": "join", "username": "impostor"})).await;
    expect_silence(&mut read, Duration::from_millis(300)).await;

    send_json(&mut write, json!({"type": "sendMessage", "text": "hi"})).await;
    let (sender, text) = next_message(&mut read).await;
    assert_eq!((sender.as_str(), text.as_str()), ("alice", "hi"));
}

#[tokio::test]
async fn test_abrupt_peer_disconnect_does_not_stop_delivery() {
    let addr = start_test_server(100).await;

    let (mut alice_write, mut alice_read) = join(&addr, "alice").await;
    let (bob_write, bob_read) = join(&addr, "bob").await;
    match next_event(&mut alice_read).await {
        ServerEvent::UserJoined { .. } => {}
        other => panic!("Expected userJoined, got {other:?}"),
    }

    // Bob's transport goes away without a close handshake.
    drop(bob_write);
    drop(bob_read);

    send_json(
        &mut alice_write,
        json!({"type": "sendMessage", "text": "still here"}),
    )
    .await;

    // Alice still receives the message; bob's leave notice follows once
    // the server notices the dead transport.
    let mut saw_message = false;
    for _ in 0..2 {
        match next_event(&mut alice_read).await {
            ServerEvent::Message { message } => {
                assert_eq!(message.text, "still here");
                saw_message = true;
                break;
            }
            ServerEvent::UserLeft { .. } => continue,
            other => panic!("Unexpected event: {other:?}"),
        }
    }
    assert!(saw_message, "Broadcast must survive a dead recipient");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let addr = start_test_server(100).await;

    let (mut write, mut read) = join(&addr, "alice").await;

    send_json(&mut write, json!({"type": "sendMessage", "text": "   "})).await;
    expect_silence(&mut read, Duration::from_millis(300)).await;

    send_json(&mut write, json!({"type": "sendMessage", "text": "real"})).await;
    assert_eq!(next_message(&mut read).await.1, "real");
}

#[tokio::test]
async fn test_whitespace_identity_stays_pending() {
    let addr = start_test_server(100).await;

    let (mut write, mut read) = connect(&addr).await;

    // A blank display name does not announce; the connection stays pending.
    send_json(&mut write, json!({"type": "join", "username": "   "})).await;
    expect_silence(&mut read, Duration::from_millis(300)).await;

    // Still pending: sends are discarded.
    send_json(&mut write, json!({"type": "sendMessage", "text": "hello"})).await;
    expect_silence(&mut read, Duration::from_millis(300)).await;

    // A proper announcement afterwards completes the join.
    send_json(&mut write, json!({"type": "join", "username": "dave"})).await;
    match next_event(&mut read).await {
        ServerEvent::ChatHistory { .. } => {}
        other => panic!("Expected chatHistory, got {other:?}"),
    }
    match next_event(&mut read).await {
        ServerEvent::UserJoined { message, .. } => {
            assert_eq!(message.text, "dave has joined the chat");
        }
        other => panic!("Expected userJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let addr = start_test_server(100).await;

    let (mut write, mut read) = join(&addr, "alice").await;

    write
        .send(Message::Text("not json at all".into()))
        .await
        .expect("send");
    expect_silence(&mut read, Duration::from_millis(300)).await;

    // The connection survives and keeps working.
    send_json(&mut write, json!({"type": "sendMessage", "text": "ok"})).await;
    assert_eq!(next_message(&mut read).await.1, "ok");
}
