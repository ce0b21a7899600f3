use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Deliberately unauthenticated: the display
/// identity is announced in-band via the join event and is never checked
/// against the account issued by the REST login flow. Spoofing prevention
/// is the responsibility of that outer layer, not of this relay.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| actor::run_connection(socket, state.room.clone()))
}
