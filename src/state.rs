use std::sync::Arc;

use crate::chat::room::Room;
use crate::db::DbPool;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// The single global chat room: registry, history, and fan-out
    pub room: Arc<Room>,
}
