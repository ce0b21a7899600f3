use axum::Router;
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};

use crate::accounts::{login, register, verify};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on auth endpoints.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>.
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5) // Allow burst of 5
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    // Account routes with rate limiting
    let account_routes = Router::new()
        .route("/api/register", axum::routing::post(register::register))
        .route("/api/login", axum::routing::post(login::login))
        .route(
            "/api/verify-token",
            axum::routing::get(verify::verify_token),
        )
        .layer(GovernorLayer {
            config: governor_config,
        });

    // WebSocket endpoint (no auth — the display identity is announced in-band)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Root banner and health check
    let public_routes = Router::new()
        .route("/", axum::routing::get(root))
        .route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(account_routes)
        .merge(ws_routes)
        .merge(public_routes)
        .with_state(state)
}

/// GET / — liveness banner for humans and load balancers.
async fn root() -> &'static str {
    "Chat Server is running"
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
