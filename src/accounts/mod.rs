//! REST account endpoints: registration, login, and token verification.
//! These sit outside the real-time relay; the WebSocket side never
//! consults them.

pub mod login;
pub mod register;
pub mod verify;

use axum::{Json, http::StatusCode};
use serde::{Deserialize, Serialize};

/// Public view of an account, embedded in auth responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountInfo {
    pub username: String,
    pub email: String,
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Successful register/login response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: AccountInfo,
    pub token: String,
}

pub(crate) fn error(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}
