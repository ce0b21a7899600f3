use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::accounts::{AccountInfo, AuthResponse, ErrorBody, error};
use crate::auth::{jwt, password};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/register
/// Create a new account and issue an access token.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, Json<ErrorBody>)> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();

    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "All fields are required"));
    }

    let db = state.db.clone();
    let jwt_secret = state.jwt_secret.clone();
    let password_hash = password::hash_password(&req.password);

    let (username, email, token) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| error(StatusCode::INTERNAL_SERVER_ERROR, "Registration error, please try again"))?;

        // Reject if the username or email is already taken
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1 OR email = ?2",
                rusqlite::params![username, email],
                |row| row.get(0),
            )
            .ok();
        if existing.is_some() {
            return Err(error(
                StatusCode::CONFLICT,
                "Username or email address is already in use",
            ));
        }

        let user_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![user_id, username, email, password_hash, now, now],
        )
        .map_err(|e| {
            tracing::error!(error = %e, "failed to insert user");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Registration error, please try again")
        })?;

        let token = jwt::issue_access_token(&jwt_secret, &user_id, &username).map_err(|e| {
            tracing::error!(error = %e, "failed to issue token");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Registration error, please try again")
        })?;

        Ok((username, email, token))
    })
    .await
    .map_err(|_| error(StatusCode::INTERNAL_SERVER_ERROR, "Registration error, please try again"))??;

    tracing::info!(username = %username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Registration successful".to_string(),
            user: AccountInfo { username, email },
            token,
        }),
    ))
}
