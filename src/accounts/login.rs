use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::accounts::{AccountInfo, AuthResponse, ErrorBody, error};
use crate::auth::{jwt, password};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/login
/// Check credentials and issue an access token. Unknown usernames and
/// wrong passwords are indistinguishable to the caller.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, Json<ErrorBody>)> {
    let username = req.username.trim().to_string();

    if username.is_empty() || req.password.is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "Username and password are required",
        ));
    }

    let db = state.db.clone();
    let jwt_secret = state.jwt_secret.clone();
    let supplied_password = req.password;

    let (username, email, token) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| error(StatusCode::INTERNAL_SERVER_ERROR, "Login error, please try again"))?;

        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT id, username, email, password_hash FROM users WHERE username = ?1",
                rusqlite::params![username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .ok();

        let Some((user_id, username, email, password_hash)) = row else {
            return Err(error(StatusCode::UNAUTHORIZED, "Invalid username or password"));
        };

        if !password::verify_password(&supplied_password, &password_hash) {
            return Err(error(StatusCode::UNAUTHORIZED, "Invalid username or password"));
        }

        let token = jwt::issue_access_token(&jwt_secret, &user_id, &username).map_err(|e| {
            tracing::error!(error = %e, "failed to issue token");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Login error, please try again")
        })?;

        Ok((username, email, token))
    })
    .await
    .map_err(|_| error(StatusCode::INTERNAL_SERVER_ERROR, "Login error, please try again"))??;

    tracing::info!(username = %username, "user logged in");

    Ok(Json(AuthResponse {
        message: "You have successfully logged in".to_string(),
        user: AccountInfo { username, email },
        token,
    }))
}
