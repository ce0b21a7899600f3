use axum::{Json, extract::State, http::HeaderMap, http::StatusCode};
use serde::Serialize;

use crate::accounts::AccountInfo;
use crate::auth::jwt;
use crate::state::AppState;

/// Response body for token verification. Failure paths still carry a JSON
/// body (`{"valid": false}`) because clients parse the body regardless of
/// the status code.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<AccountInfo>,
}

/// GET /api/verify-token
/// Validate the Authorization: Bearer token and return the account it
/// belongs to.
pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, (StatusCode, Json<VerifyResponse>)> {
    let invalid = |status: StatusCode| {
        (
            status,
            Json(VerifyResponse {
                valid: false,
                user: None,
            }),
        )
    };

    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| invalid(StatusCode::UNAUTHORIZED))?;

    let claims = jwt::validate_access_token(&state.jwt_secret, token)
        .map_err(|_| invalid(StatusCode::UNAUTHORIZED))?;

    let db = state.db.clone();
    let user_id = claims.sub;

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        conn.query_row(
            "SELECT username, email FROM users WHERE id = ?1",
            rusqlite::params![user_id],
            |row| {
                Ok(AccountInfo {
                    username: row.get(0)?,
                    email: row.get(1)?,
                })
            },
        )
        .ok()
    })
    .await
    .ok()
    .flatten();

    match user {
        Some(user) => Ok(Json(VerifyResponse {
            valid: true,
            user: Some(user),
        })),
        // Token was valid but the account no longer exists
        None => Err(invalid(StatusCode::NOT_FOUND)),
    }
}
