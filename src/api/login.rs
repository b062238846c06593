//! Password login: verify credentials, hand back a bearer token.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::envelope::Envelope;
use crate::errors::AppError;
use crate::middleware::auth::issue_token;
use crate::password::verify_password;
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Full username, `{prefix}@{identifier}`.
    pub username: String,
    pub password: String,
}

/// POST /api/v1/auth/login
///
/// Unknown user and wrong password answer identically, a bare 401.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Envelope, AppError> {
    let user = state
        .db
        .find_user_by_username(&payload.username)
        .await?
        .ok_or_else(AppError::unauthorized)?;

    if !verify_password(&payload.password, &user.password_hash) {
        tracing::warn!(user = %payload.username, "login rejected: bad password");
        return Err(AppError::unauthorized());
    }

    let token = issue_token(
        &state.config.jwt_secret,
        &user.username,
        user.scopes.0.clone(),
        &user.prefix,
        state.config.jwt_ttl_minutes,
    )?;

    tracing::info!(user = %user.username, "login ok");
    Ok(Envelope::ok(&json!({
        "access_token": token,
        "token_type": "bearer",
        "username": user.username,
        "scopes": user.scopes.0,
    })))
}
