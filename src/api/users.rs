//! User management. Usernames are tenant-qualified: the caller supplies the
//! bare identifier and the stored name becomes `{prefix}@{identifier}` with
//! the caller's own prefix, so a tenant admin cannot create users elsewhere.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::envelope::{Envelope, Paginate, ScreenParams};
use crate::errors::AppError;
use crate::middleware::auth::{module_scopes, AuthUser};
use crate::password::hash_password;
use crate::AppState;

const MODULE: &str = "function.user";

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateUser {
    /// Bare identifier; the stored username is `{prefix}@{username}`.
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateUser {
    pub password: Option<String>,
    pub scopes: Option<Vec<String>>,
}

#[derive(Deserialize)]
pub struct DeleteIds {
    pub ids: Vec<Uuid>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/users — paginated list for the caller's tenant.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<ScreenParams>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;
    page(&state, &auth, &params).await
}

/// POST /api/v1/users/search — same list, screen params in the body.
pub async fn search(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(params): Json<ScreenParams>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;
    page(&state, &auth, &params).await
}

async fn page(
    state: &AppState,
    auth: &AuthUser,
    params: &ScreenParams,
) -> Result<Envelope, AppError> {
    let (rows, total) = state
        .db
        .paginate_users(&auth.prefix, params.limit(), params.offset())
        .await?;
    Ok(Envelope::ok(&Paginate::new(
        rows,
        params.page(),
        params.limit(),
        total,
    )))
}

/// POST /api/v1/users — create; a taken username answers the business error
/// envelope.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateUser>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "store"))?;

    let username = format!("{}@{}", auth.prefix, payload.username);
    if state.db.find_user_by_username(&username).await?.is_some() {
        return Ok(Envelope::error("数据已经存在！"));
    }

    let hash = hash_password(&payload.password)?;
    let id = state
        .db
        .upsert_user(&username, &hash, &auth.prefix, &payload.scopes)
        .await?;
    Ok(Envelope::ok(&json!({ "id": id, "username": username })))
}

/// PATCH /api/v1/users/:id — reset password and/or replace scopes.
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUser>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "update"))?;

    let hash = match &payload.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };
    let affected = state
        .db
        .update_user(id, hash.as_deref(), payload.scopes.as_deref())
        .await?;
    if affected == 0 {
        return Ok(Envelope::error("数据没有找到！"));
    }
    Ok(Envelope::ok_empty())
}

/// DELETE /api/v1/users — bulk delete by id list.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<DeleteIds>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "delete"))?;
    state.db.delete_users(&payload.ids).await?;
    Ok(Envelope::ok(&true))
}
