//! Permission CRUD. Creation is keyed on the unique scope; the tree itself is
//! normally maintained by the seed reconciliation, this surface covers manual
//! additions and renames.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::envelope::{Envelope, Paginate, ScreenParams};
use crate::errors::AppError;
use crate::middleware::auth::{module_scopes, AuthUser};
use crate::models::permission::NewPermission;
use crate::AppState;

const MODULE: &str = "function.permission";

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreatePermission {
    pub name: String,
    pub scope: String,
    pub parent_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_menu: bool,
    #[serde(default)]
    pub is_action: bool,
    pub icon: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
pub struct UpdatePermission {
    pub name: Option<String>,
    pub icon: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteIds {
    pub ids: Vec<Uuid>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/permissions — paginated flat list.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<ScreenParams>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;
    page(&state, &params).await
}

/// POST /api/v1/permissions/search — same list, screen params in the body.
pub async fn search(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(params): Json<ScreenParams>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;
    page(&state, &params).await
}

async fn page(state: &AppState, params: &ScreenParams) -> Result<Envelope, AppError> {
    let (rows, total) = state
        .db
        .paginate_permissions(params.limit(), params.offset())
        .await?;
    Ok(Envelope::ok(&Paginate::new(
        rows,
        params.page(),
        params.limit(),
        total,
    )))
}

/// POST /api/v1/permissions — create; an existing scope answers the business
/// error envelope.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreatePermission>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "store"))?;

    if state
        .db
        .find_permission_by_scope(&payload.scope)
        .await?
        .is_some()
    {
        return Ok(Envelope::error("数据已经存在！"));
    }

    let id = state
        .db
        .find_or_create_permission(&NewPermission {
            name: payload.name,
            scope: payload.scope,
            parent_id: payload.parent_id,
            is_menu: payload.is_menu,
            is_action: payload.is_action,
            icon: payload.icon,
        })
        .await?;
    Ok(Envelope::ok(&id))
}

/// PATCH /api/v1/permissions/:id — rename / re-icon. Scope is immutable.
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePermission>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "update"))?;

    let affected = state
        .db
        .update_permission(id, payload.name.as_deref(), payload.icon.as_deref())
        .await?;
    if affected == 0 {
        return Ok(Envelope::error("数据没有找到！"));
    }
    Ok(Envelope::ok_empty())
}

/// DELETE /api/v1/permissions — bulk delete by id list.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<DeleteIds>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "delete"))?;
    state.db.delete_permissions(&payload.ids).await?;
    Ok(Envelope::ok(&true))
}
