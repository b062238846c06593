//! Company (tenant) management. Companies are global, not prefix-partitioned;
//! the prefix they carry is what partitions everything else.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::envelope::{Envelope, Paginate, ScreenParams};
use crate::errors::AppError;
use crate::middleware::auth::{module_scopes, AuthUser};
use crate::AppState;

const MODULE: &str = "function.company";

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateCompany {
    pub name: String,
    pub prefix: String,
}

#[derive(Deserialize)]
pub struct UpdateCompany {
    pub name: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteIds {
    pub ids: Vec<Uuid>,
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/companies — paginated list.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<ScreenParams>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;
    page(&state, &params).await
}

/// POST /api/v1/companies/search — same list, screen params in the body.
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
        .paginate_companies(params.limit(), params.offset())
        .await?;
    Ok(Envelope::ok(&Paginate::new(
        rows,
        params.page(),
        params.limit(),
        total,
    )))
}

/// POST /api/v1/companies — create; an existing name answers the business
/// error envelope.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateCompany>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "store"))?;

    if state.db.find_company_by_name(&payload.name).await?.is_some() {
        return Ok(Envelope::error("数据已经存在！"));
    }

    let id = state
        .db
        .upsert_company(&payload.name, &payload.prefix)
        .await?;
    Ok(Envelope::ok(&json!({ "id": id, "name": payload.name })))
}

/// PATCH /api/v1/companies/:id — partial update.
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCompany>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "update"))?;

    let affected = state
        .db
        .update_company(id, payload.name.as_deref(), payload.prefix.as_deref())
        .await?;
    if affected == 0 {
        return Ok(Envelope::error("数据没有找到！"));
    }
    Ok(Envelope::ok_empty())
}

/// DELETE /api/v1/companies — bulk delete by id list.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<DeleteIds>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "delete"))?;
    state.db.delete_companies(&payload.ids).await?;
    Ok(Envelope::ok(&true))
}
