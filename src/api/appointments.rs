//! Appointment CRUD, partitioned by the caller's tenant prefix. Also hosts
//! the `params` endpoint that renders the caller's visible permission tree.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::envelope::{Envelope, Paginate, ScreenParams};
use crate::errors::AppError;
use crate::middleware::auth::{module_scopes, AuthUser};
use crate::models::permission::build_tree;
use crate::store::postgres::{AppointmentRow, PgStore};
use crate::AppState;

const MODULE: &str = "function.appointment";

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateAppointment {
    pub name: String,
    pub remark: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAppointment {
    pub name: Option<String>,
    pub remark: Option<String>,
}

#[derive(Deserialize)]
pub struct DeleteIds {
    pub ids: Vec<Uuid>,
}

/// Storage seam for appointment creation: the duplicate check and the insert.
/// `PgStore` implements it against the database; tests use an in-memory list.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_by_name(
        &self,
        prefix: &str,
        name: &str,
    ) -> anyhow::Result<Option<AppointmentRow>>;
    async fn insert(
        &self,
        prefix: &str,
        name: &str,
        remark: Option<&str>,
    ) -> anyhow::Result<AppointmentRow>;
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn find_by_name(
        &self,
        prefix: &str,
        name: &str,
    ) -> anyhow::Result<Option<AppointmentRow>> {
        self.find_appointment_by_name(prefix, name).await
    }

    async fn insert(
        &self,
        prefix: &str,
        name: &str,
        remark: Option<&str>,
    ) -> anyhow::Result<AppointmentRow> {
        self.insert_appointment(prefix, name, remark).await
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /api/v1/appointments — paginated list for the caller's tenant.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(params): Query<ScreenParams>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;
    page(&state, &auth, &params).await
}

/// POST /api/v1/appointments/search — same list, screen params in the body.
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
        .paginate_appointments(&auth.prefix, params.limit(), params.offset())
        .await?;
    Ok(Envelope::ok(&Paginate::new(
        rows,
        params.page(),
        params.limit(),
        total,
    )))
}

/// GET /api/v1/appointments/params — permission tree visible to the caller.
/// Wildcard callers see the whole tree.
pub async fn params(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "list"))?;

    let rows = if auth.scopes.iter().any(|s| s == "*") {
        state.db.list_permissions().await?
    } else {
        state.db.list_permissions_in_scopes(&auth.scopes).await?
    };
    Ok(Envelope::ok(&json!({ "permissions": build_tree(&rows) })))
}

/// POST /api/v1/appointments — create; a duplicate name within the tenant
/// answers the business error envelope, not an HTTP error.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateAppointment>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "store"))?;
    store_appointment(&state.db, &auth.prefix, &payload).await
}

async fn store_appointment<S: AppointmentStore + ?Sized>(
    store: &S,
    prefix: &str,
    payload: &CreateAppointment,
) -> Result<Envelope, AppError> {
    if store.find_by_name(prefix, &payload.name).await?.is_some() {
        return Ok(Envelope::error("数据已经存在！"));
    }

    let row = store
        .insert(prefix, &payload.name, payload.remark.as_deref())
        .await?;
    Ok(Envelope::ok(&row))
}

/// PATCH /api/v1/appointments/:id — partial update.
pub async fn update(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAppointment>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "update"))?;

    let affected = state
        .db
        .update_appointment(id, payload.name.as_deref(), payload.remark.as_deref())
        .await?;
    if affected == 0 {
        return Ok(Envelope::error("数据没有找到！"));
    }
    Ok(Envelope::ok_empty())
}

/// DELETE /api/v1/appointments — bulk delete by id list.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<DeleteIds>,
) -> Result<Envelope, AppError> {
    auth.require(&module_scopes(MODULE, "delete"))?;
    state.db.delete_appointments(&payload.ids).await?;
    Ok(Envelope::ok(&true))
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{ERROR_CODE, SUCCESS_CODE};
    use chrono::Utc;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        rows: Mutex<Vec<AppointmentRow>>,
    }

    #[async_trait]
    impl AppointmentStore for MemStore {
        async fn find_by_name(
            &self,
            prefix: &str,
            name: &str,
        ) -> anyhow::Result<Option<AppointmentRow>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.prefix == prefix && r.name == name)
                .cloned())
        }

        async fn insert(
            &self,
            prefix: &str,
            name: &str,
            remark: Option<&str>,
        ) -> anyhow::Result<AppointmentRow> {
            let row = AppointmentRow {
                id: Uuid::new_v4(),
                prefix: prefix.to_string(),
                name: name.to_string(),
                remark: remark.map(str::to_string),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }
    }

    #[tokio::test]
    async fn duplicate_name_answers_the_exists_envelope_and_inserts_nothing() {
        let store = MemStore::default();
        let payload = CreateAppointment {
            name: "年度体检".into(),
            remark: None,
        };

        let first = store_appointment(&store, "site", &payload).await.unwrap();
        assert_eq!(first.code, SUCCESS_CODE);

        let second = store_appointment(&store, "site", &payload).await.unwrap();
        assert_eq!(second.code, ERROR_CODE);
        assert_eq!(second.message, "数据已经存在！");
        assert!(second.data.is_null());

        assert_eq!(store.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_name_under_another_tenant_is_allowed() {
        let store = MemStore::default();
        let payload = CreateAppointment {
            name: "年度体检".into(),
            remark: Some("上午场".into()),
        };

        store_appointment(&store, "site-a", &payload).await.unwrap();
        let other = store_appointment(&store, "site-b", &payload).await.unwrap();

        assert_eq!(other.code, SUCCESS_CODE);
        assert_eq!(store.rows.lock().unwrap().len(), 2);
    }
}
