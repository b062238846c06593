use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::permission::NewPermission;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Pool that only connects on first use. Lets the router be exercised
    /// without a live database.
    pub fn connect_lazy(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Permission Operations --

    /// Atomic ensure-exists keyed on the unique scope: a single upsert that
    /// always returns the canonical row id, race-safe under concurrent
    /// seeding. The no-op DO UPDATE makes RETURNING work on conflict.
    pub async fn find_or_create_permission(&self, item: &NewPermission) -> anyhow::Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO permissions (name, scope, parent_id, is_menu, is_action, icon)
               VALUES ($1, $2, $3, $4, $5, $6)
               ON CONFLICT (scope) DO UPDATE SET scope = EXCLUDED.scope
               RETURNING id"#,
        )
        .bind(&item.name)
        .bind(&item.scope)
        .bind(item.parent_id)
        .bind(item.is_menu)
        .bind(item.is_action)
        .bind(&item.icon)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn find_permission_by_scope(
        &self,
        scope: &str,
    ) -> anyhow::Result<Option<PermissionRow>> {
        let row = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, scope, parent_id, is_menu, is_action, icon, created_at
             FROM permissions WHERE scope = $1",
        )
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_permissions(&self) -> anyhow::Result<Vec<PermissionRow>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, scope, parent_id, is_menu, is_action, icon, created_at
             FROM permissions ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Permissions whose scope is in the caller's granted set.
    pub async fn list_permissions_in_scopes(
        &self,
        scopes: &[String],
    ) -> anyhow::Result<Vec<PermissionRow>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, scope, parent_id, is_menu, is_action, icon, created_at
             FROM permissions WHERE scope = ANY($1) ORDER BY created_at ASC",
        )
        .bind(scopes)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn paginate_permissions(
        &self,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<PermissionRow>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM permissions")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, PermissionRow>(
            "SELECT id, name, scope, parent_id, is_menu, is_action, icon, created_at
             FROM permissions ORDER BY created_at ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((rows, total))
    }

    pub async fn update_permission(
        &self,
        id: Uuid,
        name: Option<&str>,
        icon: Option<&str>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE permissions SET name = COALESCE($2, name), icon = COALESCE($3, icon)
             WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(icon)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_permissions(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -- User Operations --

    pub async fn upsert_user(
        &self,
        username: &str,
        password_hash: &str,
        prefix: &str,
        scopes: &[String],
    ) -> anyhow::Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO users (username, password_hash, prefix, scopes)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (username) DO UPDATE
                 SET password_hash = EXCLUDED.password_hash,
                     prefix = EXCLUDED.prefix,
                     scopes = EXCLUDED.scopes
               RETURNING id"#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(prefix)
        .bind(Json(scopes))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, prefix, scopes, created_at
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn paginate_users(
        &self,
        prefix: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<UserRow>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE prefix = $1")
            .bind(prefix)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, password_hash, prefix, scopes, created_at
             FROM users WHERE prefix = $1 ORDER BY created_at ASC LIMIT $2 OFFSET $3",
        )
        .bind(prefix)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((rows, total))
    }

    pub async fn update_user(
        &self,
        id: Uuid,
        password_hash: Option<&str>,
        scopes: Option<&[String]>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = COALESCE($2, password_hash),
                              scopes = COALESCE($3, scopes)
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(scopes.map(Json))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_users(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -- Company Operations --

    pub async fn upsert_company(&self, name: &str, prefix: &str) -> anyhow::Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"INSERT INTO companies (name, prefix)
               VALUES ($1, $2)
               ON CONFLICT (name) DO UPDATE SET prefix = EXCLUDED.prefix
               RETURNING id"#,
        )
        .bind(name)
        .bind(prefix)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn find_company_by_name(&self, name: &str) -> anyhow::Result<Option<CompanyRow>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, prefix, created_at FROM companies WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn paginate_companies(
        &self,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<CompanyRow>, i64)> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, name, prefix, created_at
             FROM companies ORDER BY created_at ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((rows, total))
    }

    pub async fn update_company(
        &self,
        id: Uuid,
        name: Option<&str>,
        prefix: Option<&str>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE companies SET name = COALESCE($2, name), prefix = COALESCE($3, prefix)
             WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(prefix)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_companies(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM companies WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // -- Appointment Operations --

    pub async fn find_appointment_by_name(
        &self,
        prefix: &str,
        name: &str,
    ) -> anyhow::Result<Option<AppointmentRow>> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            "SELECT id, prefix, name, remark, created_at, updated_at
             FROM appointments WHERE prefix = $1 AND name = $2",
        )
        .bind(prefix)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_appointment(
        &self,
        prefix: &str,
        name: &str,
        remark: Option<&str>,
    ) -> anyhow::Result<AppointmentRow> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r#"INSERT INTO appointments (prefix, name, remark)
               VALUES ($1, $2, $3)
               RETURNING id, prefix, name, remark, created_at, updated_at"#,
        )
        .bind(prefix)
        .bind(name)
        .bind(remark)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn paginate_appointments(
        &self,
        prefix: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<AppointmentRow>, i64)> {
        let total =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM appointments WHERE prefix = $1")
                .bind(prefix)
                .fetch_one(&self.pool)
                .await?;
        let rows = sqlx::query_as::<_, AppointmentRow>(
            "SELECT id, prefix, name, remark, created_at, updated_at
             FROM appointments WHERE prefix = $1
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(prefix)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok((rows, total))
    }

    pub async fn update_appointment(
        &self,
        id: Uuid,
        name: Option<&str>,
        remark: Option<&str>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE appointments SET name = COALESCE($2, name),
                                     remark = COALESCE($3, remark),
                                     updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(name)
        .bind(remark)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_appointments(&self, ids: &[Uuid]) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// -- Row types --

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PermissionRow {
    pub id: Uuid,
    pub name: String,
    pub scope: String,
    pub parent_id: Option<Uuid>,
    pub is_menu: bool,
    pub is_action: bool,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub prefix: String,
    pub scopes: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CompanyRow {
    pub id: Uuid,
    pub name: String,
    pub prefix: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub prefix: String,
    pub name: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
