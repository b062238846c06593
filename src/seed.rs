//! Seed-time reconciliation of the declarative permission tree, plus company
//! and user bootstrap.
//!
//! Ensure-exists semantics: every node of the spec (and the leaf actions it
//! implies) ends up in storage exactly once, keyed by its unique scope.
//! Re-running the whole reconciliation is a no-op — the lookup-or-create is a
//! single atomic upsert on the scope's unique constraint, so concurrent seed
//! runs cannot double-insert.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::permission::{dashboard_spec, system_permissions, NewPermission, PermissionSpec};
use crate::password::hash_password;
use crate::store::postgres::PgStore;

/// Storage seam for the reconciliation: one atomic find-or-create per scope.
/// `PgStore` implements it with an upsert; tests use an in-memory map.
#[async_trait]
pub trait PermissionSink: Send + Sync {
    async fn find_or_create(&self, item: &NewPermission) -> anyhow::Result<Uuid>;
}

#[async_trait]
impl PermissionSink for PgStore {
    async fn find_or_create(&self, item: &NewPermission) -> anyhow::Result<Uuid> {
        self.find_or_create_permission(item).await
    }
}

/// Reconcile a permission spec tree against storage.
///
/// Nodes with children recurse, passing the ensured parent's id down; nodes
/// without children emit one leaf per implied action. Lookups that find no
/// match fall through to creation silently.
pub fn reconcile<'a, S: PermissionSink + ?Sized>(
    sink: &'a S,
    specs: &'a [PermissionSpec],
    parent_id: Option<Uuid>,
) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        for spec in specs {
            let id = sink.find_or_create(&spec.record(parent_id)).await?;
            if spec.children.is_empty() {
                for leaf in spec.leaf_records(id) {
                    sink.find_or_create(&leaf).await?;
                }
            } else {
                reconcile(sink, &spec.children, Some(id)).await?;
            }
        }
        Ok(())
    })
}

/// Ensure the console root, the caller-provided tree, then the built-in
/// system permissions.
pub async fn seed_permissions(store: &PgStore, extra: &[PermissionSpec]) -> anyhow::Result<()> {
    reconcile(store, &[dashboard_spec()], None).await?;
    reconcile(store, extra, None).await?;
    reconcile(store, &system_permissions(), None).await?;
    tracing::info!("permission tree reconciled");
    Ok(())
}

/// Upsert the company (tenant) by name.
pub async fn seed_company(store: &PgStore, name: &str, prefix: &str) -> anyhow::Result<Uuid> {
    let id = store.upsert_company(name, prefix).await?;
    tracing::info!(company = name, prefix, "company ensured");
    Ok(id)
}

/// Upsert `{prefix}@{username}` accounts with freshly hashed passwords.
/// Seeded accounts get the full-access wildcard scope.
pub async fn seed_users(
    store: &PgStore,
    users: &[(String, String)],
    prefix: &str,
) -> anyhow::Result<()> {
    for (username, password) in users {
        let full = format!("{prefix}@{username}");
        let hash = hash_password(password)
            .map_err(|e| anyhow::anyhow!("hashing password for {full}: {e}"))?;
        store
            .upsert_user(&full, &hash, prefix, &["*".to_string()])
            .await?;
        tracing::info!(user = %full, "user ensured");
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────
