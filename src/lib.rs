//! Backstage — multi-tenant admin backend.
//!
//! Library crate: re-exports modules for the binary and for integration
//! tests in `tests/`.

pub mod api;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod password;
pub mod seed;
pub mod store;
pub mod wxamp;

use store::postgres::PgStore;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub db: PgStore,
    pub config: config::Config,
}
