use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, patch, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod appointments;
pub mod companies;
pub mod login;
pub mod permissions;
pub mod users;

/// Build the admin API router.
/// All routes are relative — the caller mounts this under `/api/v1`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login::login))
        // Appointments
        .route(
            "/appointments",
            get(appointments::list)
                .post(appointments::create)
                .delete(appointments::remove),
        )
        .route("/appointments/search", post(appointments::search))
        .route("/appointments/params", get(appointments::params))
        .route("/appointments/:id", patch(appointments::update))
        // Permissions
        .route(
            "/permissions",
            get(permissions::list)
                .post(permissions::create)
                .delete(permissions::remove),
        )
        .route("/permissions/search", post(permissions::search))
        .route("/permissions/:id", patch(permissions::update))
        // Users
        .route(
            "/users",
            get(users::list).post(users::create).delete(users::remove),
        )
        .route("/users/search", post(users::search))
        .route("/users/:id", patch(users::update))
        // Companies
        .route(
            "/companies",
            get(companies::list)
                .post(companies::create)
                .delete(companies::remove),
        )
        .route("/companies/search", post(companies::search))
        .route("/companies/:id", patch(companies::update))
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
