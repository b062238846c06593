//! Router-level auth tests: challenge headers and the error envelope, run
//! against a lazily connected store so no database is needed. Every request
//! here is rejected before any query would run.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use backstage::middleware::auth::issue_token;
use backstage::store::postgres::PgStore;
use backstage::{api, config, AppState};

const SECRET: &str = "integration-test-secret";

fn test_state() -> Arc<AppState> {
    let db = PgStore::connect_lazy("postgres://localhost/backstage_test").unwrap();
    Arc::new(AppState {
        db,
        config: config::Config {
            port: 0,
            database_url: "postgres://localhost/backstage_test".into(),
            jwt_secret: SECRET.into(),
            jwt_ttl_minutes: 60,
            wx_app_id: String::new(),
            wx_app_secret: String::new(),
            wx_cache_dir: ".".into(),
        },
    })
}

fn app() -> axum::Router {
    api::api_router().with_state(test_state())
}

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_token_answers_401_with_bare_challenge() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/appointments")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get("www-authenticate").unwrap(), "Bearer");

    let body = body_json(resp).await;
    assert_eq!(body["code"], 1);
    assert_eq!(body["status"], "error");
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/appointments")
                .header("authorization", "Bearer not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_scope_answers_401_listing_the_required_set() {
    // A valid token whose scopes do not cover the appointments module.
    let token = issue_token(
        SECRET,
        "site@viewer",
        vec!["function.user".to_string()],
        "site",
        60,
    )
    .unwrap();

    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/appointments")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("www-authenticate").unwrap(),
        "Bearer scope=\"function.appointment function.appointment.list\""
    );

    let body = body_json(resp).await;
    assert_eq!(body["message"], "Not enough permissions");
}

#[tokio::test]
async fn params_requires_the_appointment_list_scope() {
    // Authenticated but with no grants at all: authorization must reject
    // before the handler reaches the database.
    let token = issue_token(SECRET, "site@nobody", vec![], "site", 60).unwrap();

    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/appointments/params")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        resp.headers().get("www-authenticate").unwrap(),
        "Bearer scope=\"function.appointment function.appointment.list\""
    );
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let token = issue_token(SECRET, "site@admin", vec!["*".to_string()], "site", -5).unwrap();

    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/users")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_route_falls_back_to_404() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/no-such-entity")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
