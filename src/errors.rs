use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::envelope::{ERROR_CODE, ERROR_MESSAGE, ERROR_STATUS};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Could not validate credentials")]
    Unauthorized { scopes: Vec<String> },

    #[error("Not enough permissions")]
    Forbidden { scopes: Vec<String> },

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// 401 with an empty scope challenge (missing or malformed token).
    pub fn unauthorized() -> Self {
        Self::Unauthorized { scopes: Vec::new() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            AppError::Unauthorized { .. } => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Forbidden { .. } => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ERROR_MESSAGE.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ERROR_MESSAGE.to_string())
            }
        };

        let body = Json(json!({
            "code": ERROR_CODE,
            "status": ERROR_STATUS,
            "message": msg,
            "data": serde_json::Value::Null,
        }));

        let mut response = (status, body).into_response();

        // Auth failures carry a challenge header listing the required scopes.
        if let AppError::Unauthorized { scopes } | AppError::Forbidden { scopes } = &self {
            let challenge = if scopes.is_empty() {
                "Bearer".to_string()
            } else {
                format!("Bearer scope=\"{}\"", scopes.join(" "))
            };
            if let Ok(val) = axum::http::HeaderValue::from_str(&challenge) {
                response.headers_mut().insert("www-authenticate", val);
            }
        }

        response
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_carries_bare_challenge() {
        let resp = AppError::unauthorized().into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get("www-authenticate").unwrap(),
            "Bearer"
        );
    }

    #[test]
    fn forbidden_lists_required_scopes() {
        let err = AppError::Forbidden {
            scopes: vec![
                "function.appointment".to_string(),
                "function.appointment.store".to_string(),
            ],
        };
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get("www-authenticate").unwrap(),
            "Bearer scope=\"function.appointment function.appointment.store\""
        );
    }

    #[tokio::test]
    async fn server_errors_answer_the_default_error_envelope() {
        let resp = AppError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], ERROR_CODE);
        assert_eq!(body["status"], ERROR_STATUS);
        assert_eq!(body["message"], ERROR_MESSAGE);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = AppError::NotFound("appointment".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(resp.headers().get("www-authenticate").is_none());
    }
}
