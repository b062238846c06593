//! Uniform response envelope: every endpoint answers `{code, status, message, data}`.
//!
//! Success and error cases use distinct default constants; business-level
//! errors (duplicate name, missing record) are 200 responses carrying the
//! error envelope rather than HTTP errors.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SUCCESS_CODE: i32 = 0;
pub const SUCCESS_STATUS: &str = "success";
pub const SUCCESS_MESSAGE: &str = "数据请求成功！";

pub const ERROR_CODE: i32 = 1;
pub const ERROR_STATUS: &str = "error";
pub const ERROR_MESSAGE: &str = "数据请求错误！";

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub code: i32,
    pub status: String,
    pub message: String,
    pub data: Value,
}

impl Envelope {
    /// Success envelope wrapping a serializable payload.
    pub fn ok<T: Serialize>(data: &T) -> Self {
        Self {
            code: SUCCESS_CODE,
            status: SUCCESS_STATUS.to_string(),
            message: SUCCESS_MESSAGE.to_string(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    /// Success envelope with no payload.
    pub fn ok_empty() -> Self {
        Self {
            code: SUCCESS_CODE,
            status: SUCCESS_STATUS.to_string(),
            message: SUCCESS_MESSAGE.to_string(),
            data: Value::Null,
        }
    }

    /// Error envelope with the default error code/status and a custom message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: ERROR_CODE,
            status: ERROR_STATUS.to_string(),
            message: message.into(),
            data: Value::Null,
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Paginated list payload: `{items, page, pages, total, limit}`.
#[derive(Debug, Serialize)]
pub struct Paginate<T: Serialize> {
    pub items: Vec<T>,
    pub page: i64,
    pub pages: i64,
    pub total: i64,
    pub limit: i64,
}

impl<T: Serialize> Paginate<T> {
    pub fn new(items: Vec<T>, page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            items,
            page,
            pages,
            total,
            limit,
        }
    }
}

/// List screen parameters, accepted both as query string and as a POST body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ScreenParams {
    pub fn page(&self) -> i64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.filter(|l| *l > 0 && *l <= 500).unwrap_or(25)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_uses_success_defaults() {
        let env = Envelope::ok(&serde_json::json!({"k": "v"}));
        assert_eq!(env.code, SUCCESS_CODE);
        assert_eq!(env.status, SUCCESS_STATUS);
        assert_eq!(env.message, SUCCESS_MESSAGE);
        assert_eq!(env.data["k"], "v");
    }

    #[test]
    fn error_envelope_keeps_error_defaults() {
        let env = Envelope::error("数据已经存在！");
        assert_eq!(env.code, ERROR_CODE);
        assert_eq!(env.status, ERROR_STATUS);
        assert_eq!(env.message, "数据已经存在！");
        assert!(env.data.is_null());
    }

    #[test]
    fn envelope_serializes_all_four_fields() {
        let json = serde_json::to_value(Envelope::ok_empty()).unwrap();
        assert!(json.get("code").is_some());
        assert!(json.get("status").is_some());
        assert!(json.get("message").is_some());
        assert!(json.get("data").is_some());
    }

    #[test]
    fn paginate_computes_page_count() {
        let p = Paginate::new(vec![1, 2, 3], 2, 30, 95);
        assert_eq!(p.pages, 4);
        assert_eq!(p.total, 95);
        assert_eq!(p.page, 2);
    }

    #[test]
    fn screen_params_defaults_and_bounds() {
        let p = ScreenParams::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 0);

        let p = ScreenParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(p.offset(), 20);

        let p = ScreenParams {
            page: Some(-1),
            limit: Some(100_000),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), 25);
    }
}
