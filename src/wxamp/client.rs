//! Mini-program API client.
//!
//! All calls share one retry policy: transport-level failures (request error
//! or non-200 status) are retried in an explicit bounded loop; provider
//! errors (`errcode != 0` inside a 200 body) are surfaced as
//! [`WxError::Provider`] without retry. There is no backoff delay between
//! attempts and no circuit breaker — the cap is the whole policy.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::token_cache::{CachedToken, TokenCache};

/// Additional attempts after the first failed one.
pub const BASE_ATTEMPTS: u32 = 3;

const DEFAULT_API_BASE: &str = "https://api.weixin.qq.com";

#[derive(Debug, Error)]
pub enum WxError {
    #[error("transport failure after {attempts} retries: {message}")]
    Transport { attempts: u32, message: String },

    #[error("provider error {errcode}: {errmsg}")]
    Provider { errcode: i64, errmsg: String },
}

/// Result of `code2session`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    pub openid: String,
    pub session_key: String,
    #[serde(default)]
    pub unionid: Option<String>,
}

/// Subscription message push payload.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeMessage {
    pub touser: String,
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    pub miniprogram_state: String,
    pub lang: String,
    pub data: Value,
}

impl SubscribeMessage {
    pub fn new(touser: &str, template_id: &str, data: Value) -> Self {
        Self {
            touser: touser.to_string(),
            template_id: template_id.to_string(),
            page: None,
            miniprogram_state: "formal".to_string(),
            lang: "zh_CN".to_string(),
            data,
        }
    }
}

/// Jump target for scheme generation.
#[derive(Debug, Clone, Serialize)]
pub struct SchemeJump {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub env_version: String,
}

impl SchemeJump {
    pub fn new(path: &str, query: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            query: query.map(str::to_string),
            env_version: "release".to_string(),
        }
    }
}

/// url-link generation request.
#[derive(Debug, Clone, Serialize)]
pub struct UrlLinkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub is_expire: bool,
    pub expire_type: i64,
    pub expire_interval: i64,
    pub env_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_base: Option<Value>,
}

impl Default for UrlLinkRequest {
    fn default() -> Self {
        Self {
            path: None,
            query: None,
            is_expire: true,
            expire_type: 1,
            expire_interval: 1,
            env_version: "release".to_string(),
            cloud_base: None,
        }
    }
}

pub struct MiniProgramClient {
    app_id: String,
    app_secret: String,
    api_base: String,
    http: reqwest::Client,
    cache: TokenCache,
}

impl MiniProgramClient {
    pub fn new(app_id: &str, app_secret: &str, cache_dir: impl AsRef<Path>) -> Self {
        Self {
            app_id: app_id.to_string(),
            app_secret: app_secret.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("Backstage-Wxamp/1.0")
                .build()
                .expect("failed to build mini-program HTTP client"),
            cache: TokenCache::new(cache_dir, app_id),
        }
    }

    /// Point the client at a different API host (tests).
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    /// Exchange a short-lived login code for a session.
    pub async fn code2session(&self, js_code: &str) -> Result<SessionInfo, WxError> {
        let url = format!("{}/sns/jscode2session", self.api_base);
        let body = self
            .send_with_retry(
                || {
                    self.http.get(&url).query(&[
                        ("appid", self.app_id.as_str()),
                        ("secret", self.app_secret.as_str()),
                        ("js_code", js_code),
                        ("grant_type", "authorization_code"),
                    ])
                },
                "code2session",
            )
            .await?;
        let body = provider_result(body, "code2session")?;
        serde_json::from_value(body).map_err(|e| WxError::Provider {
            errcode: -1,
            errmsg: format!("unexpected session payload: {e}"),
        })
    }

    /// Push a subscription message to a user.
    pub async fn send_subscribe_message(&self, msg: &SubscribeMessage) -> Result<(), WxError> {
        let token = self.get_token().await?;
        let url = format!("{}/cgi-bin/message/subscribe/send", self.api_base);
        let body = self
            .send_with_retry(
                || {
                    self.http
                        .post(&url)
                        .query(&[("access_token", token.as_str())])
                        .json(msg)
                },
                "subscribe_message",
            )
            .await?;
        provider_result(body, "subscribe_message").map(|_| ())
    }

    /// Generate a scheme deep-link; returns the `openlink`.
    pub async fn generate_scheme(
        &self,
        jump: Option<&SchemeJump>,
        expire_interval: i64,
    ) -> Result<String, WxError> {
        let token = self.get_token().await?;
        let mut payload = json!({
            "is_expire": true,
            "expire_type": 1,
            "expire_interval": expire_interval,
        });
        if let Some(jump) = jump {
            payload["jump_wxa"] = serde_json::to_value(jump).unwrap_or(Value::Null);
        }
        let url = format!("{}/wxa/generatescheme", self.api_base);
        let body = self
            .send_with_retry(
                || {
                    self.http
                        .post(&url)
                        .query(&[("access_token", token.as_str())])
                        .json(&payload)
                },
                "generate_scheme",
            )
            .await?;
        let body = provider_result(body, "generate_scheme")?;
        string_field(&body, "openlink", "generate_scheme")
    }

    /// Generate a url-link; returns the `url_link`.
    pub async fn generate_url_link(&self, req: &UrlLinkRequest) -> Result<String, WxError> {
        let token = self.get_token().await?;
        let url = format!("{}/wxa/generate_urllink", self.api_base);
        let body = self
            .send_with_retry(
                || {
                    self.http
                        .post(&url)
                        .query(&[("access_token", token.as_str())])
                        .json(req)
                },
                "generate_url_link",
            )
            .await?;
        let body = provider_result(body, "generate_url_link")?;
        string_field(&body, "url_link", "generate_url_link")
    }

    /// Cached bearer token: reuse the file entry while its stored expiry is
    /// in the future, otherwise fetch a fresh token and overwrite the file.
    pub async fn get_token(&self) -> Result<String, WxError> {
        let now = Utc::now().timestamp();
        if let Some(token) = self.cache.read_valid(now) {
            return Ok(token);
        }

        let url = format!("{}/cgi-bin/token", self.api_base);
        let body = self
            .send_with_retry(
                || {
                    self.http.get(&url).query(&[
                        ("grant_type", "client_credential"),
                        ("appid", self.app_id.as_str()),
                        ("secret", self.app_secret.as_str()),
                    ])
                },
                "get_token",
            )
            .await?;
        let body = provider_result(body, "get_token")?;

        let access_token = string_field(&body, "access_token", "get_token")?;
        let expires_in = body.get("expires_in").and_then(Value::as_i64).unwrap_or(0);
        let entry = CachedToken {
            access_token: access_token.clone(),
            expires_in,
            expires_time: now + expires_in,
        };
        if let Err(e) = self.cache.write(&entry) {
            tracing::warn!(error = %e, "failed to persist token cache");
        }
        Ok(access_token)
    }

    /// Bounded retry loop over one request shape: the first attempt plus up
    /// to [`BASE_ATTEMPTS`] more on transport failure or non-200 status.
    async fn send_with_retry<F>(&self, make: F, what: &str) -> Result<Value, WxError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last = String::new();
        for attempt in 0..=BASE_ATTEMPTS {
            if attempt > 0 {
                tracing::debug!(what, attempt, "retrying mini-program call");
            }
            match make().send().await {
                Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                    match resp.json::<Value>().await {
                        Ok(v) => return Ok(v),
                        Err(e) => last = format!("invalid response body: {e}"),
                    }
                }
                Ok(resp) => last = format!("unexpected status {}", resp.status()),
                Err(e) => last = e.to_string(),
            }
        }
        tracing::warn!(what, attempts = BASE_ATTEMPTS, error = %last, "mini-program call failed after retries");
        Err(WxError::Transport {
            attempts: BASE_ATTEMPTS,
            message: last,
        })
    }
}

fn provider_result(body: Value, what: &str) -> Result<Value, WxError> {
    let errcode = body.get("errcode").and_then(Value::as_i64).unwrap_or(0);
    if errcode == 0 {
        return Ok(body);
    }
    let errmsg = body
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    tracing::warn!(what, errcode, errmsg = %errmsg, "mini-program provider error");
    Err(WxError::Provider { errcode, errmsg })
}

fn string_field(body: &Value, field: &str, what: &str) -> Result<String, WxError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WxError::Provider {
            errcode: -1,
            errmsg: format!("{what}: response missing '{field}'"),
        })
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_defaults() {
        let msg = SubscribeMessage::new("openid-1", "tmpl-1", json!({"thing1": {"value": "ok"}}));
        assert_eq!(msg.miniprogram_state, "formal");
        assert_eq!(msg.lang, "zh_CN");

        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["touser"], "openid-1");
        assert!(v.get("page").is_none());
    }

    #[test]
    fn url_link_request_defaults() {
        let v = serde_json::to_value(UrlLinkRequest::default()).unwrap();
        assert_eq!(v["is_expire"], true);
        assert_eq!(v["expire_type"], 1);
        assert_eq!(v["expire_interval"], 1);
        assert_eq!(v["env_version"], "release");
        assert!(v.get("cloud_base").is_none());
    }

    #[test]
    fn provider_result_passes_zero_errcode() {
        assert!(provider_result(json!({"errcode": 0, "openid": "x"}), "t").is_ok());
        assert!(provider_result(json!({"openid": "x"}), "t").is_ok());
    }

    #[test]
    fn provider_result_rejects_nonzero_errcode() {
        let err = provider_result(json!({"errcode": 40001, "errmsg": "invalid credential"}), "t")
            .unwrap_err();
        match err {
            WxError::Provider { errcode, errmsg } => {
                assert_eq!(errcode, 40001);
                assert_eq!(errmsg, "invalid credential");
            }
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[test]
    fn scheme_jump_serializes_without_empty_query() {
        let v = serde_json::to_value(SchemeJump::new("/pages/news/sale", None)).unwrap();
        assert_eq!(v["path"], "/pages/news/sale");
        assert_eq!(v["env_version"], "release");
        assert!(v.get("query").is_none());
    }
}
