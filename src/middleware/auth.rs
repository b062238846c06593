//! JWT authentication and scope-based authorization.
//!
//! Workflow:
//! 1. `POST /api/v1/auth/login` verifies the password and issues an HS256 JWT
//!    carrying the user's granted scopes and tenant prefix.
//! 2. On each request the `AuthUser` extractor reads `Authorization: Bearer
//!    <jwt>`, verifies signature + expiry, and exposes the claims.
//! 3. Handlers call [`AuthUser::require`] with the scopes their operation
//!    needs; failures answer 401 with a `WWW-Authenticate` challenge.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::AppState;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the full username, `{prefix}@{identifier}`.
    pub sub: String,
    /// Granted permission scopes. `"*"` grants everything.
    pub scopes: Vec<String>,
    /// Tenant prefix partitioning this user's data.
    pub prefix: String,
    /// Expiry (Unix timestamp).
    pub exp: i64,
}

/// Sign a new access token for `sub` with the given scopes and tenant prefix.
pub fn issue_token(
    secret: &str,
    sub: &str,
    scopes: Vec<String>,
    prefix: &str,
    ttl_minutes: i64,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: sub.to_string(),
        scopes,
        prefix: prefix.to_string(),
        exp: (Utc::now() + chrono::Duration::minutes(ttl_minutes)).timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Verify signature and expiry, returning the claims.
pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Membership check over granted scopes. `"*"` is a full-access wildcard.
pub fn check_scope(granted: &[String], required: &str) -> bool {
    granted.iter().any(|s| s == "*" || s == required)
}

/// Authenticated caller, extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub prefix: String,
    pub scopes: Vec<String>,
}

impl AuthUser {
    /// Require every scope in `required`; missing any yields a 401 whose
    /// challenge header lists the full required set.
    pub fn require(&self, required: &[String]) -> Result<(), AppError> {
        for scope in required {
            if !check_scope(&self.scopes, scope) {
                tracing::warn!(
                    user = %self.username,
                    scope = %scope,
                    "access denied: missing scope"
                );
                return Err(AppError::Forbidden {
                    scopes: required.to_vec(),
                });
            }
        }
        Ok(())
    }
}

/// Required scope set for a module operation: `[{module}, {module}.{action}]`.
pub fn module_scopes(module: &str, action: &str) -> Vec<String> {
    vec![module.to_string(), format!("{module}.{action}")]
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(AppError::unauthorized)?;

        let claims = decode_token(&state.config.jwt_secret, token).map_err(|e| {
            tracing::debug!("token rejected: {}", e);
            AppError::unauthorized()
        })?;

        Ok(AuthUser {
            username: claims.sub,
            prefix: claims.prefix,
            scopes: claims.scopes,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn scopes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let token = issue_token(
            SECRET,
            "site@admin",
            scopes(&["function.appointment", "function.appointment.list"]),
            "site",
            60,
        )
        .unwrap();

        let claims = decode_token(SECRET, &token).unwrap();
        assert_eq!(claims.sub, "site@admin");
        assert_eq!(claims.prefix, "site");
        assert_eq!(claims.scopes.len(), 2);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(SECRET, "site@admin", vec![], "site", 60).unwrap();
        assert!(decode_token("other-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(SECRET, "site@admin", vec![], "site", -10).unwrap();
        assert!(decode_token(SECRET, &token).is_err());
    }

    #[test]
    fn check_scope_direct_match() {
        let granted = scopes(&["function.appointment", "function.appointment.list"]);
        assert!(check_scope(&granted, "function.appointment.list"));
        assert!(!check_scope(&granted, "function.appointment.delete"));
    }

    #[test]
    fn check_scope_wildcard() {
        let granted = scopes(&["*"]);
        assert!(check_scope(&granted, "function.appointment.delete"));
        assert!(check_scope(&granted, "anything"));
    }

    #[test]
    fn require_needs_every_scope() {
        let user = AuthUser {
            username: "site@admin".into(),
            prefix: "site".into(),
            scopes: scopes(&["function.appointment"]),
        };
        assert!(user.require(&scopes(&["function.appointment"])).is_ok());

        let err = user
            .require(&module_scopes("function.appointment", "store"))
            .unwrap_err();
        match err {
            AppError::Forbidden { scopes } => {
                assert_eq!(
                    scopes,
                    vec![
                        "function.appointment".to_string(),
                        "function.appointment.store".to_string()
                    ]
                );
            }
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn module_scopes_builds_pair() {
        assert_eq!(
            module_scopes("function.user", "update"),
            vec!["function.user".to_string(), "function.user.update".to_string()]
        );
    }
}
