//! REST API handlers and shared response types

pub mod article;
pub mod auth;
pub mod csrf;
pub mod health;
pub mod metrics;

use crate::error::{AppError, Result};
use crate::identity::{AuthUser, ACCESS_TOKEN_COOKIE};
use crate::server::AppState;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for sign-out, delete, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Session token from the `sb-access-token` cookie, else a Bearer header.
pub(crate) fn access_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Any session the auth provider accepts counts as an editor.
pub(crate) async fn require_admin(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<AuthUser> {
    let token = access_token(jar, headers)
        .ok_or_else(|| AppError::AuthenticationRequired("Authentication required".to_string()))?;
    state.auth.get_user(&token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use axum_extra::extract::cookie::Cookie;

    #[test]
    fn test_success_response_serialization() {
        let json = serde_json::to_string(&SuccessResponse::new("ok")).unwrap();
        assert_eq!(json, r#"{"data":"ok"}"#);
    }

    #[test]
    fn test_access_token_prefers_cookie() {
        let jar = CookieJar::new().add(Cookie::new(ACCESS_TOKEN_COOKIE, "from-cookie"));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(access_token(&jar, &headers).as_deref(), Some("from-cookie"));
        assert_eq!(
            access_token(&CookieJar::new(), &headers).as_deref(),
            Some("from-header")
        );
    }

    #[test]
    fn test_access_token_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(access_token(&CookieJar::new(), &headers).is_none());
        assert!(access_token(&CookieJar::new(), &HeaderMap::new()).is_none());
    }
}
