//! Rate limiting middleware for REST API
//!
//! Each route group is bound to one [`EndpointClass`]. Rejected requests get
//! a 429 before any inner layer runs; accepted responses carry the current
//! `X-RateLimit-*` headers.

use super::client_ip::client_identifier;
use crate::crypto::correlation_id;
use crate::security::{
    rate_limit::{EndpointClass, RateLimitDecision, RateLimiter},
    redact::TOO_MANY_REQUESTS_MESSAGE,
};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Middleware state: the shared limiter plus the class this route group uses.
#[derive(Clone)]
pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    class: EndpointClass,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<RateLimiter>, class: EndpointClass) -> Self {
        Self { limiter, class }
    }

    pub fn class(&self) -> EndpointClass {
        self.class
    }
}

pub fn login_rate_limit(limiter: &Arc<RateLimiter>) -> RateLimitGuard {
    RateLimitGuard::new(Arc::clone(limiter), EndpointClass::Login)
}

pub fn api_rate_limit(limiter: &Arc<RateLimiter>) -> RateLimitGuard {
    RateLimitGuard::new(Arc::clone(limiter), EndpointClass::Api)
}

pub fn upload_rate_limit(limiter: &Arc<RateLimiter>) -> RateLimitGuard {
    RateLimitGuard::new(Arc::clone(limiter), EndpointClass::Upload)
}

pub fn public_rate_limit(limiter: &Arc<RateLimiter>) -> RateLimitGuard {
    RateLimitGuard::new(Arc::clone(limiter), EndpointClass::Public)
}

pub fn view_rate_limit(limiter: &Arc<RateLimiter>) -> RateLimitGuard {
    RateLimitGuard::new(Arc::clone(limiter), EndpointClass::View)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitExceededBody {
    error: &'static str,
    retry_after: u64,
    correlation_id: String,
}

fn iso_8601(epoch_ms: u64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    if let Some(value) = iso_8601(decision.reset_at_ms).and_then(|s| HeaderValue::from_str(&s).ok())
    {
        headers.insert("X-RateLimit-Reset", value);
    }
}

/// 429 response for a rejected decision.
pub fn rate_limit_exceeded_response(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.retry_after_secs.unwrap_or(1);
    let body = RateLimitExceededBody {
        error: TOO_MANY_REQUESTS_MESSAGE,
        retry_after,
        correlation_id: correlation_id(),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, decision);
    headers.insert("Retry-After", HeaderValue::from(retry_after));
    response
}

/// Rate limiting middleware function
pub async fn rate_limit_middleware(
    State(guard): State<RateLimitGuard>,
    request: Request,
    next: Next,
) -> Response {
    if !guard.limiter.is_enabled() {
        return next.run(request).await;
    }

    let client = client_identifier(&request);
    let decision = guard.limiter.check(guard.class, &client);

    if !decision.allowed {
        metrics::counter!("pressroom_rate_limit_throttled_total", "class" => guard.class.as_str())
            .increment(1);
        tracing::warn!(
            class = %guard.class,
            client = %client,
            retry_after = decision.retry_after_secs,
            "Rate limit exceeded"
        );
        return rate_limit_exceeded_response(&decision);
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::security::RateLimitRule;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn app(limiter: Arc<RateLimiter>, class: EndpointClass) -> Router {
        Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                RateLimitGuard::new(limiter, class),
                rate_limit_middleware,
            ))
    }

    fn limiter(enabled: bool, rule: RateLimitRule) -> Arc<RateLimiter> {
        let mut config = RateLimitConfig {
            enabled,
            ..RateLimitConfig::default()
        };
        config.rules.insert(EndpointClass::Api, rule);
        Arc::new(RateLimiter::new(config))
    }

    fn request_from(ip: &str) -> Request {
        Request::builder()
            .uri("/test")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepted_response_carries_headers() {
        let app = app(limiter(true, RateLimitRule::new(3, 60_000)), EndpointClass::Api);
        let response = app.oneshot(request_from("203.0.113.1")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-RateLimit-Limit").unwrap(), "3");
        assert_eq!(response.headers().get("X-RateLimit-Remaining").unwrap(), "2");
        let reset = response.headers().get("X-RateLimit-Reset").unwrap();
        assert!(DateTime::parse_from_rfc3339(reset.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_rejection_is_429_with_retry_after() {
        let app = app(limiter(true, RateLimitRule::new(1, 60_000)), EndpointClass::Api);
        let first = app.clone().oneshot(request_from("203.0.113.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request_from("203.0.113.1")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = second
            .headers()
            .get("Retry-After")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((59..=60).contains(&retry_after));
        assert_eq!(second.headers().get("X-RateLimit-Remaining").unwrap(), "0");

        let body = axum::body::to_bytes(second.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], TOO_MANY_REQUESTS_MESSAGE);
        assert_eq!(json["retryAfter"], retry_after);
        assert!(json["correlationId"].is_string());
    }

    #[tokio::test]
    async fn test_clients_are_isolated() {
        let app = app(limiter(true, RateLimitRule::new(1, 60_000)), EndpointClass::Api);
        app.clone().oneshot(request_from("203.0.113.1")).await.unwrap();
        let other = app.oneshot(request_from("203.0.113.2")).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let app = app(limiter(false, RateLimitRule::new(0, 60_000)), EndpointClass::Api);
        let response = app.oneshot(request_from("203.0.113.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("X-RateLimit-Limit").is_none());
    }

    #[test]
    fn test_named_guards_fix_class() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
        assert_eq!(login_rate_limit(&limiter).class(), EndpointClass::Login);
        assert_eq!(api_rate_limit(&limiter).class(), EndpointClass::Api);
        assert_eq!(upload_rate_limit(&limiter).class(), EndpointClass::Upload);
        assert_eq!(public_rate_limit(&limiter).class(), EndpointClass::Public);
        assert_eq!(view_rate_limit(&limiter).class(), EndpointClass::View);
    }

    #[test]
    fn test_iso_8601_format() {
        assert_eq!(iso_8601(0).unwrap(), "1970-01-01T00:00:00.000Z");
    }
}
