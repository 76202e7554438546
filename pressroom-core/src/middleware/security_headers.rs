//! Security headers middleware for REST API

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::SecurityHeadersConfig;

fn request_is_https(config: &SecurityHeadersConfig, headers: &HeaderMap) -> bool {
    config.hsts_trust_x_forwarded_proto
        && headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.eq_ignore_ascii_case("https"))
            .unwrap_or(false)
}

fn hsts_value(config: &SecurityHeadersConfig) -> Option<HeaderValue> {
    let mut value = format!("max-age={}", config.hsts_max_age_secs);
    if config.hsts_include_subdomains {
        value.push_str("; includeSubDomains");
    }
    if config.hsts_preload {
        value.push_str("; preload");
    }
    HeaderValue::from_str(&value).ok()
}

/// Adds nosniff, frame-deny, referrer, no-store, permissions and CSP headers
/// to every response, plus HSTS for HTTPS requests when enabled.
pub async fn security_headers_middleware(
    State(config): State<SecurityHeadersConfig>,
    request: Request,
    next: Next,
) -> Response {
    let add_hsts = config.hsts_enabled
        && (!config.hsts_https_only || request_is_https(&config, request.headers()));

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
    );
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    // Never on plain HTTP: browsers pin the policy for max-age
    if add_hsts {
        if let Some(value) = hsts_value(&config) {
            headers.insert(header::STRICT_TRANSPORT_SECURITY, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    fn app(cfg: SecurityHeadersConfig) -> Router {
        Router::new()
            .route("/test", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn_with_state(
                cfg,
                security_headers_middleware,
            ))
    }

    #[tokio::test]
    async fn test_security_headers_are_added() {
        let cfg = SecurityHeadersConfig {
            hsts_https_only: false,
            ..SecurityHeadersConfig::default()
        };
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(cfg).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            headers.get("Referrer-Policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert!(headers
            .get("Cache-Control")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("no-store"));
        assert!(headers.get("Permissions-Policy").is_some());
        assert_eq!(
            headers.get("Strict-Transport-Security").unwrap(),
            "max-age=31536000; includeSubDomains"
        );
        assert_eq!(
            headers.get("Content-Security-Policy").unwrap(),
            "default-src 'none'; frame-ancestors 'none'"
        );
    }

    #[tokio::test]
    async fn test_hsts_not_added_when_disabled() {
        let cfg = SecurityHeadersConfig {
            hsts_enabled: false,
            hsts_https_only: false,
            ..SecurityHeadersConfig::default()
        };
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(cfg).oneshot(request).await.unwrap();
        assert!(response.headers().get("Strict-Transport-Security").is_none());
    }

    #[tokio::test]
    async fn test_hsts_only_for_forwarded_https() {
        let plain = Request::builder().uri("/test").body(Body::empty()).unwrap();
        let response = app(SecurityHeadersConfig::default())
            .oneshot(plain)
            .await
            .unwrap();
        assert!(response.headers().get("Strict-Transport-Security").is_none());

        let https = Request::builder()
            .uri("/test")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap();
        let response = app(SecurityHeadersConfig::default())
            .oneshot(https)
            .await
            .unwrap();
        assert!(response.headers().get("Strict-Transport-Security").is_some());
    }

    #[test]
    fn test_hsts_preload_value() {
        let cfg = SecurityHeadersConfig {
            hsts_preload: true,
            hsts_max_age_secs: 600,
            ..SecurityHeadersConfig::default()
        };
        assert_eq!(
            hsts_value(&cfg).unwrap(),
            "max-age=600; includeSubDomains; preload"
        );
    }
}
