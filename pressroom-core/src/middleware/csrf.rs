//! CSRF protection middleware.
//!
//! Runs the double-submit token check and the origin check on every request
//! passing through it. Safe methods pass untouched.

use super::client_ip::client_identifier_from;
use crate::crypto::correlation_id;
use crate::security::csrf::{CsrfGuard, CsrfRejection};
use crate::security::redact::ErrorEnvelope;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;

/// Terminal 403 for a failed CSRF check.
pub fn csrf_rejection_response(rejection: CsrfRejection, headers: &HeaderMap, path: &str) -> Response {
    let correlation_id = correlation_id();
    metrics::counter!("pressroom_csrf_rejected_total", "reason" => rejection.reason())
        .increment(1);
    tracing::warn!(
        correlation_id = %correlation_id,
        reason = rejection.reason(),
        client = %client_identifier_from(headers, None),
        path = %path,
        "CSRF check failed"
    );
    let body = ErrorEnvelope {
        error: rejection.message().to_string(),
        correlation_id,
        details: None,
    };
    (StatusCode::FORBIDDEN, Json(body)).into_response()
}

pub async fn csrf_middleware(
    State(guard): State<CsrfGuard>,
    request: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(request.headers());
    if let Err(rejection) = guard.protect(request.method(), request.headers(), &jar, None) {
        return csrf_rejection_response(rejection, request.headers(), request.uri().path());
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::cookies::CookieGateway;
    use crate::security::csrf::{INVALID_ORIGIN_MESSAGE, INVALID_TOKEN_MESSAGE};
    use axum::{body::Body, routing::post, Router};
    use tower::ServiceExt;

    const TOKEN: &str = "a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1";

    fn app(production: bool) -> Router {
        let guard = CsrfGuard::new(
            CookieGateway::new(production),
            production,
            Some("https://news.example.com"),
        );
        Router::new()
            .route("/api/articles", post(|| async { "created" }).get(|| async { "list" }))
            .layer(axum::middleware::from_fn_with_state(guard, csrf_middleware))
    }

    async fn json_of(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_post_without_cookie_is_forbidden() {
        let response = app(false)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/articles")
                    .header("x-csrf-token", TOKEN)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_of(response).await;
        assert_eq!(json["error"], INVALID_TOKEN_MESSAGE);
        assert!(json["correlationId"].is_string());
    }

    #[tokio::test]
    async fn test_matching_tokens_and_origin_pass() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/articles")
                    .header("cookie", format!("csrf-token={TOKEN}"))
                    .header("x-csrf-token", TOKEN)
                    .header("origin", "https://news.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_foreign_origin_is_forbidden() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/articles")
                    .header("cookie", format!("csrf-token={TOKEN}"))
                    .header("x-csrf-token", TOKEN)
                    .header("origin", "https://attacker.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_of(response).await["error"], INVALID_ORIGIN_MESSAGE);
    }

    #[tokio::test]
    async fn test_get_bypasses_checks() {
        let response = app(true)
            .oneshot(
                Request::builder()
                    .uri("/api/articles")
                    .header("origin", "https://attacker.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
