//! HTTP observability middleware
//!
//! Implemented as a Tower Layer/Service so it composes with the other
//! layers without `from_fn` boilerplate. Propagates `x-request-id` and
//! records the request counters, latency histogram and in-flight gauge.

use axum::{body::Body, http::Request, response::Response};
use metrics::{counter, gauge, histogram};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct ObservabilityLayer;

impl<S> Layer<S> for ObservabilityLayer {
    type Service = ObservabilityMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservabilityMiddleware { inner }
    }
}

#[derive(Clone, Debug)]
pub struct ObservabilityMiddleware<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for ObservabilityMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let method = request.method().to_string();
        let path = normalize_path(request.uri().path());
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 128)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        gauge!("pressroom_http_requests_in_flight").increment(1.0);
        let start = Instant::now();

        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let span = tracing::info_span!("request", request_id = %request_id);

        Box::pin(
            async move {
                let result = inner.call(request).await;
                gauge!("pressroom_http_requests_in_flight").decrement(1.0);
                let mut response = result?;

                let status = response.status().as_u16().to_string();
                counter!(
                    "pressroom_http_requests_total",
                    "method" => method.clone(),
                    "path" => path.clone(),
                    "status" => status
                )
                .increment(1);
                histogram!(
                    "pressroom_http_request_duration_seconds",
                    "method" => method,
                    "path" => path
                )
                .record(start.elapsed().as_secs_f64());

                if let Ok(value) = request_id.parse() {
                    response.headers_mut().insert("x-request-id", value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

/// Collapse id-like path segments to `{id}` to keep label cardinality low.
/// Article slugs under `/api/articles/` are collapsed as well.
fn normalize_path(path: &str) -> String {
    let mut out = Vec::new();
    let mut previous = "";
    for segment in path.split('/') {
        let collapse = looks_like_uuid(segment)
            || (!segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
            || (previous == "articles" && !segment.is_empty());
        out.push(if collapse { "{id}" } else { segment });
        previous = segment;
    }
    out.join("/")
}

fn looks_like_uuid(s: &str) -> bool {
    s.len() == 36 && s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_normalize_path_with_uuid() {
        assert_eq!(
            normalize_path("/api/articles/550e8400-e29b-41d4-a716-446655440000"),
            "/api/articles/{id}"
        );
    }

    #[test]
    fn test_normalize_path_collapses_slugs_and_numbers() {
        assert_eq!(
            normalize_path("/api/articles/acme-ipo-2026/view"),
            "/api/articles/{id}/view"
        );
        assert_eq!(normalize_path("/api/pages/42"), "/api/pages/{id}");
    }

    #[test]
    fn test_normalize_path_static() {
        assert_eq!(normalize_path("/api/csrf-token"), "/api/csrf-token");
        assert_eq!(normalize_path("/api/articles"), "/api/articles");
    }

    #[test]
    fn test_looks_like_uuid() {
        assert!(looks_like_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!looks_like_uuid("articles"));
        assert!(!looks_like_uuid(""));
    }

    #[tokio::test]
    async fn test_request_id_echoed_or_generated() {
        let app = Router::new()
            .route("/x", get(|| async { StatusCode::NO_CONTENT }))
            .layer(ObservabilityLayer);

        let given = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/x")
                    .header("x-request-id", "req-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(given.headers().get("x-request-id").unwrap(), "req-123");

        let generated = app
            .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let id = generated.headers().get("x-request-id").unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }
}
