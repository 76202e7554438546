//! Error response normalization middleware
//!
//! Every error response leaves the service as an `ErrorEnvelope`:
//! - handler errors (`AppError`) are rendered by the configured redactor,
//! - framework rejections with plain-text bodies are replaced by a generic
//!   envelope,
//! - panics caught by `CatchPanicLayer` become a generic 500.

use crate::crypto::correlation_id;
use crate::error::ReportedError;
use crate::security::redact::{ErrorEnvelope, ErrorRedactor, GENERIC_ERROR_MESSAGE};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;

pub async fn normalize_error_response(
    State(redactor): State<ErrorRedactor>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let context = format!("{} {}", request.method(), path);
    let mut response = next.run(request).await;

    if let Some(ReportedError(error)) = response.extensions_mut().remove::<ReportedError>() {
        let rendered = redactor.respond(&error, &context);
        return carry_headers(response, rendered);
    }

    // Health/readiness endpoints return their own plain-text responses
    if path == "/health" || path == "/ready" {
        return response;
    }

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);
    if is_json {
        return response;
    }

    let rendered = redactor.status_only(status, &context);
    carry_headers(response, rendered)
}

/// Keep headers set by inner layers (rate-limit, cookies) on the replacement.
fn carry_headers(original: Response, mut rendered: Response) -> Response {
    let (parts, _) = original.into_parts();
    for (name, value) in parts.headers.iter() {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        rendered.headers_mut().append(name.clone(), value.clone());
    }
    rendered
}

/// Response for a handler panic caught by `tower_http::catch_panic`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let correlation_id = correlation_id();
    let message = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(correlation_id = %correlation_id, panic = %message, "Handler panicked");
    metrics::counter!("pressroom_errors_total", "kind" => "panic").increment(1);

    let body = ErrorEnvelope {
        error: GENERIC_ERROR_MESSAGE.to_string(),
        correlation_id,
        details: None,
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
