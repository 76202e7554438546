//! Error redaction.
//!
//! The server log always gets the full error plus a correlation ID. The
//! client gets the same correlation ID and, in production, only a message
//! drawn from a fixed catalog.

use super::csrf::{INVALID_ORIGIN_MESSAGE, INVALID_TOKEN_MESSAGE};
use crate::crypto::correlation_id;
use crate::error::{AppError, FieldError, Result};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::future::Future;

pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred. Please try again later.";
pub const DUPLICATE_ENTRY_MESSAGE: &str = "A record with this information already exists.";
pub const RESOURCE_IN_USE_MESSAGE: &str =
    "This resource is in use and cannot be modified or removed.";
pub const DATABASE_ERROR_MESSAGE: &str = "A database error occurred. Please try again later.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";
pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed. Please check your input.";
pub const BAD_REQUEST_MESSAGE: &str = "Invalid request. Please check your input and try again.";
pub const UNAUTHORIZED_MESSAGE: &str = "Authentication required. Please sign in.";
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND_MESSAGE: &str = "The requested resource was not found.";
pub const CONFLICT_MESSAGE: &str = "The request conflicts with the current state of the resource.";
pub const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests. Please try again later.";

const DUPLICATE_MARKERS: &[&str] = &["duplicate", "unique"];
const IN_USE_MARKERS: &[&str] = &["foreign key", "constraint"];
const DATABASE_MARKERS: &[&str] = &["pgrst", "sqlstate", "postgres", "relation \"", "column \""];
const AUTH_MARKERS: &[&str] = &[
    "invalid login",
    "invalid credentials",
    "invalid_grant",
    "email not confirmed",
    "jwt",
];

/// Client-facing error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
}

/// Production catalog entry selected by inspecting the raw message.
fn catalog_message_for(raw: &str, status: StatusCode) -> &'static str {
    let raw = raw.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| raw.contains(m));

    if contains_any(DUPLICATE_MARKERS) {
        DUPLICATE_ENTRY_MESSAGE
    } else if contains_any(IN_USE_MARKERS) {
        RESOURCE_IN_USE_MESSAGE
    } else if contains_any(DATABASE_MARKERS) {
        DATABASE_ERROR_MESSAGE
    } else if contains_any(AUTH_MARKERS) {
        INVALID_CREDENTIALS_MESSAGE
    } else {
        status_message(status)
    }
}

/// Final fallback keyed by HTTP status.
pub fn status_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => BAD_REQUEST_MESSAGE,
        StatusCode::UNAUTHORIZED => UNAUTHORIZED_MESSAGE,
        StatusCode::FORBIDDEN => FORBIDDEN_MESSAGE,
        StatusCode::NOT_FOUND => NOT_FOUND_MESSAGE,
        StatusCode::CONFLICT => CONFLICT_MESSAGE,
        StatusCode::TOO_MANY_REQUESTS => TOO_MANY_REQUESTS_MESSAGE,
        _ => GENERIC_ERROR_MESSAGE,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorRedactor {
    production: bool,
}

impl ErrorRedactor {
    pub fn new(production: bool) -> Self {
        Self { production }
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    /// Generic message a production client receives for this error.
    pub fn production_message(error: &AppError, status: StatusCode) -> &'static str {
        match error {
            AppError::CsrfInvalid => INVALID_TOKEN_MESSAGE,
            AppError::OriginInvalid => INVALID_ORIGIN_MESSAGE,
            AppError::RateLimited { .. } => TOO_MANY_REQUESTS_MESSAGE,
            AppError::Validation(_) => VALIDATION_FAILED_MESSAGE,
            AppError::ResourceInUse(_) => RESOURCE_IN_USE_MESSAGE,
            // These messages can echo request input, so only the status speaks.
            AppError::NotFound(_) | AppError::AuthorizationDenied(_) | AppError::Upload(_) => {
                status_message(status)
            }
            other => catalog_message_for(&other.to_string(), status),
        }
    }

    /// Log the error in full and build the client envelope.
    pub fn envelope(&self, error: &AppError, context: &str, status: StatusCode) -> ErrorEnvelope {
        let correlation_id = correlation_id();

        if status.is_server_error() {
            tracing::error!(
                correlation_id = %correlation_id,
                context = %context,
                status = status.as_u16(),
                kind = error.kind(),
                error = %error,
                detail = ?error,
                "Request failed"
            );
        } else {
            tracing::warn!(
                correlation_id = %correlation_id,
                context = %context,
                status = status.as_u16(),
                kind = error.kind(),
                error = %error,
                "Request rejected"
            );
        }
        metrics::counter!("pressroom_errors_total", "kind" => error.kind()).increment(1);

        if self.production {
            ErrorEnvelope {
                error: Self::production_message(error, status).to_string(),
                correlation_id,
                details: None,
            }
        } else {
            ErrorEnvelope {
                error: error.to_string(),
                correlation_id,
                details: Some(format!("{context}: {error:?}")),
            }
        }
    }

    /// Render an error with its own status code.
    pub fn respond(&self, error: &AppError, context: &str) -> Response {
        self.respond_with_status(error, context, error.status_code())
    }

    pub fn respond_with_status(
        &self,
        error: &AppError,
        context: &str,
        status: StatusCode,
    ) -> Response {
        let mut response = (status, Json(self.envelope(error, context, status))).into_response();
        if let AppError::RateLimited { retry_after } = error {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
        }
        response
    }

    /// 400 for a list of field errors; the list itself is only shown outside production.
    pub fn validation(&self, fields: Vec<FieldError>, context: &str) -> Response {
        self.respond(&AppError::Validation(fields), context)
    }

    /// Envelope for an error that exists only as a status, such as a
    /// framework rejection with a plain-text body.
    pub fn status_only(&self, status: StatusCode, context: &str) -> Response {
        let correlation_id = correlation_id();
        tracing::warn!(
            correlation_id = %correlation_id,
            context = %context,
            status = status.as_u16(),
            "Request rejected by framework"
        );
        let envelope = ErrorEnvelope {
            error: status_message(status).to_string(),
            correlation_id,
            details: (!self.production)
                .then(|| status.canonical_reason().unwrap_or("error").to_string()),
        };
        (status, Json(envelope)).into_response()
    }

    /// Run a handler body and funnel any error through the redactor under a
    /// fixed context label.
    ///
    /// Typed errors keep their own status (404, 409, ...) instead of all
    /// becoming 500; only untyped `Internal` errors surface as 500.
    pub async fn guard<F, T>(&self, context: &str, fut: F) -> Response
    where
        F: Future<Output = Result<T>>,
        T: IntoResponse,
    {
        match fut.await {
            Ok(value) => value.into_response(),
            Err(error) => self.respond(&error, context),
        }
    }
}
