//! Unified error handling for Pressroom Core

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Application error types.
///
/// `Display` is the raw, developer-facing message. What a client sees is
/// decided by [`crate::security::redact::ErrorRedactor`].
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationRequired(String),

    #[error("{0}")]
    AuthorizationDenied(String),

    #[error("CSRF token missing or mismatched")]
    CsrfInvalid,

    #[error("Request origin does not match site origin")]
    OriginInvalid,

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("{}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    ResourceInUse(String),

    #[error("{0}")]
    Upload(String),

    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.path, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            AppError::CsrfInvalid | AppError::OriginInvalid => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) | AppError::Upload(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::ResourceInUse(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired(_) => "authentication_required",
            AppError::AuthorizationDenied(_) => "authorization_denied",
            AppError::CsrfInvalid => "csrf_invalid",
            AppError::OriginInvalid => "origin_invalid",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Validation(_) => "validation_failed",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ResourceInUse(_) => "resource_in_use",
            AppError::Upload(_) => "upload_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(path, message)])
    }
}

/// Error carried on a response until the redaction layer renders it.
#[derive(Clone, Debug)]
pub struct ReportedError(pub Arc<AppError>);

impl IntoResponse for AppError {
    /// Produces a bodiless response with the error attached as an extension.
    /// `middleware::error_response::normalize_error_response` turns it into the
    /// client envelope; without that layer nothing about the error is exposed.
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = status.into_response();
        response
            .extensions_mut()
            .insert(ReportedError(Arc::new(self)));
        response
    }
}

// Conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(path, errs)| {
                errs.iter().map(move |e| {
                    let message = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    FieldError::new(path.to_string(), message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.path.cmp(&b.path));
        AppError::Validation(fields)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Database(format!("upstream request failed: {err}"))
    }
}
