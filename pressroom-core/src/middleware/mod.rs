//! HTTP middleware for Pressroom Core
//!
//! - client identity resolution for rate limiting
//! - per-class rate limiting
//! - CSRF token and origin enforcement
//! - error envelope normalization and panic handling
//! - security headers, request spans and HTTP metrics

pub mod client_ip;
pub mod csrf;
pub mod error_response;
pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod trace;

pub use client_ip::client_identifier;
pub use csrf::{csrf_middleware, csrf_rejection_response};
pub use error_response::{normalize_error_response, panic_response};
pub use metrics::ObservabilityLayer;
pub use rate_limit::{rate_limit_middleware, RateLimitGuard};
pub use security_headers::security_headers_middleware;
pub use trace::SanitizedMakeSpan;
