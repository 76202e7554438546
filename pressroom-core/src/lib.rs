//! Pressroom Core - request-security backend for the Pressroom publishing portal
//!
//! Cookie issuance, CSRF protection, per-class rate limiting, error redaction
//! and content sanitization, plus the article and editor-session API they
//! guard.

pub mod api;
pub mod config;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod repository;
pub mod security;
pub mod server;
pub mod service;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
