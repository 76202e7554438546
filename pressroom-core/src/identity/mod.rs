//! Editor sign-in against the hosted auth service

pub mod client;
pub mod dev;

pub use client::SupabaseAuthClient;
pub use dev::StaticAuthProvider;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cookie carrying the access token of a signed-in editor
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie carrying the refresh token of a signed-in editor
pub const REFRESH_TOKEN_COOKIE: &str = "sb-refresh-token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: AuthUser,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange email and password for a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    /// Resolve the user behind an access token.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;
}
