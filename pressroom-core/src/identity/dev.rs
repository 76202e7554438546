//! Single-account provider for local development without the hosted service.

use super::{AuthProvider, AuthUser, Session};
use crate::config::DevAdminConfig;
use crate::crypto::{constant_time_eq, random_token_hex};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

const SESSION_TTL_SECS: i64 = 3600;

pub struct StaticAuthProvider {
    admin: Option<DevAdminConfig>,
    /// Access token to issue time (unix seconds).
    sessions: Mutex<HashMap<String, i64>>,
}

impl StaticAuthProvider {
    /// With no account configured every sign-in is refused.
    pub fn new(admin: Option<DevAdminConfig>) -> Self {
        Self {
            admin,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn user(admin: &DevAdminConfig) -> AuthUser {
        AuthUser {
            id: "dev-admin".to_string(),
            email: Some(admin.email.clone()),
        }
    }

    fn invalid() -> AppError {
        AppError::AuthenticationRequired("Invalid login credentials".to_string())
    }
}

fn expired(issued_at: i64, now: i64) -> bool {
    now - issued_at >= SESSION_TTL_SECS
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let admin = self.admin.as_ref().ok_or_else(Self::invalid)?;
        let email_ok = admin.email.eq_ignore_ascii_case(email.trim());
        let password_ok = constant_time_eq(&admin.password, password);
        if !(email_ok && password_ok) {
            return Err(Self::invalid());
        }

        let access_token = random_token_hex(32);
        let now = Utc::now().timestamp();
        {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.retain(|_, issued_at| !expired(*issued_at, now));
            sessions.insert(access_token.clone(), now);
        }

        Ok(Session {
            access_token,
            refresh_token: random_token_hex(32),
            expires_in: SESSION_TTL_SECS,
            user: Self::user(admin),
        })
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let admin = self.admin.as_ref().ok_or_else(Self::invalid)?;
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        match sessions.get(access_token).copied() {
            Some(issued_at) if !expired(issued_at, Utc::now().timestamp()) => Ok(Self::user(admin)),
            Some(_) => {
                sessions.remove(access_token);
                Err(AppError::AuthenticationRequired("Session expired".to_string()))
            }
            None => Err(AppError::AuthenticationRequired("Session not recognized".to_string())),
        }
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.sessions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(access_token);
        Ok(())
    }
}
