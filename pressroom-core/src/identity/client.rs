//! Client for the hosted auth service's REST API

use super::{AuthProvider, AuthUser, Session};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct SupabaseAuthClient {
    http_client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default, alias = "error_description", alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SupabaseAuthClient {
    pub fn new(http_client: Client, base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    async fn failure(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body: AuthErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .message
            .or(body.error)
            .unwrap_or_else(|| format!("auth service returned {}", status));
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::AuthenticationRequired(message)
            }
            StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited { retry_after: 60 },
            _ => AppError::Internal(anyhow::anyhow!("auth service {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let response = self
            .http_client
            .post(self.url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("sign-in request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed session: {}", e)))
    }

    async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let response = self
            .http_client
            .get(self.url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("user lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed user: {}", e)))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .http_client
            .post(self.url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("sign-out request failed: {}", e)))?;

        // An already expired token has nothing left to revoke.
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        Err(Self::failure(response).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SupabaseAuthClient {
        SupabaseAuthClient::new(Client::new(), server.uri(), "anon")
    }

    #[tokio::test]
    async fn test_sign_in_returns_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .and(body_json(json!({"email": "ed@example.com", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at",
                "refresh_token": "rt",
                "expires_in": 3600,
                "token_type": "bearer",
                "user": {"id": "u-1", "email": "ed@example.com"}
            })))
            .mount(&server)
            .await;

        let session = client(&server).sign_in("ed@example.com", "pw").await.unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.refresh_token, "rt");
        assert_eq!(session.expires_in, 3600);
        assert_eq!(session.user.id, "u-1");
    }

    #[tokio::test]
    async fn test_bad_credentials_are_authentication_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let err = client(&server).sign_in("ed@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationRequired(_)));
        assert_eq!(err.to_string(), "Invalid login credentials");
    }

    #[tokio::test]
    async fn test_get_user_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer at"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-1", "email": "ed@example.com", "role": "authenticated"
            })))
            .mount(&server)
            .await;

        let user = client(&server).get_user("at").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ed@example.com"));
    }

    #[tokio::test]
    async fn test_get_user_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "JWT expired"})))
            .mount(&server)
            .await;

        let err = client(&server).get_user("old").await.unwrap_err();
        assert!(matches!(err, AppError::AuthenticationRequired(_)));
    }

    #[tokio::test]
    async fn test_sign_out_tolerates_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).sign_out("old").await.unwrap();
    }

    #[tokio::test]
    async fn test_upstream_failure_is_internal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).get_user("at").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
