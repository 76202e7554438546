//! Common test utilities
//!
//! Builds the production router over in-memory stores and drives it with
//! `tower::ServiceExt::oneshot`; no network or hosted services involved.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use pressroom_core::config::{Config, DevAdminConfig, Environment, SiteConfig};
use pressroom_core::domain::{Article, ArticleChanges, NewArticle};
use pressroom_core::error::{AppError, Result};
use pressroom_core::identity::{AuthProvider, StaticAuthProvider};
use pressroom_core::repository::{ArticleRepository, InMemoryArticleRepository};
use pressroom_core::server::{build_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const ADMIN_EMAIL: &str = "editor@example.com";
pub const ADMIN_PASSWORD: &str = "press-on";
pub const SITE_URL: &str = "https://news.example.com";

pub fn test_config(environment: Environment) -> Config {
    Config {
        environment,
        site: SiteConfig {
            url: Some(SITE_URL.to_string()),
        },
        dev_admin: Some(DevAdminConfig {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
        }),
        ..Config::default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new(config: Config) -> Self {
        Self::with_repository(config, Arc::new(InMemoryArticleRepository::new()))
    }

    pub fn with_repository(config: Config, repo: Arc<dyn ArticleRepository>) -> Self {
        let auth: Arc<dyn AuthProvider> = Arc::new(StaticAuthProvider::new(config.dev_admin.clone()));
        let state = AppState::new(config, repo, auth, None);
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Fetch a CSRF token and the cookie that carries it.
    pub async fn csrf(&self) -> (String, String) {
        let response = self.send(get("/api/csrf-token")).await;
        assert_eq!(response.status, StatusCode::OK);
        let token = response.body["data"]["token"].as_str().unwrap().to_string();
        let cookie = response.cookie("csrf-token").unwrap();
        assert_eq!(cookie, token);
        (token, format!("csrf-token={}", cookie))
    }

    /// Sign in as the configured editor. Returns the `Cookie` header value
    /// carrying the session and the rotated CSRF token, plus that token.
    pub async fn sign_in(&self) -> (String, String) {
        let (token, csrf_cookie) = self.csrf().await;
        let response = self
            .send(json_request(
                Method::POST,
                "/api/auth/sign-in",
                serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
                &[("cookie", csrf_cookie.as_str()), ("x-csrf-token", token.as_str()), ("origin", SITE_URL)],
            ))
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text);

        let session = response.cookie("sb-access-token").unwrap();
        let rotated = response.cookie("csrf-token").unwrap();
        (
            format!("sb-access-token={}; csrf-token={}", session, rotated),
            rotated,
        )
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub text: String,
}

impl TestResponse {
    /// Value of a cookie set by this response.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value.to_string())
    }

    pub fn set_cookie_line(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", name)))
            .map(str::to_string)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

pub fn request(method: Method, path: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(
    method: Method,
    path: &str,
    body: Value,
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Store whose reads fail with an internal error carrying `message`.
pub struct FailingRepository {
    pub message: &'static str,
}

#[async_trait]
impl ArticleRepository for FailingRepository {
    async fn create(&self, _input: &NewArticle) -> Result<Article> {
        Err(AppError::Database(self.message.to_string()))
    }

    async fn update(&self, _id: Uuid, _changes: &ArticleChanges) -> Result<Article> {
        Err(AppError::Database(self.message.to_string()))
    }

    async fn delete(&self, _id: Uuid) -> Result<()> {
        Err(AppError::Database(self.message.to_string()))
    }

    async fn find_by_slug(&self, _slug: &str) -> Result<Option<Article>> {
        Err(AppError::Internal(anyhow::anyhow!(self.message)))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<Article>> {
        Err(AppError::Internal(anyhow::anyhow!(self.message)))
    }

    async fn increment_views(&self, _slug: &str) -> Result<()> {
        Err(AppError::Database(self.message.to_string()))
    }
}
