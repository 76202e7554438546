//! Article repository

use crate::domain::{Article, ArticleChanges, NewArticle};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, input: &NewArticle) -> Result<Article>;
    async fn update(&self, id: Uuid, changes: &ArticleChanges) -> Result<Article>;
    async fn delete(&self, id: Uuid) -> Result<()>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>>;
    async fn increment_views(&self, slug: &str) -> Result<()>;
}

fn duplicate_slug_error() -> AppError {
    AppError::Conflict(
        "duplicate key value violates unique constraint \"articles_slug_key\"".to_string(),
    )
}

fn article_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Article {} not found", id))
}

/// Process-local store used in development and tests.
#[derive(Default)]
pub struct InMemoryArticleRepository {
    articles: RwLock<HashMap<Uuid, Article>>,
}

impl InMemoryArticleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<Uuid, Article>> {
        self.articles.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Article>> {
        self.articles.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn create(&self, input: &NewArticle) -> Result<Article> {
        let mut articles = self.write();
        if articles.values().any(|a| a.slug == input.slug) {
            return Err(duplicate_slug_error());
        }
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            slug: input.slug.clone(),
            title: input.title.clone(),
            excerpt: input.excerpt.clone(),
            content: input.content.clone(),
            category: input.category.clone(),
            tags: input.tags.clone(),
            cover_image_url: input.cover_image_url.clone(),
            published: input.published,
            views: 0,
            created_at: now,
            updated_at: now,
        };
        articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update(&self, id: Uuid, changes: &ArticleChanges) -> Result<Article> {
        let mut articles = self.write();
        if let Some(slug) = &changes.slug {
            if articles.values().any(|a| a.id != id && &a.slug == slug) {
                return Err(duplicate_slug_error());
            }
        }
        let article = articles.get_mut(&id).ok_or_else(|| article_not_found(id))?;
        changes.clone().apply_to(article);
        Ok(article.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| article_not_found(id))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        Ok(self.read().values().find(|a| a.slug == slug).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.read().get(&id).cloned())
    }

    async fn increment_views(&self, slug: &str) -> Result<()> {
        let mut articles = self.write();
        match articles.values_mut().find(|a| a.slug == slug) {
            Some(article) => {
                article.views += 1;
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Article '{}' not found", slug))),
        }
    }
}

/// Error body returned by the hosted REST layer.
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Serialize)]
struct IncrementViews<'a> {
    article_slug: &'a str,
}

/// Articles table behind the hosted data service's REST interface.
pub struct RestArticleRepository {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestArticleRepository {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/articles", self.base_url)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: RestErrorBody = response.json().await.unwrap_or_default();
        let code = body.code.unwrap_or_default();
        let message = format!(
            "{} {}: {}{}",
            status.as_u16(),
            code,
            body.message.unwrap_or_else(|| "request failed".to_string()),
            body.details.map(|d| format!(" ({d})")).unwrap_or_default()
        );
        Err(match (code.as_str(), status) {
            ("23503", _) => AppError::ResourceInUse(message),
            ("23505", _) | (_, StatusCode::CONFLICT) => AppError::Conflict(message),
            _ => AppError::Database(message),
        })
    }

    async fn fetch_one(&self, column: &str, value: String) -> Result<Option<Article>> {
        let response = self
            .authorize(self.client.get(self.table_url()))
            .query(&[
                ("select", "*".to_string()),
                (column, format!("eq.{value}")),
                ("limit", "1".to_string()),
            ])
            .send()
            .await?;
        let mut rows: Vec<Article> = Self::check(response).await?.json().await?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl ArticleRepository for RestArticleRepository {
    async fn create(&self, input: &NewArticle) -> Result<Article> {
        let response = self
            .authorize(self.client.post(self.table_url()))
            .header("Prefer", "return=representation")
            .json(input)
            .send()
            .await?;
        let mut rows: Vec<Article> = Self::check(response).await?.json().await?;
        rows.pop()
            .ok_or_else(|| AppError::Database("insert returned no rows".to_string()))
    }

    async fn update(&self, id: Uuid, changes: &ArticleChanges) -> Result<Article> {
        let response = self
            .authorize(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(changes)
            .send()
            .await?;
        let mut rows: Vec<Article> = Self::check(response).await?.json().await?;
        rows.pop().ok_or_else(|| article_not_found(id))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::check(response).await?.json().await?;
        if rows.is_empty() {
            return Err(article_not_found(id));
        }
        Ok(())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        self.fetch_one("slug", slug.to_string()).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Article>> {
        self.fetch_one("id", id.to_string()).await
    }

    async fn increment_views(&self, slug: &str) -> Result<()> {
        let response = self
            .authorize(
                self.client
                    .post(format!("{}/rest/v1/rpc/increment_article_views", self.base_url)),
            )
            .json(&IncrementViews { article_slug: slug })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
