//! Article business logic

use crate::domain::{Article, CreateArticleInput, UpdateArticleInput};
use crate::error::{AppError, Result};
use crate::repository::ArticleRepository;
use crate::security::ContentSanitizer;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct ArticleService {
    repo: Arc<dyn ArticleRepository>,
    sanitizer: ContentSanitizer,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn ArticleRepository>, sanitizer: ContentSanitizer) -> Self {
        Self { repo, sanitizer }
    }

    /// Round-trip to the store for readiness probes.
    pub async fn ping(&self) -> Result<()> {
        self.repo.find_by_slug("__readiness_probe__").await.map(|_| ())
    }

    /// Drafts are hidden from readers.
    pub async fn get_published(&self, slug: &str) -> Result<Article> {
        match self.repo.find_by_slug(slug).await? {
            Some(article) if article.published => Ok(article),
            _ => Err(AppError::NotFound(format!("Article '{}' not found", slug))),
        }
    }

    pub async fn create(&self, input: CreateArticleInput) -> Result<Article> {
        let new_article = input.into_new_article(&self.sanitizer)?;
        let article = self.repo.create(&new_article).await?;
        info!(article_id = %article.id, slug = %article.slug, "Article created");
        Ok(article)
    }

    pub async fn update(&self, id: Uuid, input: UpdateArticleInput) -> Result<Article> {
        let changes = input.into_changes(&self.sanitizer)?;
        if changes.is_empty() {
            return self
                .repo
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Article {} not found", id)));
        }
        let article = self.repo.update(id, &changes).await?;
        info!(article_id = %article.id, "Article updated");
        Ok(article)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.repo.delete(id).await?;
        info!(article_id = %id, "Article deleted");
        Ok(())
    }
}
