//! Article domain model

use crate::error::{AppError, Result};
use crate::security::sanitize::{is_allowed_uri, ContentSanitizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Published or draft article as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub views: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_image_uri(value: &str) -> std::result::Result<(), ValidationError> {
    if is_allowed_uri(value) {
        Ok(())
    } else {
        Err(ValidationError::new("uri").with_message("unsupported URL scheme".into()))
    }
}

fn validate_tags(tags: &[String]) -> std::result::Result<(), ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 50) {
        return Err(ValidationError::new("tags").with_message("tags must be 1-50 characters".into()));
    }
    Ok(())
}

/// Input for creating an article
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateArticleInput {
    #[validate(length(min = 1, max = 300, message = "must be 1-300 characters"))]
    pub title: String,
    /// Derived from the title when omitted
    #[validate(length(max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 1000))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, max = 200000, message = "must not be empty"))]
    pub content: String,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20), custom(function = "validate_tags"))]
    pub tags: Vec<String>,
    #[validate(length(max = 2048), custom(function = "validate_image_uri"))]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub published: bool,
}

/// Input for updating an article; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateArticleInput {
    #[validate(length(min = 1, max = 300, message = "must be 1-300 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub slug: Option<String>,
    #[validate(length(max = 1000))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, max = 200000, message = "must not be empty"))]
    pub content: Option<String>,
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 20), custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 2048), custom(function = "validate_image_uri"))]
    pub cover_image_url: Option<String>,
    pub published: Option<bool>,
}

/// Sanitized article ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub cover_image_url: Option<String>,
    pub published: bool,
}

/// Sanitized partial update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticleChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

fn clean_slug(sanitizer: &ContentSanitizer, raw: &str) -> Result<String> {
    let slug = sanitizer.sanitize_slug(raw);
    if slug.is_empty() {
        return Err(AppError::validation(
            "slug",
            "must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

fn clean_tags(sanitizer: &ContentSanitizer, tags: Vec<String>) -> Vec<String> {
    tags.iter()
        .map(|t| sanitizer.escape_text(t.trim()))
        .collect()
}

impl CreateArticleInput {
    /// Validate, then sanitize: text fields escaped, body cleaned as rich HTML,
    /// slug normalized.
    pub fn into_new_article(self, sanitizer: &ContentSanitizer) -> Result<NewArticle> {
        self.validate()?;
        let slug = clean_slug(sanitizer, self.slug.as_deref().unwrap_or(&self.title))?;
        Ok(NewArticle {
            slug,
            title: sanitizer.escape_text(self.title.trim()),
            excerpt: self.excerpt.map(|e| sanitizer.escape_text(e.trim())),
            content: sanitizer.sanitize_html(&self.content),
            category: self.category.map(|c| sanitizer.escape_text(c.trim())),
            tags: clean_tags(sanitizer, self.tags),
            cover_image_url: self.cover_image_url,
            published: self.published,
        })
    }
}

impl UpdateArticleInput {
    pub fn into_changes(self, sanitizer: &ContentSanitizer) -> Result<ArticleChanges> {
        self.validate()?;
        let slug = match self.slug.as_deref() {
            Some(raw) => Some(clean_slug(sanitizer, raw)?),
            None => None,
        };
        Ok(ArticleChanges {
            slug,
            title: self.title.map(|t| sanitizer.escape_text(t.trim())),
            excerpt: self.excerpt.map(|e| sanitizer.escape_text(e.trim())),
            content: self.content.map(|c| sanitizer.sanitize_html(&c)),
            category: self.category.map(|c| sanitizer.escape_text(c.trim())),
            tags: self.tags.map(|t| clean_tags(sanitizer, t)),
            cover_image_url: self.cover_image_url,
            published: self.published,
        })
    }
}

impl ArticleChanges {
    pub fn is_empty(&self) -> bool {
        *self == ArticleChanges::default()
    }

    pub fn apply_to(self, article: &mut Article) {
        if let Some(slug) = self.slug {
            article.slug = slug;
        }
        if let Some(title) = self.title {
            article.title = title;
        }
        if let Some(excerpt) = self.excerpt {
            article.excerpt = Some(excerpt);
        }
        if let Some(content) = self.content {
            article.content = content;
        }
        if let Some(category) = self.category {
            article.category = Some(category);
        }
        if let Some(tags) = self.tags {
            article.tags = tags;
        }
        if let Some(url) = self.cover_image_url {
            article.cover_image_url = Some(url);
        }
        if let Some(published) = self.published {
            article.published = published;
        }
        article.updated_at = Utc::now();
    }
}
