//! Data access layer (Repository pattern)

pub mod article;

pub use article::{ArticleRepository, InMemoryArticleRepository, RestArticleRepository};
