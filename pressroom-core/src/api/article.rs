//! Article endpoints
//!
//! The `{article}` path segment is a slug on reader routes and an id on
//! editor routes.

use super::{require_admin, SuccessResponse};
use crate::domain::{Article, CreateArticleInput, UpdateArticleInput};
use crate::error::Result;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewRecorded {
    pub queued: bool,
}

/// GET /api/articles/{slug}
pub async fn get_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse<Article>>> {
    let article = state.articles.get_published(&slug).await?;
    Ok(Json(SuccessResponse::new(article)))
}

/// POST /api/articles
pub async fn create_article(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(input): Json<CreateArticleInput>,
) -> Result<impl IntoResponse> {
    require_admin(&state, &jar, &headers).await?;
    let article = state.articles.create(input).await?;
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(article))))
}

/// PUT /api/articles/{id}
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(input): Json<UpdateArticleInput>,
) -> Result<Json<SuccessResponse<Article>>> {
    require_admin(&state, &jar, &headers).await?;
    let article = state.articles.update(id, input).await?;
    Ok(Json(SuccessResponse::new(article)))
}

/// DELETE /api/articles/{id}
pub async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<StatusCode> {
    require_admin(&state, &jar, &headers).await?;
    state.articles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET|POST /api/articles/{slug}/view
///
/// Answers before the count is applied; a full queue is not an error.
pub async fn record_view(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let queued = state.views.record(&slug);
    (
        StatusCode::ACCEPTED,
        Json(SuccessResponse::new(ViewRecorded { queued })),
    )
}
