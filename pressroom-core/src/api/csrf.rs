//! CSRF token issuance

use super::SuccessResponse;
use crate::server::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CsrfTokenResponse {
    pub token: String,
}

/// GET /api/csrf-token
///
/// Returns the caller's current token, issuing one (and its cookie) when the
/// request carries none.
pub async fn csrf_token(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, token) = state.security.csrf.get_or_create_token(jar);
    (jar, Json(SuccessResponse::new(CsrfTokenResponse { token })))
}
