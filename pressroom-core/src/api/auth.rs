//! Editor sign-in and sign-out

use super::{access_token, MessageResponse, SuccessResponse};
use crate::error::Result;
use crate::identity::{AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::middleware::csrf_rejection_response;
use crate::security::CookieOptions;
use crate::server::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, Method},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use cookie::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
    /// Accepted when the client cannot set the `X-CSRF-Token` header.
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user: AuthUser,
    pub csrf_token: String,
}

/// POST /api/auth/sign-in
///
/// The CSRF check runs here rather than in a layer so the token may also
/// arrive in the JSON body.
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(body): Json<SignInRequest>,
) -> Result<Response> {
    if let Err(rejection) =
        state
            .security
            .csrf
            .protect(&Method::POST, &headers, &jar, body.csrf_token.as_deref())
    {
        return Ok(csrf_rejection_response(rejection, &headers, "/api/auth/sign-in"));
    }
    body.validate()?;

    let session = state.auth.sign_in(body.email.trim(), &body.password).await?;
    info!(user_id = %session.user.id, "Editor signed in");

    let cookies = &state.security.cookies;
    let jar = cookies.set(
        jar,
        ACCESS_TOKEN_COOKIE,
        &session.access_token,
        CookieOptions::max_age(Duration::seconds(session.expires_in)),
    );
    let jar = cookies.set(
        jar,
        REFRESH_TOKEN_COOKIE,
        &session.refresh_token,
        CookieOptions::max_age(Duration::days(REFRESH_TOKEN_TTL_DAYS)),
    );
    // Pre-login tokens never survive into the session.
    let (jar, csrf_token) = state.security.csrf.rotate_token(jar);

    Ok((
        jar,
        Json(SuccessResponse::new(SignInResponse {
            user: session.user,
            csrf_token,
        })),
    )
        .into_response())
}

/// POST /api/auth/sign-out
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> impl IntoResponse {
    if let Some(token) = access_token(&jar, &headers) {
        if let Err(e) = state.auth.sign_out(&token).await {
            warn!(error = %e, "Upstream sign-out failed; clearing cookies anyway");
        }
    }

    let cookies = &state.security.cookies;
    let jar = cookies.delete(jar, ACCESS_TOKEN_COOKIE, CookieOptions::default());
    let jar = cookies.delete(jar, REFRESH_TOKEN_COOKIE, CookieOptions::default());
    let jar = state.security.csrf.clear_token(jar);

    (jar, Json(MessageResponse::new("Signed out")))
}
