//! Double-submit-cookie CSRF guard with an Origin/Referer secondary check.

use super::cookies::{CookieGateway, CookieOptions};
use crate::crypto::{constant_time_eq, random_token_hex};
use crate::error::AppError;
use axum::http::{header, HeaderMap, Method};
use axum_extra::extract::cookie::CookieJar;
use cookie::time::Duration;
use url::Url;

pub const CSRF_COOKIE_NAME: &str = "csrf-token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";
/// 32 bytes of entropy, hex encoded to 64 characters
pub const CSRF_TOKEN_BYTES: usize = 32;
pub const CSRF_TOKEN_TTL_DAYS: i64 = 7;

pub const INVALID_TOKEN_MESSAGE: &str =
    "Invalid CSRF token. Please refresh the page and try again.";
pub const INVALID_ORIGIN_MESSAGE: &str =
    "Invalid request origin. Please refresh the page and try again.";

/// Which CSRF check failed first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfRejection {
    InvalidToken,
    InvalidOrigin,
}

impl CsrfRejection {
    pub fn message(self) -> &'static str {
        match self {
            CsrfRejection::InvalidToken => INVALID_TOKEN_MESSAGE,
            CsrfRejection::InvalidOrigin => INVALID_ORIGIN_MESSAGE,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            CsrfRejection::InvalidToken => "token",
            CsrfRejection::InvalidOrigin => "origin",
        }
    }
}

impl From<CsrfRejection> for AppError {
    fn from(rejection: CsrfRejection) -> Self {
        match rejection {
            CsrfRejection::InvalidToken => AppError::CsrfInvalid,
            CsrfRejection::InvalidOrigin => AppError::OriginInvalid,
        }
    }
}

pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[derive(Debug, Clone)]
pub struct CsrfGuard {
    cookies: CookieGateway,
    production: bool,
    site_origin: Option<String>,
}

impl CsrfGuard {
    pub fn new(cookies: CookieGateway, production: bool, site_url: Option<&str>) -> Self {
        let site_origin = site_url.and_then(|raw| match Url::parse(raw) {
            Ok(url) => Some(url.origin().ascii_serialization()),
            Err(e) => {
                tracing::warn!(site_url = %raw, error = %e, "Ignoring unparseable SITE_URL for origin checks");
                None
            }
        });
        Self {
            cookies,
            production,
            site_origin,
        }
    }

    pub fn generate_token() -> String {
        random_token_hex(CSRF_TOKEN_BYTES)
    }

    fn store(&self, jar: CookieJar, token: &str) -> CookieJar {
        self.cookies.set(
            jar,
            CSRF_COOKIE_NAME,
            token,
            CookieOptions::max_age(Duration::days(CSRF_TOKEN_TTL_DAYS)),
        )
    }

    /// Existing cookie token, or a freshly issued one.
    pub fn get_or_create_token(&self, jar: CookieJar) -> (CookieJar, String) {
        match jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_string()) {
            Some(token) if !token.is_empty() => (jar, token),
            _ => self.rotate_token(jar),
        }
    }

    pub fn rotate_token(&self, jar: CookieJar) -> (CookieJar, String) {
        let token = Self::generate_token();
        (self.store(jar, &token), token)
    }

    pub fn clear_token(&self, jar: CookieJar) -> CookieJar {
        self.cookies
            .delete(jar, CSRF_COOKIE_NAME, CookieOptions::default())
    }

    /// Double-submit check. `provided` is a fallback used only when the
    /// request carries no `X-CSRF-Token` header (e.g. a token in a form body).
    pub fn validate_token(
        &self,
        method: &Method,
        headers: &HeaderMap,
        jar: &CookieJar,
        provided: Option<&str>,
    ) -> bool {
        if is_safe_method(method) {
            return true;
        }

        let cookie_token = jar
            .get(CSRF_COOKIE_NAME)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());
        let presented = headers
            .get(CSRF_HEADER_NAME)
            .and_then(|v| v.to_str().ok())
            .or(provided)
            .filter(|v| !v.is_empty());

        match (cookie_token, presented) {
            (Some(cookie_token), Some(presented)) => constant_time_eq(&cookie_token, presented),
            _ => false,
        }
    }

    pub fn validate_origin(&self, method: &Method, headers: &HeaderMap) -> bool {
        if is_safe_method(method) {
            return true;
        }

        let source = headers
            .get(header::ORIGIN)
            .or_else(|| headers.get(header::REFERER))
            .and_then(|v| v.to_str().ok());

        let Some(source) = source else {
            return !self.production;
        };

        let Some(expected) = self.expected_origin(headers) else {
            return false;
        };

        match Url::parse(source) {
            Ok(url) => url.origin().ascii_serialization() == expected,
            Err(_) => false,
        }
    }

    /// Configured site origin, else the request's own origin.
    fn expected_origin(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(origin) = &self.site_origin {
            return Some(origin.clone());
        }
        let host = headers.get(header::HOST).and_then(|v| v.to_str().ok())?;
        let proto = headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .unwrap_or("http");
        Url::parse(&format!("{proto}://{host}"))
            .ok()
            .map(|url| url.origin().ascii_serialization())
    }

    /// Token check, then origin check.
    pub fn protect(
        &self,
        method: &Method,
        headers: &HeaderMap,
        jar: &CookieJar,
        provided: Option<&str>,
    ) -> Result<(), CsrfRejection> {
        if !self.validate_token(method, headers, jar, provided) {
            return Err(CsrfRejection::InvalidToken);
        }
        if !self.validate_origin(method, headers) {
            return Err(CsrfRejection::InvalidOrigin);
        }
        Ok(())
    }
}
