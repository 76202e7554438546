//! Secure cookie gateway.
//!
//! Every cookie the service issues goes through [`CookieGateway`], which merges
//! caller overrides over a fixed base policy: `Path=/`, `HttpOnly`,
//! `SameSite=Strict` and `Secure` in production.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration;

/// Per-call overrides of the base cookie policy.
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub http_only: Option<bool>,
    pub same_site: Option<SameSite>,
    pub secure: Option<bool>,
    pub max_age: Option<Duration>,
}

impl CookieOptions {
    pub fn max_age(max_age: Duration) -> Self {
        Self {
            max_age: Some(max_age),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CookieGateway {
    secure: bool,
}

impl CookieGateway {
    pub fn new(production: bool) -> Self {
        Self { secure: production }
    }

    fn build(&self, name: &str, value: &str, overrides: &CookieOptions) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), value.to_string()))
            .path(overrides.path.clone().unwrap_or_else(|| "/".to_string()))
            .http_only(overrides.http_only.unwrap_or(true))
            .same_site(overrides.same_site.unwrap_or(SameSite::Strict))
            .secure(overrides.secure.unwrap_or(self.secure));
        if let Some(max_age) = overrides.max_age {
            builder = builder.max_age(max_age);
        }
        builder.build()
    }

    pub fn set(
        &self,
        jar: CookieJar,
        name: &str,
        value: &str,
        overrides: CookieOptions,
    ) -> CookieJar {
        jar.add(self.build(name, value, &overrides))
    }

    /// Emit an expired cookie carrying the same policy attributes, so the
    /// browser matches and drops the stored one.
    pub fn delete(&self, jar: CookieJar, name: &str, overrides: CookieOptions) -> CookieJar {
        let mut cookie = self.build(name, "", &overrides);
        cookie.make_removal();
        jar.add(cookie)
    }
}
