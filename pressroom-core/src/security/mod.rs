//! Request-security core: cookies, CSRF, rate limiting, error redaction and
//! content sanitization.

pub mod cookies;
pub mod csrf;
pub mod rate_limit;
pub mod redact;
pub mod sanitize;

pub use cookies::{CookieGateway, CookieOptions};
pub use csrf::{CsrfGuard, CsrfRejection};
pub use rate_limit::{EndpointClass, RateLimitDecision, RateLimitRule, RateLimiter};
pub use redact::{ErrorEnvelope, ErrorRedactor};
pub use sanitize::{ContentSanitizer, HtmlSanitizer};

use crate::config::Config;
use std::sync::Arc;

/// Security components shared by every request, built once at startup.
#[derive(Clone)]
pub struct SecurityServices {
    pub cookies: CookieGateway,
    pub csrf: CsrfGuard,
    pub rate_limiter: Arc<RateLimiter>,
    pub redactor: ErrorRedactor,
    pub sanitizer: ContentSanitizer,
}

impl SecurityServices {
    pub fn from_config(config: &Config) -> Self {
        let production = config.is_production();
        let cookies = CookieGateway::new(production);
        Self {
            cookies,
            csrf: CsrfGuard::new(cookies, production, config.site.url.as_deref()),
            rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            redactor: ErrorRedactor::new(production),
            sanitizer: ContentSanitizer::from_mode(config.sanitizer),
        }
    }
}
