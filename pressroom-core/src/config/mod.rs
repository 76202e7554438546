//! Configuration management for Pressroom Core

use crate::security::rate_limit::{EndpointClass, RateLimitRule};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Deployment environment; the single switch for cookie security,
    /// error verbosity and missing-origin tolerance
    pub environment: Environment,
    /// Public site configuration
    pub site: SiteConfig,
    /// Hosted data/auth service; `None` selects the in-memory stores
    pub store: Option<StoreConfig>,
    /// Fixed credentials accepted when no hosted auth service is configured
    pub dev_admin: Option<DevAdminConfig>,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Response security headers
    pub security_headers: SecurityHeadersConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
    /// HTML sanitizer selection
    pub sanitizer: SanitizerMode,
    /// Capacity of the background view-count queue
    pub view_queue_capacity: usize,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse `APP_ENV`. Anything other than `production`/`prod` is development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    /// Canonical site URL (e.g., https://news.example.com). Origin checks fall
    /// back to the request's own origin when unset.
    pub url: Option<String>,
}

/// Hosted database/auth service endpoint
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub anon_key: String,
    /// Service-role key used for every article store call when set; the
    /// auth client always uses the anon key
    pub service_key: Option<String>,
}

impl StoreConfig {
    /// Key for the article store: the service-role key, else the anon key.
    pub fn data_key(&self) -> &str {
        self.service_key.as_deref().unwrap_or(&self.anon_key)
    }
}

#[derive(Debug, Clone)]
pub struct DevAdminConfig {
    pub email: String,
    pub password: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Per endpoint-class rules
    pub rules: HashMap<EndpointClass, RateLimitRule>,
    /// Interval between sweeps of expired buckets
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: EndpointClass::ALL
                .iter()
                .map(|class| (*class, class.default_rule()))
                .collect(),
            sweep_interval_secs: 300,
        }
    }
}

impl RateLimitConfig {
    /// Rule for a class, falling back to the built-in default.
    pub fn rule(&self, class: EndpointClass) -> RateLimitRule {
        self.rules
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_rule())
    }
}

/// Security headers configuration
#[derive(Debug, Clone)]
pub struct SecurityHeadersConfig {
    pub hsts_enabled: bool,
    /// Only emit HSTS for requests that arrived over HTTPS
    pub hsts_https_only: bool,
    /// Trust `X-Forwarded-Proto` to decide whether the request was HTTPS
    pub hsts_trust_x_forwarded_proto: bool,
    pub hsts_max_age_secs: u64,
    pub hsts_include_subdomains: bool,
    pub hsts_preload: bool,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            hsts_enabled: true,
            hsts_https_only: true,
            hsts_trust_x_forwarded_proto: true,
            hsts_max_age_secs: 31_536_000,
            hsts_include_subdomains: true,
            hsts_preload: false,
        }
    }
}

/// Logging and metrics configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Expose Prometheus metrics on `/metrics`
    pub metrics_enabled: bool,
    /// "json" or "pretty"
    pub log_format: String,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            log_format: "pretty".to_string(),
            service_name: "pressroom-core".to_string(),
        }
    }
}

/// Which HTML sanitizer implementation to install at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SanitizerMode {
    /// Allow-list based rich HTML cleaning
    #[default]
    AllowList,
    /// Escape everything; no markup survives
    TextOnly,
}

impl SanitizerMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "text_only" | "escape" => SanitizerMode::TextOnly,
            _ => SanitizerMode::AllowList,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RateLimitRuleOverride {
    max_requests: u32,
    window_ms: u64,
}

/// Parse `RATE_LIMIT_RULES`, e.g. `{"login": {"max_requests": 3, "window_ms": 60000}}`.
fn parse_rate_limit_rules(raw: &str) -> Result<HashMap<EndpointClass, RateLimitRule>> {
    let overrides: HashMap<EndpointClass, RateLimitRuleOverride> =
        serde_json::from_str(raw).context("Invalid RATE_LIMIT_RULES")?;
    Ok(overrides
        .into_iter()
        .map(|(class, rule)| {
            (
                class,
                RateLimitRule {
                    max_requests: rule.max_requests,
                    window_ms: rule.window_ms,
                },
            )
        })
        .collect())
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| s.to_lowercase() == "true")
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let environment = env::var("APP_ENV")
            .map(|s| Environment::parse(&s))
            .unwrap_or_default();

        let store = match (env::var("SUPABASE_URL"), env::var("SUPABASE_ANON_KEY")) {
            (Ok(url), Ok(anon_key)) if !url.trim().is_empty() => Some(StoreConfig {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                    .ok()
                    .filter(|k| !k.trim().is_empty()),
            }),
            (Ok(_), Err(_)) => anyhow::bail!("SUPABASE_ANON_KEY is required when SUPABASE_URL is set"),
            _ => None,
        };

        let dev_admin = match (env::var("DEV_ADMIN_EMAIL"), env::var("DEV_ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(DevAdminConfig { email, password }),
            _ => None,
        };

        let rate_limit = {
            let mut config = RateLimitConfig {
                enabled: env_flag("RATE_LIMIT_ENABLED", true),
                sweep_interval_secs: env::var("RATE_LIMIT_SWEEP_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("Invalid RATE_LIMIT_SWEEP_INTERVAL_SECS")?,
                ..RateLimitConfig::default()
            };
            if let Ok(raw) = env::var("RATE_LIMIT_RULES") {
                config.rules.extend(parse_rate_limit_rules(&raw)?);
            }
            config
        };

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            environment,
            site: SiteConfig {
                url: env::var("SITE_URL").ok().filter(|s| !s.trim().is_empty()),
            },
            store,
            dev_admin,
            rate_limit,
            security_headers: SecurityHeadersConfig {
                hsts_enabled: env_flag("HSTS_ENABLED", true),
                hsts_https_only: env_flag("HSTS_HTTPS_ONLY", true),
                hsts_trust_x_forwarded_proto: env_flag("HSTS_TRUST_X_FORWARDED_PROTO", true),
                hsts_max_age_secs: env::var("HSTS_MAX_AGE_SECS")
                    .unwrap_or_else(|_| "31536000".to_string())
                    .parse()
                    .unwrap_or(31_536_000),
                hsts_include_subdomains: env_flag("HSTS_INCLUDE_SUBDOMAINS", true),
                hsts_preload: env_flag("HSTS_PRELOAD", false),
            },
            telemetry: TelemetryConfig {
                metrics_enabled: env_flag("METRICS_ENABLED", false),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "pressroom-core".to_string()),
            },
            sanitizer: env::var("SANITIZER_MODE")
                .map(|s| SanitizerMode::parse(&s))
                .unwrap_or_default(),
            view_queue_capacity: env::var("VIEW_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .context("Invalid VIEW_QUEUE_CAPACITY")?,
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: "127.0.0.1".to_string(),
            http_port: 8080,
            environment: Environment::Development,
            site: SiteConfig::default(),
            store: None,
            dev_admin: None,
            rate_limit: RateLimitConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            telemetry: TelemetryConfig::default(),
            sanitizer: SanitizerMode::AllowList,
            view_queue_capacity: 1024,
        }
    }
}
