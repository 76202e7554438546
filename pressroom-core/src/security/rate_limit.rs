//! In-process sliding-window rate limiter.
//!
//! Each `(endpoint class, client)` pair owns a log of request timestamps.
//! Requests older than the class window are never counted, and a bucket is
//! discarded once its `reset_time` passes. A background sweep drops expired
//! buckets so abandoned keys do not accumulate.

use crate::config::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{sync::watch, task::JoinHandle};

/// Named category of API route selecting a rate-limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointClass {
    Login,
    Api,
    Upload,
    Public,
    View,
}

impl EndpointClass {
    pub const ALL: [EndpointClass; 5] = [
        EndpointClass::Login,
        EndpointClass::Api,
        EndpointClass::Upload,
        EndpointClass::Public,
        EndpointClass::View,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EndpointClass::Login => "login",
            EndpointClass::Api => "api",
            EndpointClass::Upload => "upload",
            EndpointClass::Public => "public",
            EndpointClass::View => "view",
        }
    }

    pub fn default_rule(self) -> RateLimitRule {
        const MINUTE: u64 = 60 * 1000;
        match self {
            EndpointClass::Login => RateLimitRule::new(5, 15 * MINUTE),
            EndpointClass::Api => RateLimitRule::new(100, MINUTE),
            EndpointClass::Upload => RateLimitRule::new(10, MINUTE),
            EndpointClass::Public => RateLimitRule::new(200, MINUTE),
            EndpointClass::View => RateLimitRule::new(10, MINUTE),
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum requests per sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window_ms: u64,
}

impl RateLimitRule {
    pub const fn new(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the bucket resets
    pub reset_at_ms: u64,
    /// Seconds until retry; only set for rejected requests
    pub retry_after_secs: Option<u64>,
}

#[derive(Debug)]
struct Bucket {
    timestamps: Vec<u64>,
    reset_time: u64,
}

struct Sweeper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Shared bucket store. Construct one per process (or per test) and hand it
/// out behind an `Arc`.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn rule(&self, class: EndpointClass) -> RateLimitRule {
        self.config.rule(class)
    }

    /// Check and record a request against the wall clock.
    pub fn check(&self, class: EndpointClass, client: &str) -> RateLimitDecision {
        self.check_at(class, client, now_ms())
    }

    /// Check and record a request at an explicit instant (epoch milliseconds).
    pub fn check_at(&self, class: EndpointClass, client: &str, now: u64) -> RateLimitDecision {
        let rule = self.rule(class);
        let key = format!("{}:{}", class, client);

        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(key).or_insert_with(|| Bucket {
            timestamps: Vec::new(),
            reset_time: now + rule.window_ms,
        });

        if bucket.reset_time <= now {
            bucket.timestamps.clear();
            bucket.reset_time = now + rule.window_ms;
        }

        bucket
            .timestamps
            .retain(|&ts| now.saturating_sub(ts) < rule.window_ms);

        let allowed = bucket.timestamps.len() < rule.max_requests as usize;
        if allowed {
            bucket.timestamps.push(now);
        }

        let remaining = (rule.max_requests as usize).saturating_sub(bucket.timestamps.len());
        let retry_after_secs = if allowed {
            None
        } else {
            Some(bucket.reset_time.saturating_sub(now).div_ceil(1000))
        };

        RateLimitDecision {
            allowed,
            limit: rule.max_requests,
            remaining: remaining as u32,
            reset_at_ms: bucket.reset_time,
            retry_after_secs,
        }
    }

    /// Drop every bucket whose reset time has passed. Returns how many were removed.
    pub fn sweep_at(&self, now: u64) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.reset_time > now);
        before - buckets.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Start the periodic sweep. Calling it while a sweep is running is a no-op.
    pub fn init(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if sweeper.is_some() {
            return;
        }

        let (stop, mut stopped) = watch::channel(false);
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let limiter = Arc::clone(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = limiter.sweep_at(now_ms());
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired rate limit buckets");
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
        });

        *sweeper = Some(Sweeper { stop, handle });
    }

    /// Stop the periodic sweep and wait for it to exit.
    pub async fn shutdown(&self) {
        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(sweeper) = sweeper {
            let _ = sweeper.stop.send(true);
            if let Err(e) = sweeper.handle.await {
                tracing::warn!(error = %e, "Rate limit sweep task ended abnormally");
            }
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn limiter_with(class: EndpointClass, rule: RateLimitRule) -> RateLimiter {
        let mut config = RateLimitConfig::default();
        config.rules.insert(class, rule);
        RateLimiter::new(config)
    }

    #[test]
    fn test_sliding_window_rejects_then_recovers() {
        let limiter = limiter_with(EndpointClass::Login, RateLimitRule::new(5, 1000));

        for i in 0..5 {
            let decision = limiter.check_at(EndpointClass::Login, "A", 0);
            assert!(decision.allowed, "request {i} should be allowed");
            assert_eq!(decision.remaining, 4 - i);
            assert_eq!(decision.retry_after_secs, None);
        }

        let rejected = limiter.check_at(EndpointClass::Login, "A", 0);
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.retry_after_secs, Some(1));

        let later = limiter.check_at(EndpointClass::Login, "A", 1001);
        assert!(later.allowed);
    }

    #[test]
    fn test_bucket_recreated_after_reset() {
        let limiter = limiter_with(EndpointClass::Api, RateLimitRule::new(2, 1000));

        assert!(limiter.check_at(EndpointClass::Api, "A", 0).allowed);
        assert!(limiter.check_at(EndpointClass::Api, "A", 600).allowed);
        assert!(!limiter.check_at(EndpointClass::Api, "A", 900).allowed);

        let fresh = limiter.check_at(EndpointClass::Api, "A", 1000);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 1);
        assert_eq!(fresh.reset_at_ms, 2000);
    }

    #[test]
    fn test_key_isolation() {
        let limiter = limiter_with(EndpointClass::Login, RateLimitRule::new(1, 60_000));

        assert!(limiter.check_at(EndpointClass::Login, "A", 0).allowed);
        assert!(!limiter.check_at(EndpointClass::Login, "A", 1).allowed);

        assert!(limiter.check_at(EndpointClass::Login, "B", 1).allowed);
        assert!(limiter.check_at(EndpointClass::Api, "A", 1).allowed);
        assert_eq!(limiter.bucket_count(), 3);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let limiter = limiter_with(EndpointClass::View, RateLimitRule::new(1, 60_000));
        limiter.check_at(EndpointClass::View, "A", 10_000);

        let decision = limiter.check_at(EndpointClass::View, "A", 10_500);
        assert!(!decision.allowed);
        assert_eq!(decision.reset_at_ms, 70_000);
        assert_eq!(decision.retry_after_secs, Some(60));
    }

    #[test]
    fn test_default_view_limit_is_ten_per_minute() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let allowed = (0..101)
            .map(|i| limiter.check_at(EndpointClass::View, "203.0.113.9", i))
            .take_while(|d| d.allowed)
            .count();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_sweep_drops_only_expired_buckets() {
        let limiter = limiter_with(EndpointClass::Api, RateLimitRule::new(10, 1000));
        limiter.check_at(EndpointClass::Api, "old", 0);
        limiter.check_at(EndpointClass::Api, "fresh", 5_000);

        assert_eq!(limiter.sweep_at(2_000), 1);
        assert_eq!(limiter.bucket_count(), 1);
        assert_eq!(limiter.sweep_at(2_000), 0);
    }

    #[test]
    fn test_endpoint_class_serde_names() {
        let json = serde_json::to_string(&EndpointClass::Upload).unwrap();
        assert_eq!(json, "\"upload\"");
        let class: EndpointClass = serde_json::from_str("\"view\"").unwrap();
        assert_eq!(class, EndpointClass::View);
        assert_eq!(EndpointClass::Public.to_string(), "public");
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_runs_until_shutdown() {
        let config = RateLimitConfig {
            sweep_interval_secs: 300,
            ..RateLimitConfig::default()
        };
        let limiter = Arc::new(RateLimiter::new(config));
        limiter.check_at(EndpointClass::Api, "abandoned", 0);
        limiter.init();
        limiter.init();

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(limiter.bucket_count(), 0);

        limiter.shutdown().await;
        limiter.check_at(EndpointClass::Api, "abandoned", 0);
        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_init_is_noop() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        limiter.shutdown().await;
        assert_eq!(limiter.bucket_count(), 0);
    }
}
