//! Rate-limited, retrying execution of outbound provider calls.
//!
//! [`RateLimitedClient`] wraps a `reqwest::Client` with:
//! - a sliding one-hour quota window ([`QuotaWindow`]);
//! - short-term smoothing via a [`governor`] token bucket;
//! - a fixed per-call timeout enforced by cancelling the in-flight future;
//! - retry with exponential backoff and jitter, driven by
//!   [`MediaError::classify`].

pub mod backoff;
pub mod http;
pub mod quota;

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use agrimedia_common::MediaError;
use governor::{Quota, RateLimiter};
use tracing::{debug, warn};

pub use backoff::{BackoffPolicy, JitterSource, NoJitter, RandomJitter, SeededJitter};
pub use quota::{QuotaInfo, QuotaWindow, QuotaWindowRecord, QUOTA_WINDOW};

use crate::config::PerformanceConfig;

/// Longest single wait for quota before control returns to the caller.
pub const MAX_QUOTA_WAIT: Duration = Duration::from_secs(60);

/// Settings for one [`RateLimitedClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub hourly_limit: u32,
    pub requests_per_second: u32,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: BackoffPolicy,
}

impl ClientSettings {
    pub fn from_performance(perf: &PerformanceConfig, hourly_limit: u32, requests_per_second: u32) -> Self {
        Self {
            hourly_limit,
            requests_per_second,
            max_attempts: perf.max_attempts.max(1),
            timeout: Duration::from_secs(perf.timeout_secs),
            backoff: BackoffPolicy::new(
                Duration::from_millis(perf.base_delay_ms),
                Duration::from_millis(perf.max_delay_ms),
                Duration::from_millis(perf.max_jitter_ms),
            ),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            hourly_limit: 50,
            requests_per_second: 5,
            max_attempts: 3,
            timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Generic HTTP executor shared by the provider adapters.
pub struct RateLimitedClient {
    provider: &'static str,
    http: reqwest::Client,
    quota: QuotaWindow,
    limiter: governor::DefaultDirectRateLimiter,
    jitter: Arc<dyn JitterSource>,
    settings: ClientSettings,
}

impl RateLimitedClient {
    pub fn new(provider: &'static str, settings: ClientSettings) -> Self {
        Self::with_jitter(provider, settings, Arc::new(RandomJitter))
    }

    pub fn with_jitter(
        provider: &'static str,
        settings: ClientSettings,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(provider, error = %e, "Failed to build HTTP client with timeout");
                reqwest::Client::new()
            });

        let rps = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Self {
            provider,
            http,
            quota: QuotaWindow::new(settings.hourly_limit),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
            jitter,
            settings,
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn quota_window(&self) -> &QuotaWindow {
        &self.quota
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn can_proceed(&self) -> bool {
        self.quota.can_proceed()
    }

    pub fn record_usage(&self, count: u32) {
        self.quota.record_usage(count);
    }

    pub fn quota(&self) -> QuotaInfo {
        self.quota.info()
    }

    /// If blocked, sleep until the oldest record would leave the window
    /// (capped at [`MAX_QUOTA_WAIT`]) and return. The caller re-checks.
    pub async fn await_quota(&self) {
        if self.quota.can_proceed() {
            return;
        }

        let wait = self
            .quota
            .time_until_slot()
            .unwrap_or(MAX_QUOTA_WAIT)
            .min(MAX_QUOTA_WAIT);

        debug!(
            provider = self.provider,
            wait_ms = wait.as_millis() as u64,
            "Quota exhausted, waiting for window to roll"
        );
        tokio::time::sleep(wait).await;
    }

    /// Run `op` with quota gating, timeout, and retry.
    ///
    /// `op` is invoked once per attempt and must build a fresh request each
    /// time. Non-retryable errors and the final attempt's error are returned
    /// as-is; retryable ones wait `backoff + jitter` first.
    pub async fn execute_with_retry<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, MediaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, MediaError>>,
    {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            self.await_quota().await;
            if !self.quota.can_proceed() {
                let retry_after_secs = self.quota.time_until_slot().map(|d| d.as_secs());
                warn!(
                    provider = self.provider,
                    operation = label,
                    "Local quota still exhausted after waiting"
                );
                return Err(MediaError::QuotaExceeded {
                    provider: self.provider.to_string(),
                    retry_after_secs,
                });
            }

            self.limiter.until_ready().await;
            self.quota.record_usage(1);

            let outcome = match tokio::time::timeout(self.settings.timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(MediaError::Timeout {
                    provider: self.provider.to_string(),
                    after_ms: self.settings.timeout.as_millis() as u64,
                }),
            };

            let err = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            provider = self.provider,
                            operation = label,
                            attempt,
                            "Succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let class = err.classify();
            if !class.retryable || attempt >= max_attempts {
                warn!(
                    provider = self.provider,
                    operation = label,
                    attempt,
                    code = %class.code,
                    retryable = class.retryable,
                    error = %err,
                    "Provider call failed"
                );
                return Err(err);
            }

            let mut delay = self.settings.backoff.exponential(attempt);
            if let MediaError::QuotaExceeded {
                retry_after_secs: Some(secs),
                ..
            } = &err
            {
                delay = delay.max(Duration::from_secs(*secs).min(self.settings.backoff.max));
            }
            delay += self.jitter.jitter(self.settings.backoff.max_jitter);

            warn!(
                provider = self.provider,
                operation = label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                code = %class.code,
                error = %err,
                "Provider call failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
