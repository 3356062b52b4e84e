use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::cache::EvictionPolicy;
use crate::matcher::CategoryMapping;
use crate::monitoring::AlertRule;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Category mapping table. Empty means "use the built-in table".
    #[serde(default)]
    pub categories: Vec<CategoryMapping>,

    /// Per-category terms appended to provider queries to bias results.
    /// Empty means "use the built-in lists".
    #[serde(default)]
    pub enrichment: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub fallbacks: FallbackConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub unsplash: ProviderConfig,

    #[serde(default)]
    pub pexels: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Static API secret sent in the provider's auth header.
    #[serde(default)]
    pub api_key: String,

    /// Override the provider's API root (used by tests and proxies).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Requests allowed per trailing hour. Falls back to the provider's
    /// published default.
    #[serde(default)]
    pub hourly_limit: Option<u32>,

    /// Short-term smoothing applied on top of the hourly window.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Lower is tried first. Falls back to unsplash=1, pexels=2.
    #[serde(default)]
    pub priority: Option<u32>,
}

fn default_requests_per_second() -> u32 {
    5
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            base_url: None,
            hourly_limit: None,
            requests_per_second: default_requests_per_second(),
            priority: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    /// TTL for cached static fallbacks, kept short so a recovered provider
    /// is picked up quickly.
    #[serde(default = "default_fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,

    #[serde(default)]
    pub eviction_policy: EvictionPolicy,
}

fn default_true() -> bool {
    true
}

fn default_cache_max_size() -> usize {
    100
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_fallback_ttl_secs() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: default_cache_max_size(),
            default_ttl_secs: default_ttl_secs(),
            fallback_ttl_secs: default_fallback_ttl_secs(),
            eviction_policy: EvictionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Asset served for theme (hero) requests.
    #[serde(default = "default_theme_asset")]
    pub theme: String,

    /// Asset served for category grid requests.
    #[serde(default = "default_category_asset")]
    pub category: String,

    /// Asset served for page section backgrounds.
    #[serde(default = "default_section_asset")]
    pub section: String,

    /// Per-key overrides, keyed `"<kind>:<key>"` (e.g. `"section:about"`).
    #[serde(default)]
    pub overrides: HashMap<String, String>,

    #[serde(default = "default_fallback_width")]
    pub width: u32,

    #[serde(default = "default_fallback_height")]
    pub height: u32,
}

fn default_theme_asset() -> String {
    "/images/fallback/hero.jpg".to_string()
}

fn default_category_asset() -> String {
    "/images/fallback/category.jpg".to_string()
}

fn default_section_asset() -> String {
    "/images/fallback/section.jpg".to_string()
}

fn default_fallback_width() -> u32 {
    1920
}

fn default_fallback_height() -> u32 {
    1080
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            theme: default_theme_asset(),
            category: default_category_asset(),
            section: default_section_asset(),
            overrides: HashMap::new(),
            width: default_fallback_width(),
            height: default_fallback_height(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PerformanceConfig {
    /// Per outbound call timeout (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per provider call, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff; 0 disables it.
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,

    /// Provider calls allowed in flight at once across the service.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Append a category enrichment term to provider queries.
    #[serde(default = "default_true")]
    pub enrich_queries: bool,

    /// Seed for enrichment term selection; unset means entropy-seeded.
    #[serde(default)]
    pub enrichment_seed: Option<u64>,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
            max_concurrency: default_max_concurrency(),
            enrich_queries: true,
            enrichment_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,

    /// Metrics older than this are pruned by the cleanup sweep.
    #[serde(default = "default_metrics_max_age")]
    pub metrics_max_age_secs: u64,

    /// Capacity of the structured log ring buffer.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,

    /// Trailing window `health()` looks at.
    #[serde(default = "default_health_window")]
    pub health_window_secs: u64,

    /// Alert rules. Empty means "use the built-in rules".
    #[serde(default)]
    pub rules: Vec<AlertRule>,
}

fn default_alert_interval() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    600
}

fn default_metrics_max_age() -> u64 {
    86_400
}

fn default_log_capacity() -> usize {
    1000
}

fn default_health_window() -> u64 {
    900
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            alert_interval_secs: default_alert_interval(),
            cleanup_interval_secs: default_cleanup_interval(),
            metrics_max_age_secs: default_metrics_max_age(),
            log_capacity: default_log_capacity(),
            health_window_secs: default_health_window(),
            rules: Vec::new(),
        }
    }
}
