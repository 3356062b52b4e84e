//! Per-component health classification.
//!
//! Each check turns a window of metrics into a [`ComponentHealth`]; the
//! overall status is the worst component status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cache::CacheStats;
use crate::metrics::{CacheSummary, ErrorSummary, LogEntry, LogLevel, ProviderSummary};

pub const PROVIDER_CRITICAL_ERROR_RATE: f64 = 0.5;
pub const PROVIDER_DEGRADED_ERROR_RATE: f64 = 0.2;
pub const LOW_QUOTA: u32 = 10;
pub const CACHE_MIN_HIT_RATE: f64 = 0.3;
/// Hit rate is only judged past this many lookups.
pub const CACHE_MIN_LOOKUPS: usize = 10;
pub const ATTRIBUTION_CRITICAL_FAILURES: usize = 10;
pub const LOG_DEGRADED_ERROR_SHARE: f64 = 0.2;
pub const LOG_CRITICAL_ERROR_SHARE: f64 = 0.5;
const LOG_MIN_ENTRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl ComponentHealth {
    fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    fn detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub window_secs: i64,
    pub components: Vec<ComponentHealth>,
    pub active_alerts: usize,
}

impl HealthReport {
    pub fn component(&self, name: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.name == name)
    }
}

pub fn overall(components: &[ComponentHealth]) -> HealthStatus {
    components
        .iter()
        .map(|c| c.status)
        .max()
        .unwrap_or(HealthStatus::Healthy)
}

pub fn check_providers(providers: &BTreeMap<String, ProviderSummary>) -> ComponentHealth {
    let mut status = HealthStatus::Healthy;
    let mut problems = Vec::new();

    for (name, s) in providers {
        let provider_status = if s.error_rate > PROVIDER_CRITICAL_ERROR_RATE {
            HealthStatus::Critical
        } else if s.error_rate > PROVIDER_DEGRADED_ERROR_RATE {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        if provider_status > HealthStatus::Healthy {
            problems.push(format!("{name} error rate {:.0}%", s.error_rate * 100.0));
        }

        let quota_status = match s.quota_remaining {
            Some(q) if q < LOW_QUOTA => {
                problems.push(format!("{name} quota low ({q} left)"));
                HealthStatus::Degraded
            }
            _ => HealthStatus::Healthy,
        };

        status = status.max(provider_status).max(quota_status);
    }

    let message = if providers.is_empty() {
        "No provider traffic in window".to_string()
    } else if problems.is_empty() {
        format!("{} provider(s) responding normally", providers.len())
    } else {
        problems.join("; ")
    };

    let details = providers
        .iter()
        .map(|(name, s)| {
            (
                name.clone(),
                json!({
                    "requests": s.requests,
                    "error_rate": s.error_rate,
                    "average_response_ms": s.average_response_ms,
                    "quota_remaining": s.quota_remaining,
                }),
            )
        })
        .collect();

    ComponentHealth {
        name: "providers".into(),
        status,
        message,
        details,
    }
}

pub fn check_cache(summary: &CacheSummary, stats: Option<&CacheStats>) -> ComponentHealth {
    let Some(stats) = stats else {
        return ComponentHealth::new("cache", HealthStatus::Healthy, "Caching disabled");
    };

    let lookups = summary.lookups();
    let status = if lookups > CACHE_MIN_LOOKUPS && summary.hit_rate < CACHE_MIN_HIT_RATE {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    let message = match status {
        HealthStatus::Healthy => format!("{} of {} entries in use", stats.size, stats.max_size),
        _ => format!(
            "Hit rate {:.0}% over {lookups} lookups",
            summary.hit_rate * 100.0
        ),
    };

    ComponentHealth::new("cache", status, message)
        .detail("window_hit_rate", json!(summary.hit_rate))
        .detail("window_lookups", json!(lookups))
        .detail("size", json!(stats.size))
        .detail("utilization_pct", json!(stats.utilization_pct))
        .detail("evictions", json!(stats.evictions))
}

/// Attribution failures are provider results rejected for missing credit.
pub fn check_attribution(errors: &ErrorSummary) -> ComponentHealth {
    let failures = errors.for_component("attribution");
    let status = if failures >= ATTRIBUTION_CRITICAL_FAILURES {
        HealthStatus::Critical
    } else if failures > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };
    let message = if failures == 0 {
        "All served images carry valid attribution".to_string()
    } else {
        format!("{failures} result(s) rejected for missing attribution")
    };
    ComponentHealth::new("attribution", status, message).detail("failures", json!(failures))
}

pub fn check_logging(capacity: usize, entries: &[LogEntry]) -> ComponentHealth {
    if capacity == 0 {
        return ComponentHealth::new(
            "logging",
            HealthStatus::Degraded,
            "Structured log buffer disabled",
        );
    }

    let errors = entries.iter().filter(|e| e.level == LogLevel::Error).count();
    let share = if entries.is_empty() {
        0.0
    } else {
        errors as f64 / entries.len() as f64
    };

    let status = if entries.len() < LOG_MIN_ENTRIES {
        HealthStatus::Healthy
    } else if share > LOG_CRITICAL_ERROR_SHARE {
        HealthStatus::Critical
    } else if share > LOG_DEGRADED_ERROR_SHARE {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    ComponentHealth::new(
        "logging",
        status,
        format!("{errors} error entries of {} in window", entries.len()),
    )
    .detail("capacity", json!(capacity))
    .detail("error_share", json!(share))
}
