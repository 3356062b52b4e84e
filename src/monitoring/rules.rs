//! Declarative alert rules and the alerts they raise.

use agrimedia_common::AlertId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Windowed metric an [`AlertRule`] watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Cache hits / lookups.
    CacheHitRate,
    /// Highest per-provider failure ratio.
    ProviderErrorRate,
    /// Mean provider call latency in milliseconds.
    AverageResponseTime,
    /// Errors recorded in the window.
    ErrorCount,
    /// Lowest quota reading reported by any provider.
    QuotaRemaining,
    /// Share of orchestration operations that succeeded.
    OperationSuccessRate,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CacheHitRate => "cache_hit_rate",
            Self::ProviderErrorRate => "provider_error_rate",
            Self::AverageResponseTime => "average_response_time",
            Self::ErrorCount => "error_count",
            Self::QuotaRemaining => "quota_remaining",
            Self::OperationSuccessRate => "operation_success_rate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
}

impl Comparison {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Lt => value < threshold,
            Self::Lte => value <= threshold,
            Self::Gt => value > threshold,
            Self::Gte => value >= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Eq => "==",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub metric: MetricKind,
    pub operator: Comparison,
    pub threshold: f64,
    /// Trailing window the metric is computed over.
    pub window_secs: u64,
    /// Minimum time between two alerts from this rule.
    pub cooldown_secs: u64,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        metric: MetricKind,
        operator: Comparison,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            metric,
            operator,
            threshold,
            window_secs: 600,
            cooldown_secs: 1800,
            severity,
            description: None,
        }
    }

    pub fn window(mut self, secs: u64) -> Self {
        self.window_secs = secs;
        self
    }

    pub fn cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_breached(&self, value: f64) -> bool {
        self.operator.holds(value, self.threshold)
    }
}

/// Rules used when the configuration supplies none.
pub fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "provider-error-rate",
            MetricKind::ProviderErrorRate,
            Comparison::Gt,
            0.5,
            Severity::Critical,
        )
        .describe("More than half of a provider's calls are failing"),
        AlertRule::new(
            "low-cache-hit-rate",
            MetricKind::CacheHitRate,
            Comparison::Lt,
            0.3,
            Severity::Warning,
        )
        .describe("Cache hit rate below 30%"),
        AlertRule::new(
            "slow-provider-responses",
            MetricKind::AverageResponseTime,
            Comparison::Gt,
            5000.0,
            Severity::Warning,
        )
        .describe("Providers average more than 5s per call"),
        AlertRule::new(
            "error-burst",
            MetricKind::ErrorCount,
            Comparison::Gt,
            50.0,
            Severity::Critical,
        )
        .window(3600)
        .cooldown(3600)
        .describe("More than 50 errors in the last hour"),
    ]
}

/// A raised alert. Only [`resolved`](Self::resolved) ever changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub rule_id: String,
    pub metric: MetricKind,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}
