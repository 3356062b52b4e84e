//! Health classification, alert rules, and reports.
//!
//! [`MonitoringService`] reads only the [`MetricsLog`] aggregations and the
//! cache's own statistics. Alert evaluation is driven from outside (the
//! engine's background loop, or a direct call) so it can run on any schedule.

pub mod health;
pub mod report;
pub mod rules;

use std::collections::HashMap;
use std::sync::Arc;

use agrimedia_common::AlertId;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

pub use health::{ComponentHealth, HealthReport, HealthStatus};
pub use report::{Report, ReportFormat, ReportOptions};
pub use rules::{default_rules, Alert, AlertRule, Comparison, MetricKind, Severity};

use crate::cache::ImageCache;
use crate::clock::Clock;
use crate::metrics::{LogContext, LogLevel, MetricsLog};

/// Derives health, raises alerts, and assembles reports.
pub struct MonitoringService {
    metrics: Arc<MetricsLog>,
    cache: Option<Arc<ImageCache>>,
    clock: Arc<dyn Clock>,
    rules: Vec<AlertRule>,
    health_window: Duration,
    last_triggered: Mutex<HashMap<String, DateTime<Utc>>>,
    alerts: RwLock<Vec<Alert>>,
}

impl MonitoringService {
    /// An empty `rules` list selects [`default_rules`].
    pub fn new(
        metrics: Arc<MetricsLog>,
        cache: Option<Arc<ImageCache>>,
        rules: Vec<AlertRule>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rules = if rules.is_empty() {
            default_rules()
        } else {
            rules
        };
        Self {
            metrics,
            cache,
            clock,
            rules,
            health_window: Duration::minutes(15),
            last_triggered: Mutex::new(HashMap::new()),
            alerts: RwLock::new(Vec::new()),
        }
    }

    pub fn with_health_window(mut self, window: Duration) -> Self {
        self.health_window = window;
        self
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    // -- Health ---------------------------------------------------------------

    pub fn health(&self) -> HealthReport {
        let window = self.health_window;
        let cache_stats = self.cache.as_ref().map(|c| c.stats());

        let components = vec![
            health::check_providers(&self.metrics.provider_summary(window)),
            health::check_cache(&self.metrics.cache_summary(window), cache_stats.as_ref()),
            health::check_attribution(&self.metrics.error_summary(window)),
            health::check_logging(
                self.metrics.capacity(),
                &self.metrics.entries_within(window),
            ),
        ];

        HealthReport {
            status: health::overall(&components),
            checked_at: self.clock.now(),
            window_secs: window.num_seconds(),
            components,
            active_alerts: self.active_alerts().len(),
        }
    }

    // -- Alerts ---------------------------------------------------------------

    /// Current value of `metric` over `window`, or `None` when there is no
    /// data to judge (no lookups, no provider calls).
    pub fn metric_value(&self, metric: MetricKind, window: Duration) -> Option<f64> {
        match metric {
            MetricKind::CacheHitRate => {
                let cache = self.metrics.cache_summary(window);
                (cache.lookups() > 0).then_some(cache.hit_rate)
            }
            MetricKind::ProviderErrorRate => self
                .metrics
                .provider_summary(window)
                .values()
                .filter(|p| p.requests > 0)
                .map(|p| p.error_rate)
                .reduce(f64::max),
            MetricKind::AverageResponseTime => {
                let providers = self.metrics.provider_summary(window);
                let requests: usize = providers.values().map(|p| p.requests).sum();
                (requests > 0).then(|| {
                    providers
                        .values()
                        .map(|p| p.average_response_ms * p.requests as f64)
                        .sum::<f64>()
                        / requests as f64
                })
            }
            MetricKind::ErrorCount => Some(self.metrics.error_summary(window).total as f64),
            MetricKind::QuotaRemaining => self
                .metrics
                .provider_summary(window)
                .values()
                .filter_map(|p| p.quota_remaining)
                .min()
                .map(f64::from),
            MetricKind::OperationSuccessRate => {
                let perf = self.metrics.performance_summary(window);
                (perf.total_operations > 0).then_some(perf.success_rate)
            }
        }
    }

    /// Evaluate every rule once. Returns the alerts created by this pass.
    pub fn evaluate_rules(&self) -> Vec<Alert> {
        let now = self.clock.now();
        let mut created = Vec::new();

        for rule in &self.rules {
            let window = Duration::seconds(rule.window_secs as i64);
            let Some(value) = self.metric_value(rule.metric, window) else {
                continue;
            };
            if !rule.is_breached(value) {
                continue;
            }

            {
                let mut last = self.last_triggered.lock();
                if let Some(at) = last.get(&rule.id) {
                    if now - *at < Duration::seconds(rule.cooldown_secs as i64) {
                        debug!(rule = %rule.id, value, "Rule breached within cooldown");
                        continue;
                    }
                }
                last.insert(rule.id.clone(), now);
            }

            let alert = Alert {
                id: AlertId::new(),
                rule_id: rule.id.clone(),
                metric: rule.metric,
                severity: rule.severity,
                message: format!(
                    "{} is {value:.2} ({} {})",
                    rule.metric,
                    rule.operator.symbol(),
                    rule.threshold
                ),
                value,
                threshold: rule.threshold,
                timestamp: now,
                resolved: false,
                resolved_at: None,
            };

            match alert.severity {
                Severity::Critical => {
                    error!(rule = %rule.id, alert_id = %alert.id, "{}", alert.message)
                }
                _ => warn!(rule = %rule.id, alert_id = %alert.id, "{}", alert.message),
            }
            self.metrics.log(
                LogLevel::Warn,
                format!("Alert raised: {}", alert.message),
                LogContext::new("monitoring", "evaluate_rules"),
                [("rule".to_string(), serde_json::json!(rule.id))]
                    .into_iter()
                    .collect(),
                None,
            );

            self.alerts.write().push(alert.clone());
            created.push(alert);
        }

        created
    }

    /// Mark an alert resolved. Resolving twice is a no-op; returns `false`
    /// only for an unknown id.
    pub fn resolve(&self, id: AlertId) -> bool {
        let now = self.clock.now();
        let mut alerts = self.alerts.write();
        match alerts.iter_mut().find(|a| a.id == id) {
            Some(alert) => {
                if !alert.resolved {
                    alert.resolved = true;
                    alert.resolved_at = Some(now);
                    debug!(alert_id = %id, "Alert resolved");
                }
                true
            }
            None => false,
        }
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| !a.resolved)
            .cloned()
            .collect()
    }

    // -- Reports --------------------------------------------------------------

    pub fn build_report(&self, options: &ReportOptions) -> Report {
        let w = options.window;
        Report {
            generated_at: self.clock.now(),
            window_secs: w.num_seconds(),
            health: options.include_health.then(|| self.health()),
            performance: options
                .include_performance
                .then(|| self.metrics.performance_summary(w)),
            providers: options
                .include_providers
                .then(|| self.metrics.provider_summary(w)),
            cache: options.include_cache.then(|| self.metrics.cache_summary(w)),
            cache_stats: if options.include_cache {
                self.cache.as_ref().map(|c| c.stats())
            } else {
                None
            },
            errors: options.include_errors.then(|| self.metrics.error_summary(w)),
            alerts: options.include_alerts.then(|| self.alerts()),
        }
    }

    /// Build and render a report in `options.format`.
    pub fn report(&self, options: &ReportOptions) -> String {
        self.build_report(options).render(options.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BoundedCache, EvictionPolicy};
    use crate::clock::ManualClock;
    use crate::metrics::{CacheOutcome, ProviderCall};
    use agrimedia_common::{ErrorCode, MediaError};

    struct Fixture {
        clock: Arc<ManualClock>,
        metrics: Arc<MetricsLog>,
        monitoring: MonitoringService,
    }

    fn fixture(rules: Vec<AlertRule>) -> Fixture {
        let clock = Arc::new(ManualClock::default());
        let metrics = Arc::new(MetricsLog::new(100, clock.clone()));
        let cache: Arc<ImageCache> = Arc::new(BoundedCache::new(
            10,
            std::time::Duration::from_secs(60),
            EvictionPolicy::Lru,
            clock.clone(),
        ));
        let monitoring =
            MonitoringService::new(metrics.clone(), Some(cache), rules, clock.clone());
        Fixture {
            clock,
            metrics,
            monitoring,
        }
    }

    fn hit_rate_rule() -> AlertRule {
        AlertRule::new(
            "low-hit-rate",
            MetricKind::CacheHitRate,
            Comparison::Lt,
            0.3,
            Severity::Warning,
        )
        .window(600)
        .cooldown(1800)
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let f = fixture(vec![hit_rate_rule()]);
        for _ in 0..2 {
            f.metrics.record_cache_operation("k", CacheOutcome::Hit, None);
        }
        for _ in 0..8 {
            f.metrics.record_cache_operation("k", CacheOutcome::Miss, None);
        }

        let first = f.monitoring.evaluate_rules();
        assert_eq!(first.len(), 1);
        assert!((first[0].value - 0.2).abs() < 1e-9);

        f.clock.advance(Duration::minutes(5));
        assert!(f.monitoring.evaluate_rules().is_empty());
        assert_eq!(f.monitoring.alerts().len(), 1);

        f.clock.advance(Duration::minutes(26));
        for _ in 0..4 {
            f.metrics.record_cache_operation("k", CacheOutcome::Miss, None);
        }
        assert_eq!(f.monitoring.evaluate_rules().len(), 1);
        assert_eq!(f.monitoring.alerts().len(), 2);
    }

    #[test]
    fn no_data_raises_nothing() {
        let f = fixture(Vec::new());
        assert!(f.monitoring.evaluate_rules().is_empty());
        assert_eq!(f.monitoring.rules().len(), 4);
    }

    #[test]
    fn resolve_is_idempotent() {
        let f = fixture(vec![hit_rate_rule()]);
        f.metrics.record_cache_operation("k", CacheOutcome::Miss, None);
        let alert = f.monitoring.evaluate_rules().remove(0);
        assert_eq!(f.monitoring.active_alerts().len(), 1);

        assert!(f.monitoring.resolve(alert.id));
        let resolved_at = f.monitoring.alerts()[0].resolved_at;
        f.clock.advance(Duration::minutes(1));
        assert!(f.monitoring.resolve(alert.id));
        assert_eq!(f.monitoring.alerts()[0].resolved_at, resolved_at);
        assert!(f.monitoring.active_alerts().is_empty());
        assert!(!f.monitoring.resolve(AlertId::new()));
    }

    #[test]
    fn provider_metrics() {
        let f = fixture(Vec::new());
        f.metrics
            .record_provider_usage(ProviderCall::succeeded("unsplash", "search", 1000, 3).with_quota(8));
        f.metrics.record_provider_usage(ProviderCall::failed(
            "pexels",
            "search",
            3000,
            ErrorCode::ProviderUnavailable,
        ));

        let w = Duration::minutes(10);
        assert_eq!(f.monitoring.metric_value(MetricKind::ProviderErrorRate, w), Some(1.0));
        assert_eq!(
            f.monitoring.metric_value(MetricKind::AverageResponseTime, w),
            Some(2000.0)
        );
        assert_eq!(f.monitoring.metric_value(MetricKind::QuotaRemaining, w), Some(8.0));
        assert_eq!(f.monitoring.metric_value(MetricKind::OperationSuccessRate, w), None);

        let alerts = f.monitoring.evaluate_rules();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule_id, "provider-error-rate");
        assert_eq!(alerts[0].severity, Severity::Critical);

        let health = f.monitoring.health();
        assert_eq!(health.status, HealthStatus::Critical);
        assert_eq!(health.active_alerts, 1);
        assert_eq!(
            health.component("providers").map(|c| c.status),
            Some(HealthStatus::Critical)
        );
    }

    #[test]
    fn attribution_failures_degrade_health() {
        let f = fixture(Vec::new());
        f.metrics.record_error(
            "attribution",
            "get_theme_image",
            Some("unsplash"),
            &MediaError::validation("missing photographer"),
        );
        let health = f.monitoring.health();
        assert_eq!(
            health.component("attribution").map(|c| c.status),
            Some(HealthStatus::Degraded)
        );
        assert_eq!(health.status, HealthStatus::Degraded);
    }

    #[test]
    fn quiet_system_is_healthy() {
        let f = fixture(Vec::new());
        let health = f.monitoring.health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.components.len(), 4);
    }

    #[test]
    fn report_respects_options() {
        let f = fixture(Vec::new());
        let options = ReportOptions {
            include_health: false,
            include_alerts: false,
            ..ReportOptions::default()
        };
        let report = f.monitoring.build_report(&options);
        assert!(report.health.is_none());
        assert!(report.alerts.is_none());
        assert!(report.cache_stats.is_some());

        let csv = f
            .monitoring
            .report(&ReportOptions::default().with_format(ReportFormat::Csv));
        assert!(csv.starts_with("section,metric,value\nhealth,overall,healthy"));
    }
}
