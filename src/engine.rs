//! Composition root.
//!
//! [`MediaEngine`] builds every service from a [`Config`] and owns the
//! shared pieces (clock, metrics log, cache). Periodic work (the metrics and
//! cache cleanup sweep, alert evaluation) only runs once
//! [`MediaEngine::start_background`] is called, and stops when the returned
//! [`BackgroundTasks`] is shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{BoundedCache, ImageCache};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::matcher::{vocabulary, CategoryMatcher};
use crate::metrics::MetricsLog;
use crate::monitoring::MonitoringService;
use crate::providers::{ProviderRegistry, QueryEnricher, RandomTermSelector, TermSelector};
use crate::service::MediaService;

pub struct MediaEngine {
    config: Config,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsLog>,
    cache: Option<Arc<ImageCache>>,
    service: Arc<MediaService>,
    monitoring: Arc<MonitoringService>,
}

impl MediaEngine {
    /// Build an engine with the real providers and the system clock.
    pub fn from_config(config: Config) -> Self {
        let enricher = Arc::new(build_enricher(&config));
        let registry = ProviderRegistry::from_config(&config, enricher);
        Self::with_parts(config, registry, Arc::new(SystemClock))
    }

    /// Build an engine around an explicit registry and clock.
    pub fn with_parts(config: Config, registry: ProviderRegistry, clock: Arc<dyn Clock>) -> Self {
        let metrics = Arc::new(MetricsLog::from_config(&config.monitoring, clock.clone()));

        let cache = config.cache.enabled.then(|| {
            let cache: Arc<ImageCache> =
                Arc::new(BoundedCache::from_config(&config.cache, clock.clone()));
            cache.subscribe(metrics.clone());
            cache
        });

        let matcher = Arc::new(CategoryMatcher::new(config.categories.clone()));
        let service = Arc::new(MediaService::new(
            registry,
            matcher,
            cache.clone(),
            metrics.clone(),
            &config,
        ));

        let monitoring = Arc::new(
            MonitoringService::new(
                metrics.clone(),
                cache.clone(),
                config.monitoring.rules.clone(),
                clock.clone(),
            )
            .with_health_window(chrono::Duration::seconds(
                config.monitoring.health_window_secs as i64,
            )),
        );

        info!(
            providers = ?service.registry().names(),
            available = service.registry().available().len(),
            cache_enabled = cache.is_some(),
            "Media engine initialized"
        );

        Self {
            config,
            clock,
            metrics,
            cache,
            service,
            monitoring,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn service(&self) -> &Arc<MediaService> {
        &self.service
    }

    pub fn monitoring(&self) -> &Arc<MonitoringService> {
        &self.monitoring
    }

    pub fn metrics(&self) -> &Arc<MetricsLog> {
        &self.metrics
    }

    pub fn cache(&self) -> Option<&Arc<ImageCache>> {
        self.cache.as_ref()
    }

    /// Run one cleanup sweep: expired cache entries and metrics older than
    /// `monitoring.metrics_max_age_secs`. Returns `(cache, metrics)` removals.
    pub fn cleanup(&self) -> (usize, usize) {
        let expired = self.cache.as_ref().map_or(0, |c| c.cleanup_expired());
        let max_age = chrono::Duration::seconds(self.config.monitoring.metrics_max_age_secs as i64);
        let pruned = self.metrics.cleanup(max_age);
        (expired, pruned)
    }

    /// Spawn the cleanup sweep and the alert evaluation loop.
    pub fn start_background(&self) -> BackgroundTasks {
        let token = CancellationToken::new();
        let monitoring_config = &self.config.monitoring;

        let cleanup = {
            let token = token.clone();
            let cache = self.cache.clone();
            let metrics = self.metrics.clone();
            let max_age = chrono::Duration::seconds(monitoring_config.metrics_max_age_secs as i64);
            let period = Duration::from_secs(monitoring_config.cleanup_interval_secs.max(1));
            tokio::spawn(run_periodic("cleanup", period, token, move || {
                let expired = cache.as_ref().map_or(0, |c| c.cleanup_expired());
                let pruned = metrics.cleanup(max_age);
                if expired + pruned > 0 {
                    debug!(expired, pruned, "Cleanup sweep finished");
                }
            }))
        };

        let alerts = {
            let token = token.clone();
            let monitoring = self.monitoring.clone();
            let period = Duration::from_secs(monitoring_config.alert_interval_secs.max(1));
            tokio::spawn(run_periodic("alert evaluation", period, token, move || {
                let raised = monitoring.evaluate_rules();
                if !raised.is_empty() {
                    info!(raised = raised.len(), "Alert evaluation raised alerts");
                }
            }))
        };

        info!("Background tasks started");
        BackgroundTasks {
            token,
            handles: vec![cleanup, alerts],
        }
    }
}

/// Handles for the engine's periodic tasks.
pub struct BackgroundTasks {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }

    /// Cancel every task and wait for them to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }
        info!("Background tasks stopped");
    }
}

async fn run_periodic<F>(name: &'static str, period: Duration, token: CancellationToken, mut tick: F)
where
    F: FnMut() + Send + 'static,
{
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!(task = name, period_secs = period.as_secs(), "Periodic task started");

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                debug!(task = name, "Periodic task cancelled");
                break;
            }
            _ = interval.tick() => tick(),
        }
    }
}

/// Query enricher from `performance.enrich_queries`, the configured (or
/// built-in) enrichment table, and an optional fixed seed.
pub fn build_enricher(config: &Config) -> QueryEnricher {
    let table = if config.enrichment.is_empty() {
        vocabulary::default_enrichment()
    } else {
        config.enrichment.clone()
    };
    let selector: Box<dyn TermSelector> = match config.performance.enrichment_seed {
        Some(seed) => Box::new(RandomTermSelector::seeded(seed)),
        None => Box::new(RandomTermSelector::from_entropy()),
    };
    QueryEnricher::new(config.performance.enrich_queries, table, selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::metrics::CacheOutcome;
    use crate::monitoring::{AlertRule, Comparison, MetricKind, Severity};
    use agrimedia_common::Provenance;

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.monitoring.rules = vec![AlertRule::new(
            "low-hit-rate",
            MetricKind::CacheHitRate,
            Comparison::Lt,
            0.3,
            Severity::Warning,
        )];
        config
    }

    #[tokio::test]
    async fn default_engine_serves_fallbacks() {
        let engine = MediaEngine::from_config(Config::default());
        assert_eq!(engine.service().registry().len(), 2);
        assert!(engine.service().registry().available().is_empty());

        let image = engine.service().get_theme_image(None).await;
        assert_eq!(image.provenance, Provenance::Fallback);
        assert_eq!(engine.cache().map(|c| c.len()), Some(1));
    }

    #[tokio::test]
    async fn disabled_cache_is_not_built() {
        let mut config = Config::default();
        config.cache.enabled = false;
        let engine = MediaEngine::from_config(config);
        assert!(engine.cache().is_none());
        assert!(engine.service().clear_cache().is_err());
    }

    #[test]
    fn cache_evictions_reach_metrics() {
        let mut config = Config::default();
        config.cache.max_size = 1;
        let clock = Arc::new(ManualClock::default());
        let engine = MediaEngine::with_parts(config, ProviderRegistry::new(), clock);

        let cache = engine.cache().unwrap();
        cache.set("a", Vec::new()).unwrap();
        cache.set("b", Vec::new()).unwrap();
        let summary = engine.metrics().cache_summary(chrono::Duration::minutes(1));
        assert_eq!(summary.evictions, 1);
    }

    #[test]
    fn cleanup_sweeps_cache_and_metrics() {
        let clock = Arc::new(ManualClock::default());
        let engine = MediaEngine::with_parts(Config::default(), ProviderRegistry::new(), clock.clone());
        let cache = engine.cache().unwrap();
        cache
            .set_with_ttl("short", Vec::new(), Duration::from_secs(1))
            .unwrap();
        engine
            .metrics()
            .record_cache_operation("short", CacheOutcome::Write, None);

        clock.advance(chrono::Duration::days(2));
        let (expired, pruned) = engine.cleanup();
        assert_eq!(expired, 1);
        assert!(pruned >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_loop_evaluates_alerts_until_shutdown() {
        let clock = Arc::new(ManualClock::default());
        let engine = MediaEngine::with_parts(quiet_config(), ProviderRegistry::new(), clock);
        for _ in 0..5 {
            engine
                .metrics()
                .record_cache_operation("k", CacheOutcome::Miss, None);
        }

        let tasks = engine.start_background();
        assert!(tasks.is_running());
        assert!(engine.monitoring().alerts().is_empty());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(engine.monitoring().alerts().len(), 1);

        tasks.shutdown().await;

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(engine.monitoring().alerts().len(), 1);
    }

    #[test]
    fn seeded_enricher_is_repeatable() {
        let mut config = Config::default();
        config.performance.enrichment_seed = Some(42);
        let a = build_enricher(&config).enrich("cattle", Some("livestock"));
        let b = build_enricher(&config).enrich("cattle", Some("livestock"));
        assert_eq!(a, b);
        assert!(a.starts_with("cattle "));

        config.performance.enrich_queries = false;
        assert_eq!(build_enricher(&config).enrich("cattle", Some("livestock")), "cattle");
    }
}
