//! Request orchestration: cache, then providers, then static fallback.
//!
//! Every public request method on [`MediaService`] follows the same path:
//!
//! 1. derive a cache key from the [`MediaRequest`] and try the cache;
//! 2. on a miss, try available providers strictly in priority order, one
//!    query tier at a time, keeping only on-topic, on-theme, ranked results
//!    with valid attribution;
//! 3. if nothing usable came back, synthesize descriptors from the
//!    configured fallback assets;
//! 4. write the result back to the cache and record metrics.
//!
//! Request methods never fail. [`MediaService::clear_cache`] is the only
//! operation that surfaces an error.

pub mod fallback;
pub mod request;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agrimedia_common::{ImageDescriptor, MediaError, Provenance};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub use fallback::FallbackCatalog;
pub use request::{MediaRequest, RequestKind};

use crate::cache::{CacheStats, ImageCache};
use crate::config::Config;
use crate::matcher::CategoryMatcher;
use crate::metrics::{CacheOutcome, MetricsLog, ProviderCall};
use crate::providers::{ImageProvider, ProviderImage, ProviderRegistry};

/// Terms from one tier joined into a single provider query.
const TERMS_PER_QUERY: usize = 2;

/// Outcome of a [`MediaService::preload`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadSummary {
    pub requested: usize,
    /// Requests served by the cache or a provider.
    pub warmed: usize,
    /// Requests that fell back to static assets.
    pub fallbacks: usize,
}

/// Coordinates the cache, providers, matcher, and fallback catalog.
pub struct MediaService {
    registry: ProviderRegistry,
    matcher: Arc<CategoryMatcher>,
    cache: Option<Arc<ImageCache>>,
    metrics: Arc<MetricsLog>,
    fallbacks: FallbackCatalog,
    fallback_ttl: Duration,
    limiter: Arc<Semaphore>,
    max_concurrency: usize,
}

impl MediaService {
    /// Create a service. `cache` is `None` when caching is disabled.
    pub fn new(
        registry: ProviderRegistry,
        matcher: Arc<CategoryMatcher>,
        cache: Option<Arc<ImageCache>>,
        metrics: Arc<MetricsLog>,
        config: &Config,
    ) -> Self {
        let max_concurrency = config.performance.max_concurrency.max(1);
        Self {
            registry,
            matcher,
            cache,
            metrics,
            fallbacks: FallbackCatalog::new(config.fallbacks.clone()),
            fallback_ttl: Duration::from_secs(config.cache.fallback_ttl_secs.max(1)),
            limiter: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|c| c.stats())
    }

    // -- Public request methods -----------------------------------------------

    /// Hero image for `theme` (or the default theme).
    pub async fn get_theme_image(&self, theme: Option<&str>) -> ImageDescriptor {
        self.fetch_one(MediaRequest::theme(theme)).await
    }

    /// `count` images (clamped to 1..=50) for a marketplace category.
    pub async fn get_category_images(&self, category: &str, count: usize) -> Vec<ImageDescriptor> {
        self.fetch(&MediaRequest::category(category, count)).await
    }

    /// Background image for a page section.
    pub async fn get_section_image(&self, section: &str) -> ImageDescriptor {
        self.fetch_one(MediaRequest::section(section)).await
    }

    /// Resolve every request, at most `max_concurrency` at a time. Never
    /// fails; individual outcomes are counted in the summary.
    pub async fn preload(&self, requests: Vec<MediaRequest>) -> PreloadSummary {
        let requested = requests.len();
        info!(requested, concurrency = self.max_concurrency, "Preloading media");

        let outcomes: Vec<bool> = stream::iter(requests)
            .map(|request| async move {
                let images = self.fetch(&request).await;
                images.iter().any(|d| !d.is_fallback())
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let warmed = outcomes.iter().filter(|served| **served).count();
        let summary = PreloadSummary {
            requested,
            warmed,
            fallbacks: requested - warmed,
        };
        info!(
            warmed = summary.warmed,
            fallbacks = summary.fallbacks,
            "Preload finished"
        );
        summary
    }

    /// Drop every cached entry. Fails only when caching is disabled.
    pub fn clear_cache(&self) -> Result<usize, MediaError> {
        let Some(cache) = &self.cache else {
            let err = MediaError::cache("caching is disabled");
            self.metrics.record_error("cache", "clear_cache", None, &err);
            return Err(err);
        };
        let removed = cache.clear();
        info!(removed, "Cleared media cache");
        Ok(removed)
    }

    // -- Orchestration ----------------------------------------------------------

    async fn fetch_one(&self, request: MediaRequest) -> ImageDescriptor {
        self.fetch(&request)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| self.fallbacks.descriptor(&request, self.metrics.clock().now()))
    }

    /// Resolve `request` to a non-empty list of descriptors.
    pub async fn fetch(&self, request: &MediaRequest) -> Vec<ImageDescriptor> {
        let operation = request.kind().operation();
        let op_id = self.metrics.start_operation("service", operation);
        let key = request.cache_key();

        if let Some(images) = self.lookup_cache(&key) {
            self.metrics.end_operation_with(
                op_id,
                true,
                outcome_metadata(&key, "hit", images.first().map(|d| d.provenance)),
            );
            return images;
        }

        let (images, ttl) = match self.fetch_from_providers(request).await {
            Some(images) => (images, None),
            None => {
                debug!(key = %key, "No provider produced a usable image, using fallback");
                (self.fallback_images(request), Some(self.fallback_ttl))
            }
        };

        self.store(&key, &images, ttl);

        let provenance = images.first().map(|d| d.provenance);
        let served = provenance.is_some_and(|p| p != Provenance::Fallback);
        self.metrics
            .end_operation_with(op_id, served, outcome_metadata(&key, "miss", provenance));
        images
    }

    fn lookup_cache(&self, key: &str) -> Option<Vec<ImageDescriptor>> {
        let cache = self.cache.as_ref()?;
        match cache.get(key) {
            Some(images) if !images.is_empty() => {
                let provenance = images.first().map(|d| d.provenance);
                self.metrics
                    .record_cache_operation(key, CacheOutcome::Hit, provenance);
                Some(images)
            }
            _ => {
                self.metrics.record_cache_operation(key, CacheOutcome::Miss, None);
                None
            }
        }
    }

    fn store(&self, key: &str, images: &[ImageDescriptor], ttl: Option<Duration>) {
        let Some(cache) = &self.cache else {
            return;
        };
        let result = match ttl {
            Some(ttl) => cache.set_with_ttl(key, images.to_vec(), ttl),
            None => cache.set(key, images.to_vec()),
        };
        match result {
            Ok(()) => {
                let provenance = images.first().map(|d| d.provenance);
                self.metrics
                    .record_cache_operation(key, CacheOutcome::Write, provenance);
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to cache media, continuing");
                self.metrics.record_error("cache", "store", None, &e);
            }
        }
    }

    fn fallback_images(&self, request: &MediaRequest) -> Vec<ImageDescriptor> {
        self.fallbacks
            .descriptors(request, self.metrics.clock().now())
    }

    /// First provider (in priority order) yielding usable descriptors wins.
    async fn fetch_from_providers(&self, request: &MediaRequest) -> Option<Vec<ImageDescriptor>> {
        let providers = self.registry.available();
        if providers.is_empty() {
            debug!(request = %request.cache_key(), "No providers available");
            return None;
        }

        let tiers = request.query_tiers(self.matcher.tiered_fallback_terms(request.topic()));

        for provider in providers {
            match self.try_provider(provider.as_ref(), request, &tiers).await {
                Ok(Some(images)) => return Some(images),
                Ok(None) => {
                    debug!(
                        provider = provider.name(),
                        request = %request.cache_key(),
                        "Provider returned nothing usable"
                    );
                }
                Err(e) => {
                    let class = e.classify();
                    warn!(
                        provider = provider.name(),
                        request = %request.cache_key(),
                        code = %class.code,
                        error = %e,
                        "Provider failed, trying next"
                    );
                }
            }
        }

        None
    }

    /// Walk the query tiers against one provider. An error ends this
    /// provider's turn; an empty tier moves on to the next one.
    async fn try_provider(
        &self,
        provider: &dyn ImageProvider,
        request: &MediaRequest,
        tiers: &[Vec<String>],
    ) -> Result<Option<Vec<ImageDescriptor>>, MediaError> {
        let options = request.search_options();
        let operation = request.kind().operation();

        for tier in tiers {
            let terms = &tier[..tier.len().min(TERMS_PER_QUERY)];
            if terms.is_empty() {
                continue;
            }
            let query = terms.join(" ");

            let started = Instant::now();
            let result = {
                let _permit = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|_| MediaError::configuration("provider call limiter closed"))?;
                provider.search(&query, &options).await
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let quota = provider.quota().remaining;

            let raw = match result {
                Ok(raw) => raw,
                Err(e) => {
                    self.metrics.record_provider_usage(
                        ProviderCall::failed(provider.name(), "search", elapsed_ms, e.classify().code)
                            .with_quota(quota),
                    );
                    self.metrics
                        .record_error("service", operation, Some(provider.name()), &e);
                    return Err(e);
                }
            };

            let received = raw.len();
            let images = self.usable_images(provider, request, raw);
            self.metrics.record_provider_usage(
                ProviderCall::succeeded(provider.name(), "search", elapsed_ms, images.len())
                    .with_quota(quota),
            );
            debug!(
                provider = provider.name(),
                query = %query,
                received,
                usable = images.len(),
                "Provider search finished"
            );

            if !images.is_empty() {
                return Ok(Some(images));
            }
        }

        Ok(None)
    }

    /// Filter, rank, and convert raw results. Results without a credited
    /// photographer are dropped and recorded as attribution failures.
    fn usable_images(
        &self,
        provider: &dyn ImageProvider,
        request: &MediaRequest,
        raw: Vec<ProviderImage>,
    ) -> Vec<ImageDescriptor> {
        let on_theme: Vec<ProviderImage> = raw
            .into_iter()
            .filter(|r| provider.is_on_topic(r) && self.matcher.is_on_theme(r))
            .collect();
        let ranked = self.matcher.filter_and_rank(on_theme, request.topic());

        let now = self.metrics.clock().now();
        let size = request.search_options().size;
        let mut images = Vec::with_capacity(request.count());
        for result in ranked {
            if images.len() == request.count() {
                break;
            }
            match result.to_descriptor(size, now) {
                Ok(descriptor) => images.push(descriptor),
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        image_id = %result.id,
                        "Dropping result without attribution"
                    );
                    self.metrics.record_error(
                        "attribution",
                        request.kind().operation(),
                        Some(provider.name()),
                        &e,
                    );
                }
            }
        }
        images
    }
}

fn outcome_metadata(
    key: &str,
    cache: &str,
    provenance: Option<Provenance>,
) -> BTreeMap<String, serde_json::Value> {
    let mut metadata = BTreeMap::new();
    metadata.insert("key".to_string(), json!(key));
    metadata.insert("cache".to_string(), json!(cache));
    if let Some(p) = provenance {
        metadata.insert("provenance".to_string(), json!(p));
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BoundedCache, EvictionPolicy};
    use crate::clock::ManualClock;
    use crate::providers::test_support::{image_with, StubProvider};
    use assert_matches::assert_matches;

    struct Harness {
        service: MediaService,
        metrics: Arc<MetricsLog>,
        cache: Arc<ImageCache>,
        clock: Arc<ManualClock>,
    }

    fn harness(providers: Vec<(Arc<StubProvider>, u32)>) -> Harness {
        let clock = Arc::new(ManualClock::default());
        let metrics = Arc::new(MetricsLog::new(100, clock.clone()));
        let cache: Arc<ImageCache> = Arc::new(BoundedCache::new(
            10,
            Duration::from_secs(3600),
            EvictionPolicy::Lru,
            clock.clone(),
        ));
        let mut registry = ProviderRegistry::new();
        for (provider, priority) in providers {
            registry.register(provider, priority);
        }
        let service = MediaService::new(
            registry,
            Arc::new(CategoryMatcher::default()),
            Some(cache.clone()),
            metrics.clone(),
            &Config::default(),
        );
        Harness {
            service,
            metrics,
            cache,
            clock,
        }
    }

    fn cattle() -> Vec<ProviderImage> {
        vec![
            image_with("c1", "cattle grazing on a farm pasture", &["cow"]),
            image_with("c2", "sheep in a field", &["farm"]),
            image_with("zoo", "lion at the zoo", &["wild"]),
        ]
    }

    #[tokio::test]
    async fn no_providers_means_fallback() {
        let h = harness(Vec::new());
        let theme = h.service.get_theme_image(None).await;
        assert_eq!(theme.provenance, Provenance::Fallback);
        assert_eq!(theme.url, "/images/fallback/hero.jpg");
        assert!(!theme.attribution.required);

        let grid = h.service.get_category_images("livestock", 4).await;
        assert_eq!(grid.len(), 4);
        assert!(grid.iter().all(|d| d.is_fallback()));

        let section = h.service.get_section_image("about").await;
        assert_eq!(section.provenance, Provenance::Fallback);
    }

    #[tokio::test]
    async fn first_provider_with_results_wins() {
        let first = Arc::new(StubProvider::new("first").with_results(cattle()));
        let second = Arc::new(
            StubProvider::new("second")
                .with_provenance(Provenance::Pexels)
                .with_results(cattle()),
        );
        let h = harness(vec![(second.clone(), 2), (first.clone(), 1)]);

        let images = h.service.get_category_images("livestock", 2).await;
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].id, "unsplash-c1");
        assert!(images.iter().all(|d| d.provenance == Provenance::Unsplash));
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
        assert_eq!(first.queries.lock()[0], "cattle cow");
    }

    #[tokio::test]
    async fn failing_provider_falls_through_to_next() {
        let broken = Arc::new(StubProvider::new("broken").failing(MediaError::AuthenticationFailed {
            provider: "broken".into(),
            status: 401,
        }));
        let backup = Arc::new(
            StubProvider::new("backup")
                .with_provenance(Provenance::Pexels)
                .with_results(cattle()),
        );
        let h = harness(vec![(broken.clone(), 1), (backup.clone(), 2)]);

        let image = h.service.get_section_image("pasture").await;
        assert_eq!(image.provenance, Provenance::Pexels);
        assert_eq!(broken.call_count(), 1);

        let errors = h.metrics.error_summary(chrono::Duration::minutes(5));
        assert_eq!(errors.by_code["authentication_failed"], 1);
        let providers = h.metrics.provider_summary(chrono::Duration::minutes(5));
        assert_eq!(providers["broken"].failures, 1);
        assert_eq!(providers["backup"].successes, 1);
    }

    #[tokio::test]
    async fn empty_tiers_advance_to_next_tier() {
        let provider = Arc::new(StubProvider::new("only"));
        let h = harness(vec![(provider.clone(), 1)]);

        let image = h.service.get_category_images("livestock", 1).await;
        assert!(image[0].is_fallback());
        let queries = provider.queries.lock().clone();
        assert_eq!(queries, vec!["cattle cow", "ranch pasture", "farm agriculture"]);
    }

    #[tokio::test]
    async fn off_theme_results_are_never_served() {
        let provider = Arc::new(StubProvider::new("noisy").with_results(vec![
            image_with("z", "zebra at the zoo", &["wild"]),
            image_with("u", "urban farm rooftop", &["city"]),
        ]));
        let h = harness(vec![(provider, 1)]);
        assert!(h.service.get_theme_image(Some("spring")).await.is_fallback());
    }

    #[tokio::test]
    async fn unattributed_results_are_dropped_and_recorded() {
        let mut anonymous = image_with("anon", "cattle on a farm", &[]);
        anonymous.photographer = String::new();
        let provider =
            Arc::new(StubProvider::new("anon").with_results(vec![anonymous, cattle().remove(0)]));
        let h = harness(vec![(provider, 1)]);

        let images = h.service.get_category_images("livestock", 2).await;
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].id, "unsplash-c1");
        assert!(images[0].attribution.required);

        let errors = h.metrics.error_summary(chrono::Duration::minutes(5));
        assert_eq!(errors.for_component("attribution"), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_providers_and_keeps_provenance() {
        let provider = Arc::new(StubProvider::new("p").with_results(cattle()));
        let h = harness(vec![(provider.clone(), 1)]);

        let first = h.service.get_theme_image(Some("cattle")).await;
        let second = h.service.get_theme_image(Some("Cattle ")).await;
        assert_eq!(first, second);
        assert_eq!(second.provenance, Provenance::Unsplash);
        assert_eq!(provider.call_count(), 1);

        let cache = h.metrics.cache_summary(chrono::Duration::minutes(5));
        assert_eq!(cache.hits, 1);
        assert_eq!(cache.misses, 1);
        assert_eq!(cache.writes, 1);
        assert!(h.cache.contains("theme:cattle"));
    }

    #[tokio::test]
    async fn fallbacks_use_short_ttl() {
        let h = harness(Vec::new());
        h.service.get_section_image("contact").await;

        let entry = h.cache.entry("section:contact").unwrap();
        assert_eq!(
            entry.expires_at - entry.cached_at,
            chrono::Duration::seconds(300)
        );

        h.clock.advance(chrono::Duration::seconds(301));
        assert!(h.cache.get("section:contact").is_none());
    }

    #[tokio::test]
    async fn operations_are_timed() {
        let h = harness(Vec::new());
        h.service.get_theme_image(None).await;
        let perf = h.metrics.performance_summary(chrono::Duration::minutes(5));
        assert_eq!(perf.by_operation["get_theme_image"].count, 1);
        // Served from fallback, so not counted as a success.
        assert_eq!(perf.successful, 0);
    }

    #[tokio::test]
    async fn preload_warms_cache() {
        let provider = Arc::new(StubProvider::new("p").with_results(cattle()));
        let h = harness(vec![(provider, 1)]);

        let summary = h
            .service
            .preload(vec![
                MediaRequest::category("livestock", 2),
                MediaRequest::theme(Some("pasture")),
                MediaRequest::section("about"),
            ])
            .await;
        assert_eq!(summary.requested, 3);
        assert_eq!(summary.warmed + summary.fallbacks, 3);
        assert!(h.cache.contains("category:livestock:2"));
        assert!(h.cache.contains("theme:pasture"));
        assert!(h.cache.contains("section:about"));
    }

    #[tokio::test]
    async fn clear_cache_requires_a_cache() {
        let h = harness(Vec::new());
        h.service.get_theme_image(None).await;
        assert_eq!(h.service.clear_cache().unwrap(), 1);
        assert!(h.cache.is_empty());

        let clock = Arc::new(ManualClock::default());
        let metrics = Arc::new(MetricsLog::new(10, clock));
        let uncached = MediaService::new(
            ProviderRegistry::new(),
            Arc::new(CategoryMatcher::default()),
            None,
            metrics.clone(),
            &Config::default(),
        );
        assert_matches!(uncached.clear_cache(), Err(MediaError::Cache(_)));
        assert_eq!(
            metrics.error_summary(chrono::Duration::minutes(1)).by_code["cache_error"],
            1
        );
        // Requests still resolve without a cache.
        assert!(uncached.get_theme_image(None).await.is_fallback());
    }

    #[tokio::test]
    async fn quota_is_reported_with_usage() {
        let provider = Arc::new(StubProvider::new("p").with_results(cattle()));
        let h = harness(vec![(provider, 1)]);
        h.service.get_category_images("livestock", 1).await;
        let providers = h.metrics.provider_summary(chrono::Duration::minutes(5));
        assert_eq!(providers["p"].quota_remaining, Some(50));
        assert_eq!(providers["p"].error_rate, 0.0);
    }
}
