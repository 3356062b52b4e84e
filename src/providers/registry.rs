//! Priority-ordered collection of [`ImageProvider`] implementations.

use std::sync::Arc;

use super::pexels::PexelsProvider;
use super::provider::ImageProvider;
use super::query::QueryEnricher;
use super::unsplash::UnsplashProvider;
use crate::config::Config;

const UNSPLASH_DEFAULT_PRIORITY: u32 = 1;
const PEXELS_DEFAULT_PRIORITY: u32 = 2;

struct Registered {
    priority: u32,
    provider: Arc<dyn ImageProvider>,
}

/// Providers in the order they should be tried.
///
/// Lower priority values come first; ties keep registration order.
///
/// # Examples
///
/// ```rust,ignore
/// let mut registry = ProviderRegistry::new();
/// registry.register(Arc::new(unsplash), 1);
/// registry.register(Arc::new(pexels), 2);
///
/// for provider in registry.available() {
///     // try provider.search(..)
/// }
/// ```
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Registered>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build Unsplash and Pexels adapters from configuration. Disabled
    /// providers are registered too so they still show up in health checks.
    pub fn from_config(config: &Config, enricher: Arc<QueryEnricher>) -> Self {
        let mut registry = Self::new();

        let unsplash = &config.providers.unsplash;
        registry.register(
            Arc::new(UnsplashProvider::from_config(
                unsplash,
                &config.performance,
                enricher.clone(),
            )),
            unsplash.priority.unwrap_or(UNSPLASH_DEFAULT_PRIORITY),
        );

        let pexels = &config.providers.pexels;
        registry.register(
            Arc::new(PexelsProvider::from_config(
                pexels,
                &config.performance,
                enricher,
            )),
            pexels.priority.unwrap_or(PEXELS_DEFAULT_PRIORITY),
        );

        registry
    }

    pub fn register(&mut self, provider: Arc<dyn ImageProvider>, priority: u32) {
        let at = self
            .providers
            .iter()
            .position(|r| r.priority > priority)
            .unwrap_or(self.providers.len());
        self.providers.insert(at, Registered { priority, provider });
    }

    /// Every registered provider, in priority order.
    pub fn all(&self) -> Vec<Arc<dyn ImageProvider>> {
        self.providers.iter().map(|r| r.provider.clone()).collect()
    }

    /// Enabled, credentialed providers in priority order.
    pub fn available(&self) -> Vec<Arc<dyn ImageProvider>> {
        self.providers
            .iter()
            .filter(|r| r.provider.is_available())
            .map(|r| r.provider.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.providers
            .iter()
            .find(|r| r.provider.name() == name)
            .map(|r| r.provider.clone())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|r| r.provider.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
