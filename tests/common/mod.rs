//! Shared fixtures for integration tests.
//!
//! Provides [`ScriptedProvider`], an in-process [`ImageProvider`] that
//! replays canned results, and [`TestHarness`], which wires a full
//! [`MediaEngine`] around scripted providers and a [`ManualClock`].

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agrimedia::clock::ManualClock;
use agrimedia::client::QuotaInfo;
use agrimedia::config::Config;
use agrimedia::engine::MediaEngine;
use agrimedia::providers::{
    ImageProvider, ImageUrls, ProviderImage, ProviderRegistry, SearchOptions,
};
use agrimedia_common::{MediaError, Provenance};
use async_trait::async_trait;
use chrono::Utc;

/// A normalized provider result with agricultural text.
pub fn farm_image(id: &str, description: &str, tags: &[&str]) -> ProviderImage {
    ProviderImage {
        id: id.to_string(),
        provider: Provenance::Unsplash,
        urls: ImageUrls {
            full: format!("https://img.test/{id}/full"),
            regular: format!("https://img.test/{id}/regular"),
            small: format!("https://img.test/{id}/small"),
            thumb: format!("https://img.test/{id}/thumb"),
        },
        width: 2400,
        height: 1600,
        color: Some("#6b8e23".to_string()),
        description: Some(description.to_string()),
        alt_description: None,
        photographer: "Ada Tiller".to_string(),
        photographer_url: Some("https://img.test/@ada".to_string()),
        page_url: Some(format!("https://img.test/photos/{id}")),
        download_url: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}

/// Replays one outcome for every search.
pub struct ScriptedProvider {
    name: &'static str,
    provenance: Provenance,
    outcome: Result<Vec<ProviderImage>, MediaError>,
    remaining_quota: u32,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn returning(name: &'static str, provenance: Provenance, images: Vec<ProviderImage>) -> Self {
        let images = images
            .into_iter()
            .map(|mut i| {
                i.provider = provenance;
                i
            })
            .collect();
        Self {
            name,
            provenance,
            outcome: Ok(images),
            remaining_quota: 50,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &'static str, error: MediaError) -> Self {
        Self {
            name,
            provenance: Provenance::Pexels,
            outcome: Err(error),
            remaining_quota: 50,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_quota(mut self, remaining: u32) -> Self {
        self.remaining_quota = remaining;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn provenance(&self) -> Provenance {
        self.provenance
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn search(
        &self,
        _query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ProviderImage>, MediaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        options.validate()?;
        match &self.outcome {
            Ok(images) => Ok(images.iter().take(options.per_page as usize).cloned().collect()),
            Err(e) => Err(e.clone()),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<ProviderImage, MediaError> {
        match &self.outcome {
            Ok(images) => images
                .iter()
                .find(|i| i.id == id)
                .cloned()
                .ok_or_else(|| MediaError::validation(format!("unknown id {id}"))),
            Err(e) => Err(e.clone()),
        }
    }

    fn quota(&self) -> QuotaInfo {
        QuotaInfo {
            remaining: self.remaining_quota,
            total: 50,
            reset_at: Utc::now(),
            provider_reported: false,
        }
    }
}

/// A full engine over scripted providers and a manual clock.
pub struct TestHarness {
    pub engine: MediaEngine,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new(providers: Vec<Arc<ScriptedProvider>>) -> Self {
        Self::with_config(Config::default(), providers)
    }

    /// Providers are registered in the given order, which is their priority.
    pub fn with_config(config: Config, providers: Vec<Arc<ScriptedProvider>>) -> Self {
        let clock = Arc::new(ManualClock::default());
        let mut registry = ProviderRegistry::new();
        for (priority, provider) in providers.into_iter().enumerate() {
            registry.register(provider, priority as u32);
        }
        let engine = MediaEngine::with_parts(config, registry, clock.clone());
        Self { engine, clock }
    }
}
