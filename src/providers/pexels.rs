//! Pexels image provider.
//!
//! Implements [`ImageProvider`] against the Pexels v1 REST API. Requests carry
//! the raw API key in `Authorization`; pages hold at most 80 photos.

use std::sync::Arc;

use agrimedia_common::{MediaError, Provenance};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use super::provider::{
    ImageProvider, ImageSize, ImageUrls, Orientation, ProviderImage, SearchOptions,
};
use super::query::{sanitize_query, validate_id, QueryEnricher};
use crate::client::{http, ClientSettings, QuotaInfo, RateLimitedClient};
use crate::config::{PerformanceConfig, ProviderConfig};

pub const NAME: &str = "pexels";
const PEXELS_BASE_URL: &str = "https://api.pexels.com";
pub const MAX_PER_PAGE: u32 = 80;
pub const DEFAULT_HOURLY_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
struct PexelsSearchResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: u64,
    width: u32,
    height: u32,
    /// Photo page on pexels.com.
    url: Option<String>,
    #[serde(default)]
    photographer: String,
    photographer_url: Option<String>,
    avg_color: Option<String>,
    src: PexelsSrc,
    alt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    original: String,
    large: String,
    medium: String,
    small: String,
    tiny: String,
}

impl From<PexelsPhoto> for ProviderImage {
    fn from(p: PexelsPhoto) -> Self {
        // Pexels has no tag list; alt text is the only description it returns.
        let alt = p.alt.filter(|a| !a.trim().is_empty());
        Self {
            id: p.id.to_string(),
            provider: Provenance::Pexels,
            urls: ImageUrls {
                full: p.src.large,
                regular: p.src.medium,
                small: p.src.small,
                thumb: p.src.tiny,
            },
            width: p.width,
            height: p.height,
            color: p.avg_color,
            description: None,
            alt_description: alt,
            photographer: p.photographer,
            photographer_url: p.photographer_url,
            page_url: p.url,
            download_url: Some(p.src.original),
            tags: Vec::new(),
        }
    }
}

fn orientation_param(o: Orientation) -> &'static str {
    match o {
        Orientation::Landscape => "landscape",
        Orientation::Portrait => "portrait",
        Orientation::Squarish => "square",
    }
}

fn size_param(s: ImageSize) -> &'static str {
    match s {
        ImageSize::Large => "large",
        ImageSize::Medium => "medium",
        ImageSize::Small => "small",
    }
}

/// Pexels image provider.
pub struct PexelsProvider {
    client: RateLimitedClient,
    api_key: String,
    base_url: String,
    enabled: bool,
    enricher: Arc<QueryEnricher>,
}

impl PexelsProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        settings: ClientSettings,
        enricher: Arc<QueryEnricher>,
    ) -> Self {
        Self::with_client(
            api_key,
            base_url,
            RateLimitedClient::new(NAME, settings),
            enricher,
        )
    }

    pub fn with_client(
        api_key: String,
        base_url: Option<String>,
        client: RateLimitedClient,
        enricher: Arc<QueryEnricher>,
    ) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| PEXELS_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            enabled: true,
            enricher,
        }
    }

    pub fn from_config(
        config: &ProviderConfig,
        perf: &PerformanceConfig,
        enricher: Arc<QueryEnricher>,
    ) -> Self {
        let settings = ClientSettings::from_performance(
            perf,
            config.hourly_limit.unwrap_or(DEFAULT_HOURLY_LIMIT),
            config.requests_per_second,
        );
        let mut provider = Self::new(
            config.api_key.clone(),
            config.base_url.clone(),
            settings,
            enricher,
        );
        provider.enabled = config.enabled;
        provider
    }
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn provenance(&self) -> Provenance {
        Provenance::Pexels
    }

    fn is_available(&self) -> bool {
        self.enabled && !self.api_key.is_empty()
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ProviderImage>, MediaError> {
        options.validate()?;
        let query = self
            .enricher
            .enrich(&sanitize_query(query)?, options.category.as_deref());
        let per_page = options.per_page.min(MAX_PER_PAGE).to_string();
        let page = options.page.to_string();
        let url = format!("{}/v1/search", self.base_url);
        let timeout = self.client.settings().timeout;

        debug!(provider = NAME, query = %query, per_page = %per_page, "Searching");

        let response: PexelsSearchResponse = self
            .client
            .execute_with_retry("search", || {
                let mut request = self
                    .client
                    .http()
                    .get(&url)
                    .header(AUTHORIZATION, self.api_key.as_str())
                    .query(&[
                        ("query", query.as_str()),
                        ("page", page.as_str()),
                        ("per_page", per_page.as_str()),
                    ]);
                if let Some(o) = options.orientation {
                    request = request.query(&[("orientation", orientation_param(o))]);
                }
                if let Some(s) = options.size {
                    request = request.query(&[("size", size_param(s))]);
                }
                http::send_json(NAME, request, self.client.quota_window(), timeout)
            })
            .await?;

        Ok(response.photos.into_iter().map(ProviderImage::from).collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<ProviderImage, MediaError> {
        let url = format!("{}/v1/photos/{}", self.base_url, validate_id(id)?);
        let timeout = self.client.settings().timeout;

        let photo: PexelsPhoto = self
            .client
            .execute_with_retry("get_by_id", || {
                let request = self
                    .client
                    .http()
                    .get(&url)
                    .header(AUTHORIZATION, self.api_key.as_str());
                http::send_json(NAME, request, self.client.quota_window(), timeout)
            })
            .await?;

        Ok(photo.into())
    }

    fn quota(&self) -> QuotaInfo {
        self.client.quota()
    }
}
