//! Unsplash image provider.
//!
//! Implements [`ImageProvider`] against the Unsplash REST API.
//!
//! - `Authorization: Client-ID <key>` on every request.
//! - Page size capped at 30.
//! - Default hourly budget of 50 requests (demo-tier limit).

use std::sync::Arc;

use agrimedia_common::{MediaError, Provenance};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use super::provider::{ImageProvider, ImageUrls, Orientation, ProviderImage, SearchOptions};
use super::query::{sanitize_query, validate_id, QueryEnricher};
use crate::client::{http, ClientSettings, QuotaInfo, RateLimitedClient};
use crate::config::{PerformanceConfig, ProviderConfig};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const NAME: &str = "unsplash";
const UNSPLASH_BASE_URL: &str = "https://api.unsplash.com";
pub const MAX_PER_PAGE: u32 = 30;
pub const DEFAULT_HOURLY_LIMIT: u32 = 50;

// ---------------------------------------------------------------------------
// Unsplash API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UnsplashSearchResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    id: String,
    width: u32,
    height: u32,
    color: Option<String>,
    description: Option<String>,
    alt_description: Option<String>,
    urls: UnsplashUrls,
    links: Option<UnsplashLinks>,
    user: UnsplashUser,
    #[serde(default)]
    tags: Vec<UnsplashTag>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUrls {
    full: String,
    regular: String,
    small: String,
    thumb: String,
}

#[derive(Debug, Deserialize)]
struct UnsplashLinks {
    html: Option<String>,
    download: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUser {
    #[serde(default)]
    name: String,
    links: Option<UnsplashUserLinks>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUserLinks {
    html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsplashTag {
    title: String,
}

impl From<UnsplashPhoto> for ProviderImage {
    fn from(p: UnsplashPhoto) -> Self {
        let (page_url, download_url) = match p.links {
            Some(l) => (l.html, l.download),
            None => (None, None),
        };
        Self {
            id: p.id,
            provider: Provenance::Unsplash,
            urls: ImageUrls {
                full: p.urls.full,
                regular: p.urls.regular,
                small: p.urls.small,
                thumb: p.urls.thumb,
            },
            width: p.width,
            height: p.height,
            color: p.color,
            description: p.description,
            alt_description: p.alt_description,
            photographer: p.user.name,
            photographer_url: p.user.links.and_then(|l| l.html),
            page_url,
            download_url,
            tags: p.tags.into_iter().map(|t| t.title).collect(),
        }
    }
}

fn orientation_param(o: Orientation) -> &'static str {
    match o {
        Orientation::Landscape => "landscape",
        Orientation::Portrait => "portrait",
        Orientation::Squarish => "squarish",
    }
}

// ---------------------------------------------------------------------------
// Provider implementation
// ---------------------------------------------------------------------------

/// Unsplash image provider.
pub struct UnsplashProvider {
    client: RateLimitedClient,
    api_key: String,
    base_url: String,
    enabled: bool,
    enricher: Arc<QueryEnricher>,
}

impl UnsplashProvider {
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
                .unwrap_or_else(|| UNSPLASH_BASE_URL.to_string())
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

    fn auth_header(&self) -> String {
        format!("Client-ID {}", self.api_key)
    }
}

#[async_trait]
impl ImageProvider for UnsplashProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn provenance(&self) -> Provenance {
        Provenance::Unsplash
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
        let url = format!("{}/search/photos", self.base_url);
        let timeout = self.client.settings().timeout;

        debug!(provider = NAME, query = %query, per_page = %per_page, "Searching");

        let response: UnsplashSearchResponse = self
            .client
            .execute_with_retry("search", || {
                let mut request = self
                    .client
                    .http()
                    .get(&url)
                    .header(AUTHORIZATION, self.auth_header())
                    .header("Accept-Version", "v1")
                    .query(&[
                        ("query", query.as_str()),
                        ("page", page.as_str()),
                        ("per_page", per_page.as_str()),
                        ("content_filter", "high"),
                    ]);
                if let Some(o) = options.orientation {
                    request = request.query(&[("orientation", orientation_param(o))]);
                }
                http::send_json(NAME, request, self.client.quota_window(), timeout)
            })
            .await?;

        Ok(response.results.into_iter().map(ProviderImage::from).collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<ProviderImage, MediaError> {
        let url = format!("{}/photos/{}", self.base_url, validate_id(id)?);
        let timeout = self.client.settings().timeout;

        let photo: UnsplashPhoto = self
            .client
            .execute_with_retry("get_by_id", || {
                let request = self
                    .client
                    .http()
                    .get(&url)
                    .header(AUTHORIZATION, self.auth_header())
                    .header("Accept-Version", "v1");
                http::send_json(NAME, request, self.client.quota_window(), timeout)
            })
            .await?;

        Ok(photo.into())
    }

    fn quota(&self) -> QuotaInfo {
        self.client.quota()
    }
}
