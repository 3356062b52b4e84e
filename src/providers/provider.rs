//! Trait definition and types for image providers.
//!
//! This module defines the [`ImageProvider`] trait that both content
//! providers (Unsplash, Pexels) implement, along with the normalized result
//! type every adapter maps its raw response into.

use agrimedia_common::{Attribution, ImageDescriptor, ImageMetadata, MediaError, Provenance};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::QuotaInfo;
use crate::matcher::vocabulary;

/// Largest result count a caller may request.
pub const MAX_RESULTS: u32 = 50;

// ---------------------------------------------------------------------------
// Search options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Squarish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSize {
    Large,
    Medium,
    Small,
}

/// Options accepted by [`ImageProvider::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Results wanted, 1..=50. Adapters cap further to their own page size.
    pub per_page: u32,
    pub page: u32,
    pub orientation: Option<Orientation>,
    pub size: Option<ImageSize>,
    /// Category used to pick an enrichment term.
    pub category: Option<String>,
}

impl SearchOptions {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page,
            ..Self::default()
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn validate(&self) -> Result<(), MediaError> {
        if self.per_page == 0 || self.per_page > MAX_RESULTS {
            return Err(MediaError::validation(format!(
                "result count must be between 1 and {MAX_RESULTS}, got {}",
                self.per_page
            )));
        }
        if self.page == 0 {
            return Err(MediaError::validation("page numbers start at 1"));
        }
        Ok(())
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            per_page: 10,
            page: 1,
            orientation: None,
            size: None,
            category: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized results
// ---------------------------------------------------------------------------

/// Resolution-tagged URLs for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub full: String,
    pub regular: String,
    pub small: String,
    pub thumb: String,
}

impl ImageUrls {
    /// URL best matching the requested size (regular when unspecified).
    pub fn for_size(&self, size: Option<ImageSize>) -> &str {
        match size {
            Some(ImageSize::Large) => &self.full,
            Some(ImageSize::Small) => &self.small,
            Some(ImageSize::Medium) | None => &self.regular,
        }
    }
}

/// A single provider result, normalized across providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderImage {
    /// Provider-specific identifier.
    pub id: String,
    pub provider: Provenance,
    pub urls: ImageUrls,
    pub width: u32,
    pub height: u32,
    pub color: Option<String>,
    pub description: Option<String>,
    pub alt_description: Option<String>,
    pub photographer: String,
    pub photographer_url: Option<String>,
    /// Provider page for this image.
    pub page_url: Option<String>,
    pub download_url: Option<String>,
    pub tags: Vec<String>,
}

impl ProviderImage {
    /// Lowercased text used for relevance matching: description, alt text,
    /// and tags.
    pub fn search_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.tags.len() + 2);
        if let Some(d) = &self.description {
            parts.push(d);
        }
        if let Some(a) = &self.alt_description {
            parts.push(a);
        }
        parts.extend(self.tags.iter().map(String::as_str));
        parts.join(" ").to_lowercase()
    }

    /// Convert into a descriptor. Fails when the attribution would be
    /// invalid (a provider image always requires a credited photographer).
    pub fn to_descriptor(
        &self,
        size: Option<ImageSize>,
        fetched_at: DateTime<Utc>,
    ) -> Result<ImageDescriptor, MediaError> {
        let attribution = Attribution::credited(
            self.photographer.clone(),
            self.photographer_url.clone(),
            self.provider.to_string(),
            self.page_url.clone(),
        )?;

        let alt_text = self
            .alt_description
            .clone()
            .or_else(|| self.description.clone())
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| format!("Photo by {}", self.photographer));

        let mut metadata = ImageMetadata::new(self.width, self.height, fetched_at);
        metadata.dominant_colors = self.color.iter().cloned().collect();
        metadata.tags = self.tags.clone();
        metadata.download_url = self.download_url.clone();
        metadata.provider_id = Some(self.id.clone());

        Ok(ImageDescriptor {
            id: format!("{}-{}", self.provider, self.id),
            url: self.urls.for_size(size).to_string(),
            thumbnail_url: self.urls.thumb.clone(),
            alt_text,
            attribution,
            provenance: self.provider,
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Async trait implemented by every image content provider.
///
/// Each adapter wraps one external API behind a
/// [`RateLimitedClient`](crate::client::RateLimitedClient), so calls already
/// retry internally; errors returned here are final for that provider.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short, lowercase identifier (e.g. `"unsplash"`).
    fn name(&self) -> &'static str;

    /// Provenance stamped on descriptors built from this provider.
    fn provenance(&self) -> Provenance;

    /// `true` when enabled and configured with credentials.
    fn is_available(&self) -> bool;

    /// Search for images matching `query`.
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<ProviderImage>, MediaError>;

    /// Fetch a single image by its provider ID.
    async fn get_by_id(&self, id: &str) -> Result<ProviderImage, MediaError>;

    /// Remaining/total/reset as tracked locally and refined by the provider.
    fn quota(&self) -> QuotaInfo;

    /// Cheap agricultural-vocabulary pre-filter applied before caching.
    fn is_on_topic(&self, result: &ProviderImage) -> bool {
        vocabulary::is_agricultural(&result.search_text())
    }
}
