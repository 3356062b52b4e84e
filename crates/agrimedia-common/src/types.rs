//! Core type definitions for image descriptors.
//!
//! An [`ImageDescriptor`] is what every public request resolves to: either a
//! real image fetched from a provider or a bundled static asset. Descriptors
//! are never mutated after construction; the cache hands out clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MediaError, Result};

/// Where an image descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Fetched from the Unsplash API.
    Unsplash,
    /// Fetched from the Pexels API.
    Pexels,
    /// Served from the in-memory cache.
    Cache,
    /// Synthesized from a bundled static asset.
    Fallback,
}

impl Provenance {
    /// Returns `true` for descriptors that came from an external provider.
    pub fn is_provider(self) -> bool {
        matches!(self, Self::Unsplash | Self::Pexels)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsplash => write!(f, "unsplash"),
            Self::Pexels => write!(f, "pexels"),
            Self::Cache => write!(f, "cache"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

impl std::str::FromStr for Provenance {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unsplash" => Ok(Self::Unsplash),
            "pexels" => Ok(Self::Pexels),
            "cache" => Ok(Self::Cache),
            "fallback" => Ok(Self::Fallback),
            other => Err(MediaError::validation(format!("unknown provenance: {other}"))),
        }
    }
}

/// Credit line that must accompany a displayed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub photographer: String,
    pub photographer_url: Option<String>,
    pub source: String,
    pub source_url: Option<String>,
    /// Whether the presentation layer must display the credit.
    pub required: bool,
}

impl Attribution {
    /// Attribution for a provider image. The photographer name is mandatory.
    pub fn credited(
        photographer: impl Into<String>,
        photographer_url: Option<String>,
        source: impl Into<String>,
        source_url: Option<String>,
    ) -> Result<Self> {
        let photographer = photographer.into();
        if photographer.trim().is_empty() {
            return Err(MediaError::validation(
                "attribution requires a photographer name",
            ));
        }

        Ok(Self {
            photographer,
            photographer_url,
            source: source.into(),
            source_url,
            required: true,
        })
    }

    /// Attribution for a bundled static asset; nothing needs crediting.
    pub fn bundled() -> Self {
        Self {
            photographer: String::new(),
            photographer_url: None,
            source: "agrimedia".to_string(),
            source_url: None,
            required: false,
        }
    }

    /// `required` implies a non-empty photographer.
    pub fn is_valid(&self) -> bool {
        !self.required || !self.photographer.trim().is_empty()
    }
}

/// Descriptive metadata carried alongside an image. Nothing here is computed
/// from pixels; values are whatever the provider reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub dominant_colors: Vec<String>,
    pub tags: Vec<String>,
    pub download_url: Option<String>,
    pub provider_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl ImageMetadata {
    /// Build metadata, deriving the aspect ratio from the dimensions.
    pub fn new(width: u32, height: u32, fetched_at: DateTime<Utc>) -> Self {
        Self {
            width,
            height,
            aspect_ratio: aspect_ratio(width, height),
            dominant_colors: Vec::new(),
            tags: Vec::new(),
            download_url: None,
            provider_id: None,
            fetched_at,
        }
    }
}

fn aspect_ratio(width: u32, height: u32) -> f64 {
    if height == 0 {
        0.0
    } else {
        f64::from(width) / f64::from(height)
    }
}

/// A usable image returned to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub id: String,
    pub url: String,
    pub thumbnail_url: String,
    pub alt_text: String,
    pub attribution: Attribution,
    pub provenance: Provenance,
    pub metadata: ImageMetadata,
}

impl ImageDescriptor {
    /// Returns `true` when this descriptor is a bundled static asset.
    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }
}
