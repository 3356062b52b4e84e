//! Static fallback descriptors built from bundled assets.

use agrimedia_common::{Attribution, ImageDescriptor, ImageMetadata, Provenance};
use chrono::{DateTime, Utc};

use super::request::{MediaRequest, RequestKind};
use crate::config::FallbackConfig;

/// Synthesizes descriptors for requests no provider could serve. Never fails.
#[derive(Debug, Clone)]
pub struct FallbackCatalog {
    config: FallbackConfig,
}

impl FallbackCatalog {
    pub fn new(config: FallbackConfig) -> Self {
        Self { config }
    }

    /// Asset path for `request`: a `<kind>:<name>` override if configured,
    /// otherwise the per-kind default.
    pub fn asset_for(&self, request: &MediaRequest) -> &str {
        if let Some(path) = self.config.overrides.get(&request.fallback_key()) {
            return path;
        }
        match request.kind() {
            RequestKind::Theme => &self.config.theme,
            RequestKind::Category => &self.config.category,
            RequestKind::Section => &self.config.section,
        }
    }

    /// `request.count()` descriptors pointing at the bundled asset.
    pub fn descriptors(&self, request: &MediaRequest, now: DateTime<Utc>) -> Vec<ImageDescriptor> {
        (1..=request.count())
            .map(|i| self.numbered(request, now, i))
            .collect()
    }

    /// The first descriptor [`descriptors`](Self::descriptors) would return.
    pub fn descriptor(&self, request: &MediaRequest, now: DateTime<Utc>) -> ImageDescriptor {
        self.numbered(request, now, 1)
    }

    fn numbered(&self, request: &MediaRequest, now: DateTime<Utc>, i: usize) -> ImageDescriptor {
        let url = self.asset_for(request).to_string();
        let id = if request.count() <= 1 {
            format!("fallback-{}-{}", request.kind(), request.name())
        } else {
            format!("fallback-{}-{}-{i}", request.kind(), request.name())
        };

        let mut metadata = ImageMetadata::new(self.config.width, self.config.height, now);
        if !request.topic().is_empty() {
            metadata.tags = vec![request.topic().to_string()];
        }

        ImageDescriptor {
            id,
            thumbnail_url: url.clone(),
            url,
            alt_text: alt_text(request),
            attribution: Attribution::bundled(),
            provenance: Provenance::Fallback,
            metadata,
        }
    }
}

fn alt_text(request: &MediaRequest) -> String {
    let subject = if request.topic().is_empty() {
        "Agricultural marketplace".to_string()
    } else {
        request.topic().to_string()
    };
    match request.kind() {
        RequestKind::Theme => format!("{subject} hero image"),
        RequestKind::Category => format!("{subject} category image"),
        RequestKind::Section => format!("{subject} section background"),
    }
}
