//! Logical media requests and the cache keys derived from them.

use serde::{Deserialize, Serialize};

use crate::providers::{ImageSize, Orientation, SearchOptions, MAX_RESULTS};

/// Name used when a request does not name a theme or section.
pub const DEFAULT_NAME: &str = "default";

/// Results asked of a provider for single-image requests. Extra candidates
/// leave room for relevance filtering.
const SINGLE_IMAGE_CANDIDATES: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Theme,
    Category,
    Section,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::Category => "category",
            Self::Section => "section",
        }
    }

    /// Operation name used in metrics and logs.
    pub fn operation(self) -> &'static str {
        match self {
            Self::Theme => "get_theme_image",
            Self::Category => "get_category_images",
            Self::Section => "get_section_image",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request from the presentation layer.
///
/// Names are normalized on construction (trimmed, lowercased, inner
/// whitespace collapsed to `-`), so `"About  Us"` and `"about us"` share a
/// cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRequest {
    kind: RequestKind,
    name: String,
    /// Topic text handed to the matcher and to query enrichment.
    topic: String,
    count: usize,
}

impl MediaRequest {
    pub fn theme(theme: Option<&str>) -> Self {
        Self::single(RequestKind::Theme, theme.unwrap_or_default())
    }

    /// `count` is clamped to `1..=50`.
    pub fn category(category: &str, count: usize) -> Self {
        let mut request = Self::single(RequestKind::Category, category);
        request.count = count.clamp(1, MAX_RESULTS as usize);
        request
    }

    pub fn section(section: &str) -> Self {
        Self::single(RequestKind::Section, section)
    }

    fn single(kind: RequestKind, raw: &str) -> Self {
        let topic = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        let name = if topic.is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            topic.replace(' ', "-")
        };
        Self {
            kind,
            name,
            topic,
            count: 1,
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Deterministic cache key: `theme:<name>`, `category:<name>:<count>`,
    /// or `section:<name>`.
    pub fn cache_key(&self) -> String {
        match self.kind {
            RequestKind::Category => format!("category:{}:{}", self.name, self.count),
            _ => format!("{}:{}", self.kind, self.name),
        }
    }

    /// Key into the fallback override table: `<kind>:<name>`.
    pub fn fallback_key(&self) -> String {
        format!("{}:{}", self.kind, self.name)
    }

    /// Ordered query tiers. A named theme or section is tried verbatim
    /// before the matcher's tiers.
    pub fn query_tiers(&self, matcher_tiers: Vec<Vec<String>>) -> Vec<Vec<String>> {
        let mut tiers = Vec::with_capacity(matcher_tiers.len() + 1);
        if self.kind != RequestKind::Category && !self.topic.is_empty() {
            tiers.push(vec![self.topic.clone()]);
        }
        tiers.extend(matcher_tiers);
        tiers
    }

    pub fn search_options(&self) -> SearchOptions {
        let mut options = match self.kind {
            RequestKind::Theme | RequestKind::Section => SearchOptions::new(SINGLE_IMAGE_CANDIDATES)
                .with_orientation(Orientation::Landscape),
            RequestKind::Category => {
                let wanted = (self.count as u32).saturating_mul(2);
                SearchOptions::new(wanted.clamp(SINGLE_IMAGE_CANDIDATES, MAX_RESULTS))
            }
        };
        options.size = Some(match self.kind {
            RequestKind::Theme => ImageSize::Large,
            RequestKind::Section => ImageSize::Large,
            RequestKind::Category => ImageSize::Medium,
        });
        if !self.topic.is_empty() {
            options = options.with_category(self.topic.clone());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalized() {
        assert_eq!(MediaRequest::theme(None).cache_key(), "theme:default");
        assert_eq!(MediaRequest::theme(Some("  ")).cache_key(), "theme:default");
        assert_eq!(
            MediaRequest::theme(Some("Harvest  Season")).cache_key(),
            "theme:harvest-season"
        );
        assert_eq!(
            MediaRequest::category("Livestock", 6).cache_key(),
            "category:livestock:6"
        );
        assert_eq!(MediaRequest::section("About Us").cache_key(), "section:about-us");
        assert_eq!(MediaRequest::section("About Us").fallback_key(), "section:about-us");
    }

    #[test]
    fn category_count_is_clamped() {
        assert_eq!(MediaRequest::category("grains", 0).count(), 1);
        assert_eq!(MediaRequest::category("grains", 500).count(), 50);
        assert_eq!(
            MediaRequest::category("grains", 500).fallback_key(),
            "category:grains"
        );
    }

    #[test]
    fn options_stay_within_limits() {
        for count in [1, 7, 25, 50] {
            let options = MediaRequest::category("grains", count).search_options();
            assert!(options.validate().is_ok());
            assert!(options.per_page as usize >= count);
        }
        let theme = MediaRequest::theme(Some("harvest")).search_options();
        assert_eq!(theme.orientation, Some(Orientation::Landscape));
        assert_eq!(theme.category.as_deref(), Some("harvest"));
        assert!(MediaRequest::theme(None).search_options().category.is_none());
    }

    #[test]
    fn named_requests_try_their_topic_first() {
        let matcher_tiers = vec![vec!["farm".to_string()]];
        let tiers = MediaRequest::section("about us").query_tiers(matcher_tiers.clone());
        assert_eq!(tiers[0], vec!["about us".to_string()]);
        assert_eq!(tiers.len(), 2);

        let tiers = MediaRequest::category("livestock", 3).query_tiers(matcher_tiers.clone());
        assert_eq!(tiers, matcher_tiers);
        assert_eq!(MediaRequest::theme(None).query_tiers(matcher_tiers.clone()), matcher_tiers);
    }
}
