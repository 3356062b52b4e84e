//! Category matching and relevance scoring.
//!
//! The [`CategoryMatcher`] maps logical marketplace categories ("livestock",
//! "grains", ...) to weighted search-term tiers and scores untrusted provider
//! results for topical fit:
//!
//! - any exclude-term match is a hard reject (score `-1`);
//! - otherwise `3 * primary + 2 * fallback + 1 * generic` matches.
//!
//! Matching is by whole words over a result's description, alt text, and
//! tags; see [`vocabulary::contains_term`].

pub mod vocabulary;

use serde::{Deserialize, Serialize};

use crate::providers::ProviderImage;

/// Score assigned to results that hit an exclude term.
pub const REJECTED: i32 = -1;

const PRIMARY_WEIGHT: i32 = 3;
const FALLBACK_WEIGHT: i32 = 2;
const GENERIC_WEIGHT: i32 = 1;

/// Search vocabulary for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub name: String,
    pub primary: Vec<String>,
    #[serde(default)]
    pub fallback: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Static, read-only category table with scoring helpers.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    mappings: Vec<CategoryMapping>,
    generic: CategoryMapping,
}

impl CategoryMatcher {
    /// Build a matcher over `mappings`; an empty table selects the built-in one.
    pub fn new(mappings: Vec<CategoryMapping>) -> Self {
        let mappings = if mappings.is_empty() {
            vocabulary::default_categories()
        } else {
            mappings.into_iter().map(normalize).collect()
        };

        Self {
            mappings,
            generic: vocabulary::generic_mapping(),
        }
    }

    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.mappings
    }

    /// Resolve a category: exact name, then a mapping whose name is one of
    /// the requested words (plurals allowed either way), then the generic tier.
    pub fn resolve(&self, category: &str) -> &CategoryMapping {
        let wanted = category.trim().to_lowercase();
        if wanted.is_empty() {
            return &self.generic;
        }

        if let Some(exact) = self.mappings.iter().find(|m| m.name == wanted) {
            return exact;
        }

        let words = vocabulary::tokenize(&wanted);
        self.mappings
            .iter()
            .find(|m| {
                words.iter().any(|w| {
                    vocabulary::word_matches(w, &m.name) || vocabulary::word_matches(&m.name, w)
                })
            })
            .unwrap_or(&self.generic)
    }

    /// Primary search terms for `category`.
    pub fn search_terms(&self, category: &str) -> Vec<String> {
        self.resolve(category).primary.clone()
    }

    /// Ordered tiers for staged retry: primary, category fallback, global
    /// fallback. Empty tiers are skipped.
    pub fn tiered_fallback_terms(&self, category: &str) -> Vec<Vec<String>> {
        let mapping = self.resolve(category);
        let global: Vec<String> = vocabulary::GLOBAL_FALLBACK_TERMS
            .iter()
            .map(|t| (*t).to_string())
            .collect();

        [mapping.primary.clone(), mapping.fallback.clone(), global]
            .into_iter()
            .filter(|tier| !tier.is_empty())
            .collect()
    }

    /// Relevance of `result` to `category`. See the module docs for weights.
    pub fn relevance_score(&self, result: &ProviderImage, category: &str) -> i32 {
        let mapping = self.resolve(category);
        score_text(&result.search_text(), mapping)
    }

    /// Drop results scoring `<= 0` and stable-sort the rest by descending score.
    pub fn filter_and_rank(&self, results: Vec<ProviderImage>, category: &str) -> Vec<ProviderImage> {
        let mapping = self.resolve(category);
        let mut scored: Vec<(i32, ProviderImage)> = results
            .into_iter()
            .map(|r| (score_text(&r.search_text(), mapping), r))
            .filter(|(score, _)| *score > 0)
            .collect();

        // sort_by is stable, so equal scores keep provider order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, r)| r).collect()
    }

    /// At least one agricultural term and no disqualifying term.
    pub fn is_on_theme(&self, result: &ProviderImage) -> bool {
        let text = result.search_text();
        vocabulary::is_agricultural(&text) && !vocabulary::is_disqualified(&text)
    }
}

impl Default for CategoryMatcher {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn normalize(mut mapping: CategoryMapping) -> CategoryMapping {
    let lower = |terms: &mut Vec<String>| {
        for t in terms.iter_mut() {
            *t = t.trim().to_lowercase();
        }
        terms.retain(|t| !t.is_empty());
    };
    mapping.name = mapping.name.trim().to_lowercase();
    lower(&mut mapping.primary);
    lower(&mut mapping.fallback);
    lower(&mut mapping.exclude);
    mapping
}

fn score_text(text: &str, mapping: &CategoryMapping) -> i32 {
    let tokens = vocabulary::tokenize(text);
    if mapping
        .exclude
        .iter()
        .any(|t| vocabulary::contains_term(&tokens, t))
    {
        return REJECTED;
    }

    let primary = vocabulary::count_terms(&tokens, &mapping.primary) as i32;
    let fallback = vocabulary::count_terms(&tokens, &mapping.fallback) as i32;
    let generic = vocabulary::count_terms(&tokens, vocabulary::AGRICULTURAL_TERMS) as i32;

    PRIMARY_WEIGHT * primary + FALLBACK_WEIGHT * fallback + GENERIC_WEIGHT * generic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::image_with;

    fn matcher() -> CategoryMatcher {
        CategoryMatcher::default()
    }

    #[test]
    fn resolve_exact_partial_and_generic() {
        let m = matcher();
        assert_eq!(m.resolve("Livestock").name, "livestock");
        assert_eq!(m.resolve("fresh vegetables").name, "vegetables");
        assert_eq!(m.resolve("grain").name, "grains");
        assert_eq!(m.resolve("spaceships").name, "generic");
        assert_eq!(m.resolve("").name, "generic");
    }

    #[test]
    fn partial_resolution_needs_a_whole_word() {
        let m = matcher();
        assert_eq!(m.resolve("rain").name, "generic");
        assert_eq!(m.resolve("carpet").name, "generic");
        assert_eq!(m.resolve("organic vegetable boxes").name, "vegetables");
    }

    #[test]
    fn search_terms_use_primary_tier() {
        let terms = matcher().search_terms("livestock");
        assert!(terms.contains(&"cattle".to_string()));
    }

    #[test]
    fn tiered_terms_are_ordered() {
        let tiers = matcher().tiered_fallback_terms("livestock");
        assert_eq!(tiers.len(), 3);
        assert!(tiers[0].contains(&"cattle".to_string()));
        assert!(tiers[1].contains(&"ranch".to_string()));
        assert!(tiers[2].contains(&"farm".to_string()));
    }

    #[test]
    fn tiers_skip_empty_fallback() {
        let m = CategoryMatcher::new(vec![CategoryMapping {
            name: "honey".into(),
            primary: vec!["honey".into()],
            fallback: vec![],
            exclude: vec![],
        }]);
        let tiers = m.tiered_fallback_terms("honey");
        assert_eq!(tiers.len(), 2);
        assert_eq!(tiers[0], vec!["honey".to_string()]);
    }

    #[test]
    fn zoo_animals_are_rejected_for_livestock() {
        let m = matcher();
        let zoo = image_with("1", "", &["zoo", "wild animals"]);
        assert_eq!(m.relevance_score(&zoo, "livestock"), REJECTED);
        assert!(m.filter_and_rank(vec![zoo], "livestock").is_empty());
    }

    #[test]
    fn exclude_overrides_any_positive_match() {
        let m = matcher();
        let mixed = image_with("1", "cattle on a farm ranch pasture", &["zoo"]);
        assert_eq!(m.relevance_score(&mixed, "livestock"), REJECTED);
    }

    #[test]
    fn exclude_terms_do_not_fire_inside_other_words() {
        let m = matcher();
        let show = image_with(
            "1",
            "cattle grazing near a competition barn",
            &["cattle", "farm"],
        );
        assert!(m.relevance_score(&show, "livestock") > 0);

        let rug = image_with("2", "sheep wool drying on a carpet", &["sheep"]);
        assert!(m.relevance_score(&rug, "livestock") > 0);

        let pets = image_with("3", "goat kept as a pet", &["pets"]);
        assert_eq!(m.relevance_score(&pets, "livestock"), REJECTED);
    }

    #[test]
    fn weights_are_three_two_one() {
        let m = CategoryMatcher::new(vec![CategoryMapping {
            name: "test".into(),
            primary: vec!["alpha".into()],
            fallback: vec!["beta".into()],
            exclude: vec![],
        }]);

        assert_eq!(m.relevance_score(&image_with("1", "alpha", &[]), "test"), 3);
        assert_eq!(m.relevance_score(&image_with("1", "beta", &[]), "test"), 2);
        // "soil" is generic vocabulary only.
        assert_eq!(m.relevance_score(&image_with("1", "soil", &[]), "test"), 1);
        assert_eq!(
            m.relevance_score(&image_with("1", "alpha beta soil", &[]), "test"),
            6
        );
        assert_eq!(m.relevance_score(&image_with("1", "nothing", &[]), "test"), 0);
    }

    #[test]
    fn filter_and_rank_orders_by_score_and_is_stable() {
        let m = matcher();
        let weak = image_with("weak", "a farm", &[]);
        let strong = image_with("strong", "cattle and sheep in a pasture", &[]);
        let weak_twin = image_with("weak-twin", "a farm", &[]);
        let off = image_with("off", "a sunset", &[]);

        let ranked = m.filter_and_rank(vec![weak, strong, weak_twin, off], "livestock");
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["strong", "weak", "weak-twin"]);
    }

    #[test]
    fn on_theme_requires_ag_term_and_no_disqualifier() {
        let m = matcher();
        assert!(m.is_on_theme(&image_with("1", "tractor in a wheat field", &[])));
        assert!(!m.is_on_theme(&image_with("2", "portrait of a dog", &[])));
        assert!(!m.is_on_theme(&image_with("3", "urban farm", &["city"])));
    }

    #[test]
    fn custom_tables_are_normalized() {
        let m = CategoryMatcher::new(vec![CategoryMapping {
            name: " Honey ".into(),
            primary: vec!["HONEY".into(), " ".into()],
            fallback: vec![],
            exclude: vec!["Cartoon".into()],
        }]);
        let mapping = m.resolve("honey");
        assert_eq!(mapping.primary, vec!["honey".to_string()]);
        assert_eq!(mapping.exclude, vec!["cartoon".to_string()]);
    }
}
