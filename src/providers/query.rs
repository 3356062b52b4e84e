//! Query sanitizing and category enrichment.
//!
//! Every adapter passes caller input through [`sanitize_query`] before it
//! reaches the wire, then optionally appends one category-specific term via
//! a [`QueryEnricher`]. Term choice goes through a [`TermSelector`] so tests
//! can make it deterministic.

use std::collections::HashMap;

use agrimedia_common::MediaError;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Strip everything but alphanumerics, hyphens and whitespace, collapse
/// whitespace, and lowercase. Empty results are rejected.
pub fn sanitize_query(raw: &str) -> Result<String, MediaError> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let query = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if query.is_empty() {
        return Err(MediaError::validation(format!(
            "query {raw:?} is empty after sanitizing"
        )));
    }
    Ok(query)
}

/// Provider IDs are passed through untouched, but only when they are plain
/// `[A-Za-z0-9_-]+` tokens.
pub fn validate_id(raw: &str) -> Result<&str, MediaError> {
    let id = raw.trim();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(MediaError::validation(format!("invalid image id {raw:?}")));
    }
    Ok(id)
}

/// Picks one enrichment term out of a category's candidates.
pub trait TermSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String>;
}

/// Uniform random choice from a seedable RNG.
#[derive(Debug)]
pub struct RandomTermSelector {
    rng: Mutex<StdRng>,
}

impl RandomTermSelector {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl TermSelector for RandomTermSelector {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.rng.lock().gen_range(0..candidates.len());
        candidates.get(idx)
    }
}

/// Always the first candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstTermSelector;

impl TermSelector for FirstTermSelector {
    fn select<'a>(&self, candidates: &'a [String]) -> Option<&'a String> {
        candidates.first()
    }
}

/// Appends a category term to outgoing queries.
pub struct QueryEnricher {
    enabled: bool,
    terms: HashMap<String, Vec<String>>,
    selector: Box<dyn TermSelector>,
}

impl QueryEnricher {
    pub fn new(
        enabled: bool,
        terms: HashMap<String, Vec<String>>,
        selector: Box<dyn TermSelector>,
    ) -> Self {
        let terms = terms
            .into_iter()
            .map(|(k, v)| {
                let v = v
                    .into_iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                (k.trim().to_lowercase(), v)
            })
            .collect();

        Self {
            enabled,
            terms,
            selector,
        }
    }

    /// An enricher that never changes the query.
    pub fn disabled() -> Self {
        Self::new(false, HashMap::new(), Box::new(FirstTermSelector))
    }

    fn candidates(&self, category: &str) -> Option<&[String]> {
        let key = category.trim().to_lowercase();
        if let Some(terms) = self.terms.get(&key) {
            return Some(terms);
        }
        self.terms
            .iter()
            .filter(|(name, _)| key.contains(name.as_str()) || name.contains(key.as_str()))
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(_, terms)| terms.as_slice())
    }

    /// `query` plus one selected term for `category`, unless the query
    /// already mentions every candidate or enrichment is off.
    pub fn enrich(&self, query: &str, category: Option<&str>) -> String {
        if !self.enabled {
            return query.to_string();
        }
        let Some(candidates) = category.and_then(|c| self.candidates(c)) else {
            return query.to_string();
        };

        let fresh: Vec<String> = candidates
            .iter()
            .filter(|t| !query.contains(t.as_str()))
            .cloned()
            .collect();

        match self.selector.select(&fresh) {
            Some(term) => format!("{query} {term}"),
            None => query.to_string(),
        }
    }
}

impl std::fmt::Debug for QueryEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEnricher")
            .field("enabled", &self.enabled)
            .field("categories", &self.terms.len())
            .finish()
    }
}
