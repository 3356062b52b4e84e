//! Built-in agricultural vocabulary and category table.
//!
//! These lists back the matcher when the configuration does not supply its
//! own table. Every term is lowercase. Matching is by whole words: text and
//! terms are split into alphanumeric tokens, a multi-word term must appear as
//! consecutive tokens, and a word also matches its plural (`cow` / `cows`).

use std::collections::HashMap;

use super::CategoryMapping;

/// Terms that mark a result as agricultural at all.
pub const AGRICULTURAL_TERMS: &[&str] = &[
    "farm",
    "farmland",
    "farming",
    "agriculture",
    "agricultural",
    "crop",
    "harvest",
    "field",
    "soil",
    "tractor",
    "barn",
    "orchard",
    "ranch",
    "pasture",
    "greenhouse",
    "garden",
    "produce",
    "livestock",
    "cattle",
    "grain",
    "wheat",
    "rural",
    "countryside",
    "organic",
    "vegetable",
    "fruit",
    "seed",
    "irrigation",
    "plantation",
    "market",
];

/// Terms that disqualify a result from being on theme.
pub const DISQUALIFYING_TERMS: &[&str] = &[
    "city",
    "urban",
    "skyscraper",
    "office",
    "nightclub",
    "zoo",
    "cartoon",
    "illustration",
    "toy",
    "laptop",
    "computer",
    "traffic",
    "fashion",
    "selfie",
];

/// Tier used when nothing more specific applies.
pub const GLOBAL_FALLBACK_TERMS: &[&str] = &["farm", "agriculture", "harvest", "countryside"];

fn mapping(name: &str, primary: &[&str], fallback: &[&str], exclude: &[&str]) -> CategoryMapping {
    let owned = |terms: &[&str]| terms.iter().map(|t| (*t).to_string()).collect();
    CategoryMapping {
        name: name.to_string(),
        primary: owned(primary),
        fallback: owned(fallback),
        exclude: owned(exclude),
    }
}

/// Mapping used for categories that match nothing in the table.
pub fn generic_mapping() -> CategoryMapping {
    mapping(
        "generic",
        &["farm", "agriculture"],
        &["field", "harvest", "rural"],
        DISQUALIFYING_TERMS,
    )
}

/// The built-in category table.
pub fn default_categories() -> Vec<CategoryMapping> {
    vec![
        mapping(
            "vegetables",
            &["vegetable", "tomato", "carrot", "lettuce", "potato"],
            &["produce", "garden", "greenhouse"],
            &["cartoon", "toy", "plastic"],
        ),
        mapping(
            "fruits",
            &["fruit", "apple", "orchard", "berries", "citrus"],
            &["produce", "harvest"],
            &["cartoon", "candy", "juice bar"],
        ),
        mapping(
            "grains",
            &["wheat", "corn", "rice", "barley", "grain"],
            &["field", "harvest", "crop"],
            &["bread shop", "bakery", "cereal box"],
        ),
        mapping(
            "livestock",
            &["cattle", "cow", "sheep", "goat", "pig"],
            &["ranch", "pasture", "barn"],
            &["zoo", "wild", "safari", "pet"],
        ),
        mapping(
            "poultry",
            &["chicken", "hen", "poultry", "duck", "egg"],
            &["coop", "barn", "farm"],
            &["fried", "restaurant", "nugget"],
        ),
        mapping(
            "dairy",
            &["dairy", "milk", "cheese", "cow"],
            &["barn", "pasture"],
            &["ice cream parlor", "milkshake"],
        ),
        mapping(
            "seeds",
            &["seed", "seedling", "sprout", "planting"],
            &["soil", "garden", "nursery"],
            &["bird feeder", "sunflower seeds snack"],
        ),
        mapping(
            "equipment",
            &["tractor", "harvester", "plough", "irrigation"],
            &["machinery", "field"],
            &["toy", "construction", "mining"],
        ),
        mapping(
            "fertilizers",
            &["fertilizer", "compost", "manure"],
            &["soil", "crop"],
            &["chemical plant", "laboratory"],
        ),
        mapping(
            "herbs",
            &["herb", "basil", "mint", "lavender"],
            &["garden", "greenhouse"],
            &["medicine", "pharmacy"],
        ),
    ]
}

/// Per-category enrichment terms appended to provider queries.
pub fn default_enrichment() -> HashMap<String, Vec<String>> {
    let table: &[(&str, &[&str])] = &[
        ("vegetables", &["fresh", "organic", "farm"]),
        ("fruits", &["ripe", "orchard", "harvest"]),
        ("grains", &["field", "golden", "harvest"]),
        ("livestock", &["farm", "pasture", "ranch"]),
        ("poultry", &["farm", "free range"]),
        ("dairy", &["farm", "fresh"]),
        ("seeds", &["soil", "planting"]),
        ("equipment", &["farm", "field"]),
        ("fertilizers", &["soil", "organic"]),
        ("herbs", &["fresh", "garden"]),
    ];

    table
        .iter()
        .map(|(name, terms)| {
            (
                (*name).to_string(),
                terms.iter().map(|t| (*t).to_string()).collect(),
            )
        })
        .collect()
}

/// Split `text` into lowercase alphanumeric words, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `token` is `word` or one of its plurals.
pub fn word_matches(token: &str, word: &str) -> bool {
    token == word
        || token.strip_suffix('s') == Some(word)
        || token.strip_suffix("es") == Some(word)
}

/// Whole-word match of `term` against already tokenized text.
pub fn contains_term(tokens: &[String], term: &str) -> bool {
    let words = tokenize(term);
    match words.as_slice() {
        [] => false,
        [word] => tokens.iter().any(|t| word_matches(t, word)),
        _ => tokens.windows(words.len()).any(|window| {
            window
                .iter()
                .zip(&words)
                .all(|(token, word)| word_matches(token, word))
        }),
    }
}

/// Number of `terms` present in `tokens`.
pub fn count_terms<S: AsRef<str>>(tokens: &[String], terms: &[S]) -> usize {
    terms
        .iter()
        .filter(|t| contains_term(tokens, t.as_ref()))
        .count()
}

/// Returns `true` if `text` mentions any agricultural term.
pub fn is_agricultural(text: &str) -> bool {
    let tokens = tokenize(text);
    AGRICULTURAL_TERMS.iter().any(|t| contains_term(&tokens, t))
}

/// Count agricultural terms present in `text`.
pub fn count_agricultural(text: &str) -> usize {
    count_terms(&tokenize(text), AGRICULTURAL_TERMS)
}

/// Returns `true` if `text` mentions a disqualifying term.
pub fn is_disqualified(text: &str) -> bool {
    let tokens = tokenize(text);
    DISQUALIFYING_TERMS.iter().any(|t| contains_term(&tokens, t))
}
