use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access count for one live key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryUsage {
    pub key: String,
    pub access_count: u64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, 0 before any lookup.
    pub hit_rate: f64,
    pub miss_rate: f64,
    /// Every removal: capacity, expiry, manual, and clear.
    pub evictions: u64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    /// Most accessed keys, descending.
    pub top_entries: Vec<EntryUsage>,
    pub utilization_pct: f64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    pub(crate) fn rates(hits: u64, misses: u64) -> (f64, f64) {
        let total = hits + misses;
        if total == 0 {
            return (0.0, 0.0);
        }
        let hit_rate = hits as f64 / total as f64;
        (hit_rate, 1.0 - hit_rate)
    }
}
