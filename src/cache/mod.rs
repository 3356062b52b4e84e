//! In-memory bounded cache with recency eviction and per-entry TTL.
//!
//! [`BoundedCache`] keeps at most `max_size` entries. Lookups expire stale
//! entries lazily; inserts past capacity evict exactly one entry, chosen by
//! the configured [`EvictionPolicy`]. Every removal is reported to the
//! registered [`EvictionObserver`]s.

mod bounded;
mod stats;

use agrimedia_common::ImageDescriptor;
use serde::{Deserialize, Serialize};

pub use bounded::{BoundedCache, CacheEntry};
pub use stats::{CacheStats, EntryUsage};

/// Cache of descriptor lists keyed by request (`theme:...`, `category:...`).
pub type ImageCache = BoundedCache<Vec<ImageDescriptor>>;

/// Which entry goes when the cache is over capacity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least recently accessed.
    #[default]
    Lru,
    /// Oldest inserted; lookups do not reorder.
    Fifo,
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionReason {
    Capacity,
    Expired,
    Manual,
    Cleared,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Capacity => "capacity",
            Self::Expired => "expired",
            Self::Manual => "manual",
            Self::Cleared => "cleared",
        };
        f.write_str(s)
    }
}

/// Subscriber notified synchronously for every removed entry.
///
/// Notifications run after the cache lock is released, so observers may call
/// back into the cache.
pub trait EvictionObserver: Send + Sync {
    fn on_evict(&self, key: &str, reason: EvictionReason);
}
