//! Windowed aggregations over the metrics collections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::{CacheEvent, CacheOutcome, ErrorRecord, OperationRecord, ProviderUsage};

/// Number of recent errors carried in an [`ErrorSummary`].
pub const RECENT_ERRORS: usize = 10;

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

fn mean(total: u64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total as f64 / count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationBreakdown {
    pub count: usize,
    pub success_rate: f64,
    pub average_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_operations: usize,
    pub successful: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub max_duration_ms: u64,
    pub by_operation: BTreeMap<String, OperationBreakdown>,
}

impl PerformanceSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a OperationRecord>) -> Self {
        #[derive(Default)]
        struct Acc {
            count: usize,
            ok: usize,
            total_ms: u64,
        }

        let mut all = Acc::default();
        let mut max_duration_ms = 0;
        let mut per_op: BTreeMap<String, Acc> = BTreeMap::new();

        for r in records {
            all.count += 1;
            all.ok += usize::from(r.success);
            all.total_ms += r.duration_ms;
            max_duration_ms = max_duration_ms.max(r.duration_ms);

            let acc = per_op.entry(r.name.clone()).or_default();
            acc.count += 1;
            acc.ok += usize::from(r.success);
            acc.total_ms += r.duration_ms;
        }

        Self {
            total_operations: all.count,
            successful: all.ok,
            success_rate: ratio(all.ok, all.count),
            average_duration_ms: mean(all.total_ms, all.count),
            max_duration_ms,
            by_operation: per_op
                .into_iter()
                .map(|(name, a)| {
                    (
                        name,
                        OperationBreakdown {
                            count: a.count,
                            success_rate: ratio(a.ok, a.count),
                            average_ms: mean(a.total_ms, a.count),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub requests: usize,
    pub successes: usize,
    pub failures: usize,
    pub error_rate: f64,
    pub average_response_ms: f64,
    pub images_returned: usize,
    /// Most recent quota reading, if any call reported one.
    pub quota_remaining: Option<u32>,
}

/// Per-provider summaries keyed by provider name.
pub fn summarize_providers<'a>(
    usage: impl IntoIterator<Item = &'a ProviderUsage>,
) -> BTreeMap<String, ProviderSummary> {
    let mut totals: BTreeMap<String, (ProviderSummary, u64)> = BTreeMap::new();

    for u in usage {
        let (s, total_ms) = totals.entry(u.call.provider.clone()).or_default();
        s.requests += 1;
        if u.call.success {
            s.successes += 1;
        } else {
            s.failures += 1;
        }
        s.images_returned += u.call.results;
        *total_ms += u.call.duration_ms;
        if u.call.quota_remaining.is_some() {
            s.quota_remaining = u.call.quota_remaining;
        }
    }

    totals
        .into_iter()
        .map(|(name, (mut s, total_ms))| {
            s.error_rate = ratio(s.failures, s.requests);
            s.average_response_ms = mean(total_ms, s.requests);
            (name, s)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub hits: usize,
    pub misses: usize,
    pub writes: usize,
    pub evictions: usize,
    pub clears: usize,
    pub hit_rate: f64,
}

impl CacheSummary {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a CacheEvent>) -> Self {
        let mut s = Self::default();
        for e in events {
            match e.outcome {
                CacheOutcome::Hit => s.hits += 1,
                CacheOutcome::Miss => s.misses += 1,
                CacheOutcome::Write => s.writes += 1,
                CacheOutcome::Eviction => s.evictions += 1,
                CacheOutcome::Clear => s.clears += 1,
            }
        }
        s.hit_rate = ratio(s.hits, s.hits + s.misses);
        s
    }

    pub fn lookups(&self) -> usize {
        self.hits + self.misses
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub total: usize,
    pub by_code: BTreeMap<String, usize>,
    pub by_component: BTreeMap<String, usize>,
    /// Newest first.
    pub recent: Vec<ErrorRecord>,
}

impl ErrorSummary {
    /// `records` must be oldest first.
    pub fn from_records<'a>(records: impl DoubleEndedIterator<Item = &'a ErrorRecord>) -> Self {
        let mut s = Self::default();
        for r in records.rev() {
            s.total += 1;
            *s.by_code.entry(r.code.to_string()).or_default() += 1;
            *s.by_component.entry(r.component.clone()).or_default() += 1;
            if s.recent.len() < RECENT_ERRORS {
                s.recent.push(r.clone());
            }
        }
        s
    }

    pub fn for_component(&self, component: &str) -> usize {
        self.by_component.get(component).copied().unwrap_or(0)
    }
}

/// Everything the metrics log knows about one trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window_secs: i64,
    pub performance: PerformanceSummary,
    pub providers: BTreeMap<String, ProviderSummary>,
    pub cache: CacheSummary,
    pub errors: ErrorSummary,
}
