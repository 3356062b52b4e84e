//! Structured, time-windowed event log.
//!
//! [`MetricsLog`] keeps two kinds of state:
//!
//! - a bounded ring buffer of [`LogEntry`] values (oldest dropped past
//!   capacity), each mirrored to `tracing` at the matching level;
//! - time-stamped collections of operation timings, provider calls, cache
//!   outcomes, and errors. These are only ever read through a trailing
//!   window (`timestamp >= now - window`) and pruned by [`MetricsLog::cleanup`].

pub mod records;
pub mod summary;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use agrimedia_common::{MediaError, OperationId, Provenance};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

pub use records::{
    CacheEvent, CacheOutcome, ErrorRecord, LogContext, LogEntry, LogLevel, OperationRecord,
    ProviderCall, ProviderUsage,
};
pub use summary::{
    CacheSummary, ErrorSummary, MetricsSnapshot, OperationBreakdown, PerformanceSummary,
    ProviderSummary,
};

use crate::cache::{EvictionObserver, EvictionReason};
use crate::clock::Clock;
use crate::config::MonitoringConfig;

trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! timestamped {
    ($($ty:ty),*) => {
        $(impl Timestamped for $ty {
            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        })*
    };
}

timestamped!(LogEntry, OperationRecord, ProviderUsage, CacheEvent, ErrorRecord);

/// Records appended in time order; newest at the back.
struct Series<T>(RwLock<VecDeque<T>>);

impl<T: Timestamped + Clone> Series<T> {
    fn new() -> Self {
        Self(RwLock::new(VecDeque::new()))
    }

    fn push(&self, item: T) {
        self.0.write().push_back(item);
    }

    fn since(&self, cutoff: DateTime<Utc>) -> Vec<T> {
        self.0
            .read()
            .iter()
            .filter(|r| r.timestamp() >= cutoff)
            .cloned()
            .collect()
    }

    fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut items = self.0.write();
        let before = items.len();
        items.retain(|r| r.timestamp() >= cutoff);
        before - items.len()
    }

    fn len(&self) -> usize {
        self.0.read().len()
    }
}

struct PendingOperation {
    name: String,
    component: String,
    started_at: DateTime<Utc>,
}

/// In-memory metrics and structured event log.
pub struct MetricsLog {
    clock: Arc<dyn Clock>,
    capacity: usize,
    entries: RwLock<VecDeque<LogEntry>>,
    pending: Mutex<HashMap<OperationId, PendingOperation>>,
    operations: Series<OperationRecord>,
    provider_usage: Series<ProviderUsage>,
    cache_events: Series<CacheEvent>,
    errors: Series<ErrorRecord>,
}

impl MetricsLog {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
            pending: Mutex::new(HashMap::new()),
            operations: Series::new(),
            provider_usage: Series::new(),
            cache_events: Series::new(),
            errors: Series::new(),
        }
    }

    pub fn from_config(config: &MonitoringConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.log_capacity, clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // -- Structured entries ---------------------------------------------------

    /// Append a structured entry and mirror it to `tracing`.
    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        context: LogContext,
        metadata: BTreeMap<String, serde_json::Value>,
        duration_ms: Option<u64>,
    ) {
        let entry = LogEntry {
            timestamp: self.clock.now(),
            level,
            message: message.into(),
            context,
            metadata,
            duration_ms,
        };
        mirror(&entry);

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn info(&self, context: LogContext, message: impl Into<String>) {
        self.log(LogLevel::Info, message, context, BTreeMap::new(), None);
    }

    pub fn warn(&self, context: LogContext, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, context, BTreeMap::new(), None);
    }

    pub fn error(&self, context: LogContext, message: impl Into<String>) {
        self.log(LogLevel::Error, message, context, BTreeMap::new(), None);
    }

    /// The `n` most recent entries, newest first.
    pub fn recent_entries(&self, n: usize) -> Vec<LogEntry> {
        self.entries.read().iter().rev().take(n).cloned().collect()
    }

    /// Entries inside the trailing window, oldest first.
    pub fn entries_within(&self, window: Duration) -> Vec<LogEntry> {
        let cutoff = self.clock.now() - window;
        self.entries
            .read()
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    // -- Operation timing -----------------------------------------------------

    pub fn start_operation(
        &self,
        component: impl Into<String>,
        name: impl Into<String>,
    ) -> OperationId {
        let id = OperationId::new();
        self.pending.lock().insert(
            id,
            PendingOperation {
                name: name.into(),
                component: component.into(),
                started_at: self.clock.now(),
            },
        );
        id
    }

    /// Close an operation opened by [`start_operation`](Self::start_operation).
    /// Returns the duration in milliseconds, or `None` for an unknown id.
    pub fn end_operation(&self, id: OperationId, success: bool) -> Option<u64> {
        self.end_operation_with(id, success, BTreeMap::new())
    }

    pub fn end_operation_with(
        &self,
        id: OperationId,
        success: bool,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Option<u64> {
        let Some(op) = self.pending.lock().remove(&id) else {
            warn!(operation_id = %id, "end_operation called for unknown operation");
            return None;
        };

        let now = self.clock.now();
        let duration_ms = (now - op.started_at).num_milliseconds().max(0) as u64;

        self.operations.push(OperationRecord {
            timestamp: now,
            name: op.name.clone(),
            component: op.component.clone(),
            duration_ms,
            success,
        });

        let (level, verb) = if success {
            (LogLevel::Debug, "completed")
        } else {
            (LogLevel::Warn, "failed")
        };
        self.log(
            level,
            format!("{} {verb}", op.name),
            LogContext::new(op.component, op.name),
            metadata,
            Some(duration_ms),
        );

        Some(duration_ms)
    }

    // -- Event collections ----------------------------------------------------

    pub fn record_provider_usage(&self, call: ProviderCall) {
        self.provider_usage.push(ProviderUsage {
            timestamp: self.clock.now(),
            call,
        });
    }

    pub fn record_cache_operation(
        &self,
        key: impl Into<String>,
        outcome: CacheOutcome,
        provenance: Option<Provenance>,
    ) {
        self.cache_events.push(CacheEvent {
            timestamp: self.clock.now(),
            key: key.into(),
            outcome,
            provenance,
        });
    }

    /// Record `err` and write a matching error-level entry.
    pub fn record_error(
        &self,
        component: &str,
        operation: &str,
        provider: Option<&str>,
        err: &MediaError,
    ) {
        let class = err.classify();
        self.errors.push(ErrorRecord {
            timestamp: self.clock.now(),
            component: component.to_string(),
            operation: operation.to_string(),
            code: class.code,
            message: err.to_string(),
            provider: provider.map(str::to_string),
        });

        let mut context = LogContext::new(component, operation);
        if let Some(p) = provider {
            context = context.with_provider(p);
        }
        let mut metadata = BTreeMap::new();
        metadata.insert("code".to_string(), serde_json::json!(class.code));
        metadata.insert("retryable".to_string(), serde_json::json!(class.retryable));
        self.log(LogLevel::Error, err.to_string(), context, metadata, None);
    }

    // -- Windowed aggregations ------------------------------------------------

    fn cutoff(&self, window: Duration) -> DateTime<Utc> {
        self.clock.now() - window
    }

    pub fn performance_summary(&self, window: Duration) -> PerformanceSummary {
        PerformanceSummary::from_records(&self.operations.since(self.cutoff(window)))
    }

    pub fn provider_summary(&self, window: Duration) -> BTreeMap<String, ProviderSummary> {
        summary::summarize_providers(&self.provider_usage.since(self.cutoff(window)))
    }

    pub fn cache_summary(&self, window: Duration) -> CacheSummary {
        CacheSummary::from_events(&self.cache_events.since(self.cutoff(window)))
    }

    pub fn error_summary(&self, window: Duration) -> ErrorSummary {
        ErrorSummary::from_records(self.errors.since(self.cutoff(window)).iter())
    }

    pub fn snapshot(&self, window: Duration) -> MetricsSnapshot {
        MetricsSnapshot {
            generated_at: self.clock.now(),
            window_secs: window.num_seconds(),
            performance: self.performance_summary(window),
            providers: self.provider_summary(window),
            cache: self.cache_summary(window),
            errors: self.error_summary(window),
        }
    }

    /// Drop everything older than `max_age`, including operations that were
    /// started but never ended. Returns how many records were removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = self.cutoff(max_age);

        let mut removed = self.operations.prune_before(cutoff)
            + self.provider_usage.prune_before(cutoff)
            + self.cache_events.prune_before(cutoff)
            + self.errors.prune_before(cutoff);

        {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|e| e.timestamp() >= cutoff);
            removed += before - entries.len();
        }
        {
            let mut pending = self.pending.lock();
            let before = pending.len();
            pending.retain(|_, op| op.started_at >= cutoff);
            removed += before - pending.len();
        }

        if removed > 0 {
            debug!(removed, "Pruned old metrics");
        }
        removed
    }

    /// Total records currently held across every collection.
    pub fn record_count(&self) -> usize {
        self.entries.read().len()
            + self.operations.len()
            + self.provider_usage.len()
            + self.cache_events.len()
            + self.errors.len()
    }
}

impl EvictionObserver for MetricsLog {
    fn on_evict(&self, key: &str, reason: EvictionReason) {
        let outcome = match reason {
            EvictionReason::Cleared => CacheOutcome::Clear,
            _ => CacheOutcome::Eviction,
        };
        self.record_cache_operation(key, outcome, None);
    }
}

fn mirror(entry: &LogEntry) {
    let component = entry.context.component.as_str();
    let operation = entry.context.operation.as_str();
    let provider = entry.context.provider.as_deref();
    let message = entry.message.as_str();
    match entry.level {
        LogLevel::Debug => {
            debug!(component, operation, provider, duration_ms = entry.duration_ms, "{message}")
        }
        LogLevel::Info => {
            info!(component, operation, provider, duration_ms = entry.duration_ms, "{message}")
        }
        LogLevel::Warn => {
            warn!(component, operation, provider, duration_ms = entry.duration_ms, "{message}")
        }
        LogLevel::Error => {
            error!(component, operation, provider, duration_ms = entry.duration_ms, "{message}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{BoundedCache, EvictionPolicy};
    use crate::clock::ManualClock;
    use agrimedia_common::ErrorCode;

    fn log(capacity: usize) -> (MetricsLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (MetricsLog::new(capacity, clock.clone()), clock)
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let (log, _) = log(3);
        for i in 0..5 {
            log.info(LogContext::new("test", "fill"), format!("entry {i}"));
        }
        let recent = log.recent_entries(10);
        let messages: Vec<_> = recent.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["entry 4", "entry 3", "entry 2"]);
    }

    #[test]
    fn zero_capacity_keeps_no_entries() {
        let (log, _) = log(0);
        log.info(LogContext::new("test", "fill"), "dropped");
        assert!(log.recent_entries(10).is_empty());
    }

    #[test]
    fn operation_timing() {
        let (log, clock) = log(10);
        let id = log.start_operation("service", "get_theme_image");
        clock.advance(Duration::milliseconds(250));
        assert_eq!(log.end_operation(id, true), Some(250));
        assert_eq!(log.end_operation(id, true), None);

        let failed = log.start_operation("service", "get_theme_image");
        clock.advance(Duration::milliseconds(750));
        log.end_operation(failed, false);

        let perf = log.performance_summary(Duration::minutes(5));
        assert_eq!(perf.total_operations, 2);
        let op = &perf.by_operation["get_theme_image"];
        assert!((op.success_rate - 0.5).abs() < 1e-9);
        assert!((op.average_ms - 500.0).abs() < 1e-9);

        let last = &log.recent_entries(1)[0];
        assert_eq!(last.level, LogLevel::Warn);
        assert_eq!(last.duration_ms, Some(750));
    }

    #[test]
    fn aggregations_respect_window() {
        let (log, clock) = log(10);
        log.record_provider_usage(ProviderCall::failed(
            "unsplash",
            "search",
            100,
            ErrorCode::NetworkError,
        ));
        log.record_cache_operation("theme:a", CacheOutcome::Miss, None);
        clock.advance(Duration::minutes(20));
        log.record_provider_usage(ProviderCall::succeeded("unsplash", "search", 100, 3));
        log.record_cache_operation("theme:a", CacheOutcome::Hit, Some(Provenance::Unsplash));

        let window = Duration::minutes(10);
        let providers = log.provider_summary(window);
        assert_eq!(providers["unsplash"].requests, 1);
        assert_eq!(providers["unsplash"].error_rate, 0.0);
        assert_eq!(log.cache_summary(window).hit_rate, 1.0);

        let wide = Duration::hours(1);
        assert_eq!(log.provider_summary(wide)["unsplash"].requests, 2);
        assert!((log.cache_summary(wide).hit_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn errors_are_classified() {
        let (log, _) = log(10);
        log.record_error(
            "service",
            "get_category_images",
            Some("pexels"),
            &MediaError::AuthenticationFailed {
                provider: "pexels".into(),
                status: 401,
            },
        );
        log.record_error(
            "attribution",
            "get_category_images",
            Some("pexels"),
            &MediaError::validation("missing photographer"),
        );

        let errors = log.error_summary(Duration::minutes(5));
        assert_eq!(errors.total, 2);
        assert_eq!(errors.by_code["authentication_failed"], 1);
        assert_eq!(errors.for_component("attribution"), 1);
        assert_eq!(errors.recent[0].component, "attribution");
        assert_eq!(errors.recent[0].code, ErrorCode::ValidationError);
        assert_eq!(log.recent_entries(1)[0].level, LogLevel::Error);
    }

    #[test]
    fn cleanup_prunes_old_records() {
        let (log, clock) = log(10);
        log.record_cache_operation("a", CacheOutcome::Write, None);
        log.info(LogContext::new("test", "old"), "old");
        let _abandoned = log.start_operation("service", "preload");
        clock.advance(Duration::hours(2));
        log.record_cache_operation("b", CacheOutcome::Write, None);

        assert_eq!(log.cleanup(Duration::hours(1)), 3);
        assert_eq!(log.cache_summary(Duration::hours(24)).writes, 1);
        assert_eq!(log.cleanup(Duration::hours(1)), 0);
    }

    #[test]
    fn observes_cache_evictions() {
        let clock = Arc::new(ManualClock::default());
        let log = Arc::new(MetricsLog::new(10, clock.clone()));
        let cache: BoundedCache<u8> = BoundedCache::new(
            1,
            std::time::Duration::from_secs(60),
            EvictionPolicy::Lru,
            clock,
        );
        cache.subscribe(log.clone());

        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.clear();

        let summary = log.cache_summary(Duration::minutes(1));
        assert_eq!(summary.evictions, 1);
        assert_eq!(summary.clears, 1);
    }
}
