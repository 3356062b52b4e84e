//! Sliding-window quota tracking.
//!
//! Every outbound request appends a [`QuotaWindowRecord`]; usage is the sum of
//! records inside the trailing window (one hour by default). Records are
//! pruned lazily whenever the window is consulted.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Length of the trailing quota window.
pub const QUOTA_WINDOW: Duration = Duration::from_secs(3600);

/// Usage recorded at a point in time.
#[derive(Debug, Clone, Copy)]
pub struct QuotaWindowRecord {
    pub at: Instant,
    pub count: u32,
}

/// Quota as last reported by the provider's response headers.
#[derive(Debug, Clone, Copy)]
struct ReportedQuota {
    remaining: u32,
    limit: Option<u32>,
    reset_at: Option<DateTime<Utc>>,
}

/// Snapshot returned by `quota()` on clients and providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaInfo {
    pub remaining: u32,
    pub total: u32,
    pub reset_at: DateTime<Utc>,
    /// `true` when the numbers were refined by provider response headers.
    pub provider_reported: bool,
}

/// Thread-safe sliding window over request counts.
#[derive(Debug)]
pub struct QuotaWindow {
    limit: u32,
    window: Duration,
    records: Mutex<VecDeque<QuotaWindowRecord>>,
    reported: Mutex<Option<ReportedQuota>>,
}

impl QuotaWindow {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, QUOTA_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            records: Mutex::new(VecDeque::new()),
            reported: Mutex::new(None),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn prune(&self, records: &mut VecDeque<QuotaWindowRecord>, now: Instant) {
        while let Some(front) = records.front() {
            if now.duration_since(front.at) >= self.window {
                records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Requests used within the trailing window.
    pub fn used(&self) -> u32 {
        let mut records = self.records.lock();
        self.prune(&mut records, Instant::now());
        records.iter().map(|r| r.count).sum()
    }

    /// Whether another request fits in the window.
    ///
    /// Reaching the limit blocks the next request: with a limit of 10, ten
    /// recorded requests already make this return `false`.
    pub fn can_proceed(&self) -> bool {
        if self.used() >= self.limit {
            return false;
        }

        // The provider knows better than our local count when it says zero.
        match *self.reported.lock() {
            Some(ReportedQuota {
                remaining: 0,
                reset_at: Some(reset_at),
                ..
            }) => reset_at <= Utc::now(),
            _ => true,
        }
    }

    pub fn record_usage(&self, count: u32) {
        let now = Instant::now();
        let mut records = self.records.lock();
        self.prune(&mut records, now);
        records.push_back(QuotaWindowRecord { at: now, count });
    }

    /// Time until the oldest record leaves the window, if any are held.
    pub fn time_until_slot(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut records = self.records.lock();
        self.prune(&mut records, now);
        records
            .front()
            .map(|oldest| (oldest.at + self.window).saturating_duration_since(now))
    }

    /// Refine the local view with numbers from provider response headers.
    pub fn update_reported(
        &self,
        remaining: u32,
        limit: Option<u32>,
        reset_at: Option<DateTime<Utc>>,
    ) {
        *self.reported.lock() = Some(ReportedQuota {
            remaining,
            limit,
            reset_at,
        });
    }

    pub fn info(&self) -> QuotaInfo {
        let used = self.used();
        let local_remaining = self.limit.saturating_sub(used);
        let local_reset = Utc::now()
            + chrono::Duration::from_std(self.time_until_slot().unwrap_or_default())
                .unwrap_or_else(|_| chrono::Duration::zero());

        match *self.reported.lock() {
            Some(reported) => QuotaInfo {
                remaining: local_remaining.min(reported.remaining),
                total: reported.limit.unwrap_or(self.limit),
                reset_at: reported.reset_at.unwrap_or(local_reset),
                provider_reported: true,
            },
            None => QuotaInfo {
                remaining: local_remaining,
                total: self.limit,
                reset_at: local_reset,
                provider_reported: false,
            },
        }
    }
}
