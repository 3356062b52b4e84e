//! Exponential backoff with pluggable jitter.

use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of the random component added to each backoff delay.
pub trait JitterSource: Send + Sync {
    /// A duration in `[0, upper]`.
    fn jitter(&self, upper: Duration) -> Duration;
}

/// Thread-local RNG jitter.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn jitter(&self, upper: Duration) -> Duration {
        let upper_ms = upper.as_millis() as u64;
        if upper_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=upper_ms))
    }
}

/// Reproducible jitter from a seeded RNG.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<StdRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl JitterSource for SeededJitter {
    fn jitter(&self, upper: Duration) -> Duration {
        let upper_ms = upper.as_millis() as u64;
        if upper_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.rng.lock().gen_range(0..=upper_ms))
    }
}

/// No jitter at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn jitter(&self, _upper: Duration) -> Duration {
        Duration::ZERO
    }
}

/// `min(base * 2^(attempt-1), max) + jitter(0..=max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration, max_jitter: Duration) -> Self {
        Self {
            base,
            max,
            max_jitter,
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (1-based).
    pub fn exponential(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max)
            .min(self.max)
    }

    pub fn delay_for(&self, attempt: u32, jitter: &dyn JitterSource) -> Duration {
        self.exponential(attempt) + jitter.jitter(self.max_jitter)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1000),
            max: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_then_caps() {
        let policy = BackoffPolicy::new(
            Duration::from_millis(100),
            Duration::from_millis(500),
            Duration::ZERO,
        );
        assert_eq!(policy.exponential(1), Duration::from_millis(100));
        assert_eq!(policy.exponential(2), Duration::from_millis(200));
        assert_eq!(policy.exponential(3), Duration::from_millis(400));
        assert_eq!(policy.exponential(4), Duration::from_millis(500));
        assert_eq!(policy.exponential(40), Duration::from_millis(500));
    }

    #[test]
    fn delays_are_non_decreasing_without_jitter() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..10 {
            let d = policy.delay_for(attempt, &NoJitter);
            assert!(d >= previous);
            assert!(d <= policy.max);
            previous = d;
        }
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = BackoffPolicy::default();
        let jitter = RandomJitter;
        for attempt in 1..5 {
            let d = policy.delay_for(attempt, &jitter);
            let floor = policy.exponential(attempt);
            assert!(d >= floor);
            assert!(d <= floor + policy.max_jitter);
        }
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        let upper = Duration::from_millis(1000);
        for _ in 0..5 {
            assert_eq!(a.jitter(upper), b.jitter(upper));
        }
    }
}
