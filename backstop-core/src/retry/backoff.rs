//! Backoff schedule
//!
//! Exponential delays with symmetric jitter and a fixed floor:
//!
//! ```text
//! exponential = min(base_delay * 2^n, max_delay)
//! jitter      = exponential * 0.25 * (uniform() - 0.5)
//! delay       = max(100ms, exponential + jitter)
//! ```
//!
//! The random source is injected so tests can pin the jitter.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::RetryConfig;
use crate::utils::lock::lock;

/// Lower bound for any scheduled retry delay.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Total jitter spread as a fraction of the exponential delay (±12.5%).
pub const JITTER_SPREAD: f64 = 0.25;

/// Source of uniform samples in `[0, 1)` used for jitter.
pub trait JitterSource: Send + Sync + fmt::Debug {
    fn sample(&self) -> f64;
}

/// Thread-local RNG jitter (default).
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..1.0)
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
    fn sample(&self) -> f64 {
        lock(&self.rng).gen_range(0.0..1.0)
    }
}

/// Constant sample; `FixedJitter(0.5)` disables jitter entirely.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Delay calculator for one retry configuration.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    base_delay: Duration,
    max_delay: Duration,
    jitter: Arc<dyn JitterSource>,
}

impl BackoffSchedule {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            jitter: Arc::new(ThreadRngJitter),
        }
    }

    /// Replace the random source.
    pub fn with_jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    /// Un-jittered delay before the attempt following `attempt` prior ones.
    pub fn exponential(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        // 2^63 already exceeds any representable millisecond delay.
        let exp_ms = (base_ms * 2f64.powi(attempt.min(63) as i32)).min(max_ms);
        Duration::from_millis(exp_ms as u64)
    }

    /// Jittered delay, never below [`MIN_RETRY_DELAY`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let sample = self.jitter.sample().clamp(0.0, 1.0);
        self.jittered(attempt, sample)
    }

    /// Smallest delay [`delay_for`](Self::delay_for) can produce for `attempt`.
    pub fn earliest(&self, attempt: u32) -> Duration {
        self.jittered(attempt, 0.0)
    }

    /// Largest delay [`delay_for`](Self::delay_for) can produce for `attempt`.
    pub fn latest(&self, attempt: u32) -> Duration {
        self.jittered(attempt, 1.0)
    }

    fn jittered(&self, attempt: u32, sample: f64) -> Duration {
        let exp_ms = self.exponential(attempt).as_millis() as f64;
        let jitter_ms = exp_ms * JITTER_SPREAD * (sample - 0.5);
        Duration::from_millis((exp_ms + jitter_ms).max(0.0) as u64).max(MIN_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn schedule(base_ms: u64, max_ms: u64, sample: f64) -> BackoffSchedule {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_millis(base_ms))
            .with_max_delay(Duration::from_millis(max_ms));
        BackoffSchedule::new(&config).with_jitter(Arc::new(FixedJitter(sample)))
    }

    #[test]
    fn test_delay_calculation() {
        let s = schedule(1000, 8000, 0.5);
        assert_eq!(s.delay_for(0), Duration::from_millis(1000));
        assert_eq!(s.delay_for(1), Duration::from_millis(2000));
        assert_eq!(s.delay_for(2), Duration::from_millis(4000));
        assert_eq!(s.delay_for(3), Duration::from_millis(8000));
        assert_eq!(s.delay_for(10), Duration::from_millis(8000));
    }

    #[test]
    fn jitter_extremes_are_twelve_and_a_half_percent() {
        let s = schedule(1000, 8000, 0.5);
        assert_eq!(s.earliest(0), Duration::from_millis(875));
        assert_eq!(s.latest(0), Duration::from_millis(1125));
        assert_eq!(s.latest(5), Duration::from_millis(9000));
    }

    #[test]
    fn floor_applies_to_tiny_delays() {
        let s = schedule(10, 50, 0.0);
        assert_eq!(s.delay_for(0), MIN_RETRY_DELAY);
        assert_eq!(s.delay_for(3), MIN_RETRY_DELAY);
    }

    #[test]
    fn huge_attempt_index_saturates_at_max() {
        let s = schedule(1000, 8000, 0.5);
        assert_eq!(s.exponential(u32::MAX), Duration::from_millis(8000));
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        for _ in 0..16 {
            let x = a.sample();
            assert_eq!(x, b.sample());
            assert!((0.0..1.0).contains(&x));
        }
    }

    proptest! {
        #[test]
        fn delay_stays_within_bounds(
            base in 1u64..5_000,
            extra in 0u64..60_000,
            attempt in 0u32..40,
            seed in any::<u64>(),
        ) {
            let max = base + extra;
            let config = RetryConfig::new()
                .with_base_delay(Duration::from_millis(base))
                .with_max_delay(Duration::from_millis(max));
            let s = BackoffSchedule::new(&config).with_jitter(Arc::new(SeededJitter::new(seed)));
            let delay = s.delay_for(attempt);
            let upper = Duration::from_millis(((max as f64) * 1.125).ceil() as u64)
                .max(MIN_RETRY_DELAY);
            prop_assert!(delay >= MIN_RETRY_DELAY);
            prop_assert!(delay <= upper);
        }

        #[test]
        fn unjittered_delay_is_non_decreasing(
            base in 1u64..5_000,
            extra in 0u64..60_000,
            attempt in 0u32..39,
        ) {
            let s = schedule(base, base + extra, 0.5);
            prop_assert!(s.delay_for(attempt) <= s.delay_for(attempt + 1));
        }
    }
}
