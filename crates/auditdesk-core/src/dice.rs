//! Shared randomness
//!
//! One [`Dice`] per desk feeds every random draw: injected latency and
//! faults, check outcomes, and the seed dataset. A fixed seed makes a whole
//! desk reproducible.

use crate::config::DelayRange;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Thread-safe random source
#[derive(Debug)]
pub struct Dice {
    rng: Mutex<StdRng>,
}

impl Dice {
    /// Seeded from `seed`, or from OS entropy when `None`
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Deterministic dice
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    /// True with probability `p` (clamped to [0, 1])
    pub fn chance(&self, p: f64) -> bool {
        let p = p.clamp(0.0, 1.0);
        self.rng.lock().gen_bool(p)
    }

    /// Uniform draw from an inclusive delay range
    pub fn delay(&self, range: DelayRange) -> Duration {
        if range.min_ms >= range.max_ms {
            return Duration::from_millis(range.min_ms);
        }
        let ms = self.rng.lock().gen_range(range.min_ms..=range.max_ms);
        Duration::from_millis(ms)
    }

    /// Uniform draw from `0..n`; returns 0 when `n == 0`
    pub fn below(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.lock().gen_range(0..n)
    }

    /// Uniform draw from an inclusive integer range
    pub fn between(&self, low: i64, high: i64) -> i64 {
        if low >= high {
            return low;
        }
        self.rng.lock().gen_range(low..=high)
    }

    /// Pick one element
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.below(items.len()))
        }
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self::new(None)
    }
}
