use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Source of randomness for cooldown jitter and batch shuffling
///
/// Injected so tests can replay fixed sequences.
pub trait RandomSource: Send {
    /// Uniform value in [0, 1)
    fn unit(&mut self) -> f64;

    /// Uniform integer in [lo, hi]
    fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64;

    /// Uniform index in [0, len)
    fn index(&mut self, len: usize) -> usize;
}

/// `StdRng` backed source
pub struct ThreadRandom {
    rng: StdRng,
}

impl ThreadRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create with a seed for reproducibility
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ThreadRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ThreadRandom {
    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.gen_range(0..len)
    }
}

/// Replays a fixed list of unit values, cycling when exhausted
///
/// `range_inclusive` and `index` scale the next unit value into range, so
/// `0.0` always picks the low end.
pub struct SequenceRandom {
    values: VecDeque<f64>,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        assert!(!values.is_empty(), "SequenceRandom needs at least one value");
        Self {
            values: values.into(),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn unit(&mut self) -> f64 {
        let v = self.values.pop_front().unwrap_or(0.0);
        self.values.push_back(v);
        v.clamp(0.0, 0.999_999)
    }

    fn range_inclusive(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as f64;
        lo + (self.unit() * span) as u64
    }

    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.unit() * len as f64) as usize).min(len - 1)
    }
}
