//! Payload generation
//!
//! Values only need the right size; their content never affects results.
//! Callers generate the payload before starting the clock.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

pub struct PayloadGenerator {
    rng: StdRng,
    seed: Option<u64>,
}

impl PayloadGenerator {
    /// Random, non-reproducible content.
    pub fn new() -> Self {
        PayloadGenerator {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }

    /// Deterministic content for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        PayloadGenerator {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    pub fn from_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::with_seed(seed),
            None => Self::new(),
        }
    }

    /// Independent stream for one worker, derived from this generator's seed.
    pub fn for_worker(&self, worker: usize) -> Self {
        match self.seed {
            Some(seed) => {
                Self::with_seed(seed.wrapping_add((worker as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)))
            }
            None => Self::new(),
        }
    }

    /// Exactly `size` bytes.
    pub fn generate(&mut self, size: usize) -> Vec<u8> {
        let mut buf = vec![0u8; size];
        self.rng.fill_bytes(&mut buf);
        buf
    }
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}
