//! Deterministic per-person RNG.
//!
//! # Determinism strategy
//!
//! Each person owns an independent `SmallRng` seeded by
//! `person_id + seed_offset`.  All perturbations that belong to one person
//! (attribute noise at construction, acceleration noise, lane-change
//! sampling) draw from that person's RNG in a fixed order, so a run is
//! reproducible regardless of how work is distributed across threads.
//!
//! The `seed_offset` flag shifts every seed at once, giving a fresh but still
//! reproducible realization without touching the inputs.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::PersonId;

/// Per-person deterministic RNG.
///
/// The type is `Send` but deliberately not `Sync`: a person's RNG must only
/// ever be advanced by the thread currently updating that person.
pub struct PersonRng(SmallRng);

impl PersonRng {
    /// Seed deterministically from a person id and the configured offset.
    pub fn new(person: PersonId, seed_offset: u64) -> Self {
        PersonRng(SmallRng::seed_from_u64(u64::from(person.0) + seed_offset))
    }

    /// Uniform sample in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.0.r#gen()
    }

    /// Standard normal sample (mean 0, std-dev 1).
    #[inline]
    pub fn norm(&mut self) -> f64 {
        self.0.sample(StandardNormal)
    }

    /// `true` with probability `p` (values outside `[0, 1]` saturate).
    #[inline]
    pub fn p_true(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Sample an index with probability proportional to `weights[i]`.
    ///
    /// A zero-weight entry is never selected while any positive weight
    /// exists.  If all weights are zero the last index is returned.
    pub fn discrete(&mut self, weights: &[f64]) -> usize {
        let total: f64 = weights.iter().sum();
        let target = total * self.uniform();
        let mut sum = 0.0;
        for (i, w) in weights.iter().enumerate() {
            sum += w;
            if sum > target {
                return i;
            }
        }
        weights.len().saturating_sub(1)
    }

    /// Uniform sample in `[low, high)`.
    #[inline]
    pub fn range(&mut self, low: f64, high: f64) -> f64 {
        self.0.gen_range(low..high)
    }
}
