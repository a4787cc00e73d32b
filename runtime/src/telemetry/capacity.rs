//! Shared capacity score cell written by the sampler and read by pool sizing

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Shared estimate of spare system capacity, in load budget units.
///
/// One cell is created at startup and handed to both the sampler (writer) and
/// the sizer (reader). Each publish replaces the whole value in a single atomic
/// store, so readers always see the score of exactly one sampling cycle.
#[derive(Debug, Default)]
pub struct CapacityScore {
    score: AtomicU32,
    cycles: AtomicU64,
}

impl CapacityScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell seeded with a fixed score (no sampling cycle counted).
    pub fn with_score(score: u32) -> Self {
        Self {
            score: AtomicU32::new(score),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn get(&self) -> u32 {
        self.score.load(Ordering::Acquire)
    }

    pub fn publish(&self, score: u32) {
        self.score.store(score, Ordering::Release);
        self.cycles.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of sampling cycles published so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Score scaled down to a small worker multiplier.
    pub fn multiplier(&self, divisor: u32) -> u32 {
        self.get() / divisor.max(1)
    }
}
