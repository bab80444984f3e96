//! Russian-roulette thinning of undetected records.
//!
//! Records with no detected energy dominate the output of low-efficiency
//! camera geometries. The thinner keeps one of every `N` of them in a fixed
//! rotation, so each retained null record stands for `N` non-detections and
//! rates can be recovered by scaling. Detected records are always kept.

use crate::record::DetectionRecord;

/// Outcome of a thinning decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retain,
    Drop,
}

/// Deterministic keep-one-of-`N` policy for zero-energy records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouletteThinner {
    factor: u32,
    counter: u32,
}

impl Default for RouletteThinner {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RouletteThinner {
    /// Creates a thinner with factor `N`; values below 1 fall back to 1.
    #[must_use]
    pub fn new(factor: u32) -> Self {
        Self {
            factor: factor.max(1),
            counter: 1,
        }
    }

    /// Current factor `N`.
    #[must_use]
    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Current counter value (starts at 1).
    #[must_use]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Sets `N` and restarts the rotation. Values below 1 are ignored.
    pub fn set_factor(&mut self, factor: i64) {
        if let Ok(factor) = u32::try_from(factor) {
            if factor >= 1 {
                self.factor = factor;
                self.counter = 1;
            }
        }
    }

    /// Restarts the rotation.
    pub fn reset(&mut self) {
        self.counter = 1;
    }

    /// Decides the fate of one finalized record.
    pub fn decide(&mut self, record: &DetectionRecord) -> Verdict {
        if record.is_detected() {
            return Verdict::Retain;
        }
        if self.counter >= self.factor {
            self.counter = 1;
            Verdict::Retain
        } else {
            self.counter += 1;
            Verdict::Drop
        }
    }
}
