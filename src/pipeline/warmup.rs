//! Per-connection warm-up suppression
//!
//! Devices often print garbage or half-initialised readings right after the
//! port opens. The first `n` non-empty samples of each connection are shown in
//! the raw log but never reach the sliding window or the recorder.

use crate::types::Sample;

/// Counts down the samples still to be discarded in this session
#[derive(Debug, Clone)]
pub struct WarmupFilter {
    initial: u32,
    remaining: u32,
}

impl WarmupFilter {
    pub fn new(samples: u32) -> Self {
        Self {
            initial: samples,
            remaining: samples,
        }
    }

    /// Restart the countdown (once per successful connect)
    pub fn reset(&mut self) {
        self.remaining = self.initial;
    }

    /// Decide whether a sample may be stored
    ///
    /// Empty samples are never admitted and do not consume warm-up budget.
    pub fn admit(&mut self, sample: &Sample) -> bool {
        if sample.is_empty() {
            return false;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return false;
        }
        true
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_warming_up(&self) -> bool {
        self.remaining > 0
    }
}
