//! Publish cadence counter

use core::num::NonZeroU32;

use crate::constants::DEFAULT_PUBLISH_PERIOD;

/// Fires once every `period` accepted samples
///
/// The counter lives in `[0, period)`. Each [`tick`](Self::tick) advances
/// it by one; reaching `period` resets it to zero and fires in the same
/// step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishGate {
    count: u32,
    period: NonZeroU32,
}

impl PublishGate {
    /// Create a gate firing every `period` samples
    pub const fn new(period: NonZeroU32) -> Self {
        Self { count: 0, period }
    }

    /// Count one accepted sample, returning `true` when a publish is due
    pub fn tick(&mut self) -> bool {
        self.count += 1;

        if self.count == self.period.get() {
            self.count = 0;
            true
        } else {
            false
        }
    }

    /// Samples counted since the last publish
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Samples between publishes
    pub fn period(&self) -> u32 {
        self.period.get()
    }
}

impl Default for PublishGate {
    fn default() -> Self {
        match NonZeroU32::new(DEFAULT_PUBLISH_PERIOD) {
            Some(period) => Self::new(period),
            None => Self::new(NonZeroU32::MIN),
        }
    }
}
