//! Central proposal-number sequencer.
//!
//! Hands out strictly increasing proposal numbers starting at 1. With every
//! proposer fetching its number here, no two proposals ever collide.

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug)]
pub struct Sequencer {
    count: Mutex<u64>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
        }
    }

    /// The next proposal number, strictly greater than all earlier ones.
    pub fn next_proposal(&self) -> u64 {
        let mut count = self.count.lock();
        *count += 1;
        debug!(proposal = *count, "issued proposal number");
        *count
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}
