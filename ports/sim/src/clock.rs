//! Wall clock for the host

use std::time::Instant as StdInstant;

use hub_core::{Clock, Instant};

/// Milliseconds since the clock was created, wrapping like the hardware
/// tick counter
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: StdInstant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: StdInstant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Instant {
        // Truncation is the wraparound.
        Instant::from_millis(self.origin.elapsed().as_millis() as u32)
    }
}
