//! Poll request flag shared between interrupt handlers and the main loop

use core::cell::Cell;
use core::fmt;

use critical_section::{CriticalSection, Mutex};

/// Latched "something happened, poll the processes" flag.
///
/// Any context may call [`PollSignal::request`], including interrupt
/// handlers. The scheduler consumes the flag with [`PollSignal::take`].
pub struct PollSignal {
    requested: Mutex<Cell<bool>>,
}

impl PollSignal {
    pub const fn new() -> Self {
        Self {
            requested: Mutex::new(Cell::new(false)),
        }
    }

    /// Request that all processes be polled on the next scheduler pass
    pub fn request(&self) {
        critical_section::with(|cs| self.requested.borrow(cs).set(true));
    }

    /// Read and clear the flag
    pub fn take(&self) -> bool {
        critical_section::with(|cs| self.requested.borrow(cs).replace(false))
    }

    pub fn is_pending(&self) -> bool {
        critical_section::with(|cs| self.is_pending_in(cs))
    }

    /// Check the flag from inside an already entered critical section
    pub fn is_pending_in(&self, cs: CriticalSection<'_>) -> bool {
        self.requested.borrow(cs).get()
    }
}

impl Default for PollSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PollSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollSignal")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Global poll request flag used by the platform tick and drivers
pub static POLL: PollSignal = PollSignal::new();

/// Request that all processes be polled
pub fn request_poll() {
    POLL.request();
}
