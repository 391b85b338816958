//! Cooperative cancellation carried in an operation's context

use core::cell::Cell;
use core::fmt;

use critical_section::Mutex;

use crate::{Error, HubResult};

/// Flag asking a running operation to stop early.
///
/// Nothing is interrupted from the outside. The operation checks the flag
/// on its next poll and finishes with [`Error::Canceled`]. The flag may be
/// set from interrupt context.
pub struct CancelFlag {
    requested: Mutex<Cell<bool>>,
}

impl CancelFlag {
    pub const fn new() -> Self {
        Self {
            requested: Mutex::new(Cell::new(false)),
        }
    }

    /// Ask the operation to stop
    pub fn request(&self) {
        critical_section::with(|cs| self.requested.borrow(cs).set(true));
    }

    pub fn is_requested(&self) -> bool {
        critical_section::with(|cs| self.requested.borrow(cs).get())
    }

    /// Withdraw a pending request
    pub fn clear(&self) {
        critical_section::with(|cs| self.requested.borrow(cs).set(false));
    }

    /// `Err(Canceled)` if a request is pending
    pub fn check(&self) -> HubResult<()> {
        if self.is_requested() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancelFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelFlag")
            .field("requested", &self.is_requested())
            .finish()
    }
}
