//! Interval timer used by every suspension point

use crate::{Clock, Duration, Instant};

/// Millisecond interval timer.
///
/// A timer never rearms on its own. Repeating intervals are built by calling
/// [`Timer::extend`] (or [`Timer::advance`]) after each expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timer {
    start: Instant,
    duration: Duration,
}

impl Timer {
    /// Timer that is already expired
    pub const fn new() -> Self {
        Self {
            start: Instant::ZERO,
            duration: Duration::ZERO,
        }
    }

    /// Timer with a preset duration that starts counting from the clock origin
    pub const fn with_duration(duration: Duration) -> Self {
        Self {
            start: Instant::ZERO,
            duration: duration.capped(),
        }
    }

    /// Record the current instant and the duration to wait for.
    ///
    /// The clock wraps, so a timer can measure at most [`Duration::MAX`],
    /// half the counter range. Longer durations are cut to that limit.
    pub fn start(&mut self, clock: &(impl Clock + ?Sized), duration: Duration) {
        self.start = clock.now();
        self.duration = duration.capped();
    }

    /// True iff the current time is at or beyond `start + duration`
    pub fn is_expired(&self, clock: &(impl Clock + ?Sized)) -> bool {
        clock.now().has_passed(self.deadline())
    }

    /// Rearm with the same duration, measured from now
    pub fn extend(&mut self, clock: &(impl Clock + ?Sized)) {
        self.start = clock.now();
    }

    /// Rearm with the same duration, measured from the previous deadline.
    ///
    /// Keeps a fixed-rate schedule even when expiry is observed late.
    pub fn advance(&mut self) {
        self.start += self.duration;
    }

    /// Instant at which the timer expires
    pub fn deadline(&self) -> Instant {
        self.start + self.duration
    }

    /// Configured duration
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Instant the current interval started
    pub fn started_at(&self) -> Instant {
        self.start
    }
}
