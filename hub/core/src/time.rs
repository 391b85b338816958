//! Millisecond time types and the monotonic clock abstraction

use core::cell::Cell;
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// Point in time on the wrapping millisecond clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Instant(u32);

impl Instant {
    /// Clock origin
    pub const ZERO: Self = Self(0);

    /// Create an instant from a raw millisecond count
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Get the raw millisecond count
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Add a duration, wrapping around the end of the counter
    pub const fn wrapping_add(self, duration: Duration) -> Self {
        Self(self.0.wrapping_add(duration.as_millis()))
    }

    /// Calculate elapsed time since an earlier instant (handles wraparound)
    pub const fn elapsed_since(self, earlier: Instant) -> Duration {
        Duration::from_millis(self.0.wrapping_sub(earlier.0))
    }

    /// Check whether `deadline` has been reached at this instant.
    ///
    /// Equal instants count as reached. Valid as long as the two instants
    /// are less than half the counter range apart.
    pub const fn has_passed(self, deadline: Instant) -> bool {
        self.0.wrapping_sub(deadline.0) < u32::MAX / 2
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        self.wrapping_add(rhs)
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        *self = self.wrapping_add(rhs);
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        self.elapsed_since(rhs)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Instant {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "t+{}ms", self.0);
    }
}

/// Duration in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    millis: u32,
}

impl Duration {
    /// Zero duration
    pub const ZERO: Self = Self { millis: 0 };

    /// Longest duration a [`Timer`](crate::Timer) can measure, half the
    /// counter range (about 24.8 days)
    pub const MAX: Self = Self {
        millis: u32::MAX / 2,
    };

    /// Create duration from milliseconds
    pub const fn from_millis(millis: u32) -> Self {
        Self { millis }
    }

    /// Create duration from seconds, saturating at `u32::MAX` milliseconds
    pub const fn from_secs(secs: u32) -> Self {
        Self {
            millis: secs.saturating_mul(1000),
        }
    }

    /// Convert to milliseconds
    pub const fn as_millis(&self) -> u32 {
        self.millis
    }

    /// Convert to whole seconds
    pub const fn as_secs(&self) -> u32 {
        self.millis / 1000
    }

    /// Check if duration is zero
    pub const fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// Clamp to [`Duration::MAX`]
    pub const fn capped(self) -> Self {
        if self.millis > Self::MAX.millis {
            Self::MAX
        } else {
            self
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.millis)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Duration {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}ms", self.millis);
    }
}

/// Macro to create compile-time durations
#[macro_export]
macro_rules! duration {
    ($value:literal ms) => {
        $crate::Duration::from_millis($value)
    };
    ($value:literal s) => {
        $crate::Duration::from_secs($value)
    };
}

/// Monotonic millisecond clock
pub trait Clock {
    /// Current instant
    fn now(&self) -> Instant;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Clock advanced by hand.
///
/// Used by tests and simulations that need deterministic time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u32>,
}

impl ManualClock {
    /// Create a clock reading zero
    pub const fn new() -> Self {
        Self { now: Cell::new(0) }
    }

    /// Create a clock reading the given instant
    pub const fn starting_at(instant: Instant) -> Self {
        Self {
            now: Cell::new(instant.as_millis()),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get().wrapping_add(duration.as_millis()));
    }

    /// Jump to an instant
    pub fn set(&self, instant: Instant) {
        self.now.set(instant.as_millis());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_millis(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_reached_across_wraparound() {
        let start = Instant::from_millis(u32::MAX - 5);
        let deadline = start + Duration::from_millis(10);
        assert_eq!(deadline.as_millis(), 4);

        assert!(!Instant::from_millis(u32::MAX).has_passed(deadline));
        assert!(Instant::from_millis(4).has_passed(deadline));
        assert!(Instant::from_millis(100).has_passed(deadline));
    }

    #[test]
    fn elapsed_wraps() {
        let earlier = Instant::from_millis(u32::MAX - 1);
        let later = Instant::from_millis(3);
        assert_eq!(later - earlier, Duration::from_millis(5));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        clock.advance(duration!(2 s));
        assert_eq!(clock.now(), Instant::from_millis(2000));
        clock.set(Instant::from_millis(7));
        assert_eq!((&clock).now().as_millis(), 7);
    }

    #[test]
    fn large_seconds_saturate() {
        assert_eq!(Duration::from_secs(u32::MAX).as_millis(), u32::MAX);
        assert_eq!(Duration::from_secs(4_294_968).capped(), Duration::MAX);
        assert_eq!(duration!(5 s).capped(), Duration::from_millis(5000));
    }

    #[test]
    fn max_duration_deadline_is_ahead_of_start() {
        let start = Instant::from_millis(123);
        let deadline = start + Duration::MAX;
        assert!(!start.has_passed(deadline));
        assert!(deadline.has_passed(deadline));
    }
}
