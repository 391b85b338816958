//! The resumable operation contract and its generic building blocks.
//!
//! An [`Operation`] value is its own state token: an enum (or struct) naming
//! the point where execution resumes plus the locals needed there. The caller
//! owns the token, constructs it in its initial state exactly once before the
//! first poll, and polls it until it yields a terminal result. Starting a new
//! invocation means resetting the token.
//!
//! Nested operations compose by forwarding. The outer operation stores the
//! inner token in its own state and uses [`ready!`] on the inner poll, so it
//! stays pending exactly as long as the inner one does:
//!
//! ```
//! use hub_core::{ready, AwaitMs, Duration, ManualClock, Operation, Status};
//!
//! enum Blink {
//!     On(AwaitMs),
//!     Off(AwaitMs),
//! }
//!
//! impl Operation<ManualClock> for Blink {
//!     type Output = ();
//!
//!     fn poll(&mut self, clock: &mut ManualClock) -> Status {
//!         loop {
//!             match self {
//!                 Blink::On(wait) => {
//!                     ready!(wait.poll(clock))?;
//!                     *self = Blink::Off(AwaitMs::new(Duration::from_millis(5)));
//!                 }
//!                 Blink::Off(wait) => return wait.poll(clock),
//!             }
//!         }
//!     }
//! }
//! ```

use core::task::Poll;

pub use core::task::ready;

use crate::{Clock, Duration, HubResult, Status, Timer};

/// A function that is polled until it produces a terminal result.
///
/// Each call must do a bounded amount of work and must not block. Waits are
/// expressed by returning [`Poll::Pending`] after arranging a condition that
/// can be checked on the next call. Side effects already performed must not
/// be repeated when resuming.
pub trait Operation<Cx: ?Sized> {
    /// Value produced on successful completion
    type Output;

    /// Advance the operation by one step
    fn poll(&mut self, cx: &mut Cx) -> Status<Self::Output>;

    /// Re-initialize the token for a new invocation
    fn reset(&mut self)
    where
        Self: Default,
    {
        *self = Self::default();
    }
}

/// Waits until a duration has elapsed.
///
/// The timer starts on the first poll, not at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwaitMs {
    duration: Duration,
    timer: Option<Timer>,
}

impl AwaitMs {
    pub const fn new(duration: Duration) -> Self {
        Self {
            duration,
            timer: None,
        }
    }

    pub fn poll_with(&mut self, clock: &(impl Clock + ?Sized)) -> Status {
        let duration = self.duration;
        let timer = self.timer.get_or_insert_with(|| {
            let mut timer = Timer::new();
            timer.start(clock, duration);
            timer
        });

        if timer.is_expired(clock) {
            Poll::Ready(Ok(()))
        } else {
            Poll::Pending
        }
    }

    /// Forget the running interval so the next poll starts it again
    pub fn restart(&mut self) {
        self.timer = None;
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl<Cx: Clock + ?Sized> Operation<Cx> for AwaitMs {
    type Output = ();

    fn poll(&mut self, cx: &mut Cx) -> Status {
        self.poll_with(&*cx)
    }
}

/// Result of a [`Race`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner<A, B> {
    First(A),
    Second(B),
}

/// Polls two operations until either completes.
///
/// The second operation is only polled while the first is pending. The
/// operation that loses is left where it stopped; no cleanup is attempted.
#[derive(Debug, Default)]
pub struct Race<A, B> {
    first: A,
    second: B,
}

impl<A, B> Race<A, B> {
    pub const fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<Cx, A, B> Operation<Cx> for Race<A, B>
where
    Cx: ?Sized,
    A: Operation<Cx>,
    B: Operation<Cx>,
{
    type Output = Winner<A::Output, B::Output>;

    fn poll(&mut self, cx: &mut Cx) -> Status<Self::Output> {
        if let Poll::Ready(result) = self.first.poll(cx) {
            return Poll::Ready(result.map(Winner::First));
        }
        self.second.poll(cx).map_ok(Winner::Second)
    }
}

/// Yields exactly once.
///
/// Lets other processes run before continuing, for example while several
/// processes wait on each other to finish initializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YieldOnce {
    yielded: bool,
}

impl YieldOnce {
    pub const fn new() -> Self {
        Self { yielded: false }
    }
}

impl<Cx: ?Sized> Operation<Cx> for YieldOnce {
    type Output = ();

    fn poll(&mut self, _cx: &mut Cx) -> Status {
        if self.yielded {
            Poll::Ready(Ok(()))
        } else {
            self.yielded = true;
            Poll::Pending
        }
    }
}

/// Placeholder operation that never completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Idle;

impl<Cx: ?Sized> Operation<Cx> for Idle {
    type Output = ();

    fn poll(&mut self, _cx: &mut Cx) -> Status {
        Poll::Pending
    }
}

/// Operation that always finishes with a fixed result on its first poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Immediate(pub HubResult<()>);

impl Default for Immediate {
    fn default() -> Self {
        Self(Ok(()))
    }
}

impl<Cx: ?Sized> Operation<Cx> for Immediate {
    type Output = ();

    fn poll(&mut self, _cx: &mut Cx) -> Status {
        Poll::Ready(self.0)
    }
}

/// Operation backed by a closure.
///
/// The closure captures whatever state it needs to resume; it is called
/// once per poll.
pub struct FnOperation<F>(F);

/// Wrap a closure as an [`Operation`]
pub fn from_fn<Cx, T, F>(f: F) -> FnOperation<F>
where
    Cx: ?Sized,
    F: FnMut(&mut Cx) -> Status<T>,
{
    FnOperation(f)
}

impl<Cx, T, F> Operation<Cx> for FnOperation<F>
where
    Cx: ?Sized,
    F: FnMut(&mut Cx) -> Status<T>,
{
    type Output = T;

    fn poll(&mut self, cx: &mut Cx) -> Status<T> {
        (self.0)(cx)
    }
}
