//! Operation contract tests for hub-core
//! These tests run on the host with std, but exercise the no_std code paths

use core::task::Poll;

use hub_core::{
    from_fn, ready, AwaitMs, CancelFlag, Duration, Error, Idle, Immediate, ManualClock, Operation,
    Race, Status, Winner, YieldOnce,
};

/// Finishes with `value` on the `polls`-th poll
#[derive(Debug, Default)]
struct CountDown {
    remaining: u32,
    value: u32,
    polled: u32,
}

impl CountDown {
    fn new(polls: u32, value: u32) -> Self {
        Self {
            remaining: polls,
            value,
            polled: 0,
        }
    }
}

impl<Cx: ?Sized> Operation<Cx> for CountDown {
    type Output = u32;

    fn poll(&mut self, _cx: &mut Cx) -> Status<u32> {
        self.polled += 1;
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            Poll::Ready(Ok(self.value))
        } else {
            Poll::Pending
        }
    }
}

/// Forwards to an inner count down, then doubles its result
enum Doubler {
    Waiting(CountDown),
    Done,
}

impl Operation<()> for Doubler {
    type Output = u32;

    fn poll(&mut self, cx: &mut ()) -> Status<u32> {
        match self {
            Doubler::Waiting(inner) => {
                let value = ready!(inner.poll(cx))?;
                *self = Doubler::Done;
                Poll::Ready(Ok(value * 2))
            }
            Doubler::Done => Poll::Ready(Err(Error::InvalidOperation)),
        }
    }
}

#[test]
fn outer_forwards_pending_until_inner_completes() {
    let mut outer = Doubler::Waiting(CountDown::new(3, 21));
    let mut polls = 0;

    let result = loop {
        polls += 1;
        if let Poll::Ready(result) = outer.poll(&mut ()) {
            break result;
        }
    };

    assert_eq!(polls, 3);
    assert_eq!(result, Ok(42));
}

#[test]
fn outer_propagates_inner_error() {
    let mut failing = from_fn(|_: &mut ()| -> Status<u32> { Poll::Ready(Err(Error::Io)) });
    let mut outer = from_fn(|cx: &mut ()| -> Status<u32> {
        let value = ready!(failing.poll(cx))?;
        Poll::Ready(Ok(value + 1))
    });

    assert_eq!(outer.poll(&mut ()), Poll::Ready(Err(Error::Io)));
}

#[test]
fn await_ms_waits_from_first_poll() {
    let mut clock = ManualClock::new();
    let mut wait = AwaitMs::new(Duration::from_millis(3));

    clock.advance(Duration::from_millis(100));
    assert_eq!(wait.poll(&mut clock), Poll::Pending);

    clock.advance(Duration::from_millis(2));
    assert_eq!(wait.poll(&mut clock), Poll::Pending);

    clock.advance(Duration::from_millis(1));
    assert_eq!(wait.poll(&mut clock), Poll::Ready(Ok(())));
}

#[test]
fn await_ms_reset_starts_a_new_interval() {
    let mut clock = ManualClock::new();
    let mut wait = AwaitMs::new(Duration::from_millis(2));

    assert_eq!(wait.poll(&mut clock), Poll::Pending);
    clock.advance(Duration::from_millis(2));
    assert_eq!(wait.poll(&mut clock), Poll::Ready(Ok(())));

    wait.restart();
    assert_eq!(wait.poll(&mut clock), Poll::Pending);
    assert_eq!(wait.duration(), Duration::from_millis(2));
}

#[test]
fn race_returns_first_finisher() {
    let mut race = Race::new(CountDown::new(4, 1), CountDown::new(2, 2));

    assert_eq!(race.poll(&mut ()), Poll::Pending);
    assert_eq!(race.poll(&mut ()), Poll::Ready(Ok(Winner::Second(2))));

    let (first, second) = race.into_inner();
    assert_eq!(first.polled, 2);
    assert_eq!(second.polled, 2);
}

#[test]
fn race_skips_second_when_first_is_ready() {
    let mut race = Race::new(CountDown::new(1, 7), CountDown::new(1, 8));

    assert_eq!(race.poll(&mut ()), Poll::Ready(Ok(Winner::First(7))));
    assert_eq!(race.into_inner().1.polled, 0);
}

#[test]
fn yield_once_then_done() {
    let mut op = YieldOnce::new();
    assert_eq!(Operation::<()>::poll(&mut op, &mut ()), Poll::Pending);
    assert_eq!(Operation::<()>::poll(&mut op, &mut ()), Poll::Ready(Ok(())));

    Operation::<()>::reset(&mut op);
    assert_eq!(Operation::<()>::poll(&mut op, &mut ()), Poll::Pending);
}

#[test]
fn idle_never_completes() {
    let mut op = Idle;
    for _ in 0..100 {
        assert_eq!(Operation::<()>::poll(&mut op, &mut ()), Poll::Pending);
    }
}

#[test]
fn immediate_finishes_on_first_poll() {
    let mut op = Immediate(Err(Error::NotImplemented));
    assert_eq!(
        Operation::<()>::poll(&mut op, &mut ()),
        Poll::Ready(Err(Error::NotImplemented))
    );
}

#[test]
fn canceled_operation_stops_on_next_poll() {
    let cancel = CancelFlag::new();
    let mut clock = ManualClock::new();
    let mut wait = AwaitMs::new(Duration::from_secs(10));

    let mut op = from_fn(|clock: &mut ManualClock| -> Status {
        cancel.check()?;
        wait.poll(clock)
    });

    assert_eq!(op.poll(&mut clock), Poll::Pending);
    cancel.request();
    assert_eq!(op.poll(&mut clock), Poll::Ready(Err(Error::Canceled)));

    cancel.clear();
    assert!(!cancel.is_requested());
}

#[test]
fn error_display() {
    assert_eq!(Error::NotSupported.to_string(), "Operation not supported");
    assert_eq!(Error::TimedOut.to_string(), "Operation timed out");
}
