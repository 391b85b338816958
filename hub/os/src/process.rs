//! Processes: top-level operations owned by the scheduler

use core::fmt;
use core::task::Poll;

use hub_core::{Operation, Status};

/// Index of a process in its scheduler, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(usize);

impl ProcessId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProcessId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "#{}", self.0);
    }
}

/// Object-safe view of a process used by the scheduler
pub trait Runnable {
    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Poll once if still pending and return the stored status
    fn resume(&mut self) -> Status;

    /// Last observed status
    fn status(&self) -> Status;

    fn is_pending(&self) -> bool {
        self.status().is_pending()
    }

    /// Re-initialize the state token and mark the process pending again
    fn restart(&mut self);
}

/// A process: an operation, its context and its last observed status.
///
/// The context is usually a reference to driver state that lives elsewhere;
/// the process never owns the data it works on. The operation's `Default`
/// value is its initial state token.
pub struct Process<Op, Cx> {
    name: &'static str,
    op: Op,
    cx: Cx,
    status: Status,
}

impl<Op: Default, Cx> Process<Op, Cx> {
    pub fn new(name: &'static str, cx: Cx) -> Self {
        Self {
            name,
            op: Op::default(),
            cx,
            status: Poll::Pending,
        }
    }
}

impl<Op, Cx> Process<Op, Cx> {
    pub fn context(&self) -> &Cx {
        &self.cx
    }

    pub fn context_mut(&mut self) -> &mut Cx {
        &mut self.cx
    }

    pub fn operation(&self) -> &Op {
        &self.op
    }
}

impl<Op, Cx> Runnable for Process<Op, Cx>
where
    Op: Operation<Cx, Output = ()> + Default,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn resume(&mut self) -> Status {
        if self.status.is_pending() {
            self.status = self.op.poll(&mut self.cx);
        }
        self.status
    }

    fn status(&self) -> Status {
        self.status
    }

    fn restart(&mut self) {
        self.op.reset();
        self.status = Poll::Pending;
    }
}

impl<Op, Cx> fmt::Debug for Process<Op, Cx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("name", &self.name)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{Error, YieldOnce};

    #[derive(Default)]
    struct FailOnSecondPoll(u32);

    impl Operation<()> for FailOnSecondPoll {
        type Output = ();

        fn poll(&mut self, _cx: &mut ()) -> Status {
            self.0 += 1;
            if self.0 == 2 {
                Poll::Ready(Err(Error::Io))
            } else {
                Poll::Pending
            }
        }
    }

    #[test]
    fn terminal_status_is_sticky() {
        let mut process: Process<FailOnSecondPoll, ()> = Process::new("fail", ());

        assert_eq!(process.resume(), Poll::Pending);
        assert_eq!(process.resume(), Poll::Ready(Err(Error::Io)));
        assert_eq!(process.resume(), Poll::Ready(Err(Error::Io)));
        assert_eq!(process.operation().0, 2);
    }

    #[test]
    fn restart_resets_token() {
        let mut process: Process<YieldOnce, ()> = Process::new("yield", ());
        assert!(process.is_pending());
        assert_eq!(process.resume(), Poll::Pending);
        assert_eq!(process.resume(), Poll::Ready(Ok(())));

        process.restart();
        assert!(process.is_pending());
        assert_eq!(process.resume(), Poll::Pending);
    }
}
