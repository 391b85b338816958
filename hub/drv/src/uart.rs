//! UART transfers as resumable operations.
//!
//! ```ignore
//! let mut read = uart::Read::new(&mut buf);
//! // in a process body:
//! let n = ready!(read.poll(&mut device))?;
//! ```

use core::task::Poll;

use hub_core::{Clock, Duration, Error, HubResult, Operation, Status, Timer};
use hub_hal::uart::{UartConfig, UartPort};
use log::trace;

/// A UART port with its clock and transfer timeout
#[derive(Debug)]
pub struct UartDevice<U, K> {
    port: U,
    clock: K,
    timeout: Option<Duration>,
}

impl<U: UartPort, K: Clock> UartDevice<U, K> {
    /// Device that waits forever
    pub fn new(port: U, clock: K) -> Self {
        Self {
            port,
            clock,
            timeout: None,
        }
    }

    /// Set the timeout for subsequent transfers.
    ///
    /// `None` waits forever. A zero timeout is rejected since partial
    /// transfers are not supported, and so is anything a [`Timer`] cannot
    /// measure (above [`Duration::MAX`]).
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> HubResult<()> {
        if timeout.is_some_and(|timeout| timeout.is_zero() || timeout > Duration::MAX) {
            return Err(Error::InvalidArgument);
        }
        self.timeout = timeout;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Reconfigure the port
    pub fn configure(&mut self, config: &UartConfig) -> HubResult<()> {
        self.port.configure(config)?;
        Ok(())
    }

    /// Discard everything in the receive buffer
    pub fn flush_input(&mut self) -> HubResult<usize> {
        let mut dropped = 0;
        loop {
            match self.port.read_byte() {
                Ok(_) => dropped += 1,
                Err(nb::Error::WouldBlock) => return Ok(dropped),
                Err(nb::Error::Other(err)) => return Err(err.into()),
            }
        }
    }

    pub fn port(&self) -> &U {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut U {
        &mut self.port
    }

    fn arm(&self, deadline: &mut Option<Timer>) {
        if let Some(timeout) = self.timeout {
            let mut timer = Timer::new();
            timer.start(&self.clock, timeout);
            *deadline = Some(timer);
        }
    }

    fn expired(&self, deadline: &Option<Timer>) -> bool {
        deadline.is_some_and(|timer| timer.is_expired(&self.clock))
    }
}

/// Progress of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Transfer {
    #[default]
    Start,
    Running {
        done: usize,
    },
}

/// Read exactly `buf.len()` bytes
#[derive(Debug)]
pub struct Read<'b> {
    buf: &'b mut [u8],
    transfer: Transfer,
    deadline: Option<Timer>,
}

impl<'b> Read<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self {
            buf,
            transfer: Transfer::Start,
            deadline: None,
        }
    }

    /// Bytes received so far
    pub fn received(&self) -> &[u8] {
        match self.transfer {
            Transfer::Start => &[],
            Transfer::Running { done } => &self.buf[..done],
        }
    }
}

impl<U: UartPort, K: Clock> Operation<UartDevice<U, K>> for Read<'_> {
    type Output = usize;

    fn poll(&mut self, dev: &mut UartDevice<U, K>) -> Status<usize> {
        let mut done = match self.transfer {
            Transfer::Start => {
                dev.arm(&mut self.deadline);
                0
            }
            Transfer::Running { done } => done,
        };

        while done < self.buf.len() {
            match dev.port.read_byte() {
                Ok(byte) => {
                    self.buf[done] = byte;
                    done += 1;
                }
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(err)) => return Poll::Ready(Err(err.into())),
            }
        }
        self.transfer = Transfer::Running { done };

        if done == self.buf.len() {
            trace!("uart: read {} bytes", done);
            return Poll::Ready(Ok(done));
        }
        if dev.expired(&self.deadline) {
            return Poll::Ready(Err(Error::TimedOut));
        }
        Poll::Pending
    }
}

/// Write all of `data`
#[derive(Debug)]
pub struct Write<'b> {
    data: &'b [u8],
    transfer: Transfer,
    deadline: Option<Timer>,
}

impl<'b> Write<'b> {
    pub fn new(data: &'b [u8]) -> Self {
        Self {
            data,
            transfer: Transfer::Start,
            deadline: None,
        }
    }
}

impl<U: UartPort, K: Clock> Operation<UartDevice<U, K>> for Write<'_> {
    type Output = usize;

    fn poll(&mut self, dev: &mut UartDevice<U, K>) -> Status<usize> {
        let mut done = match self.transfer {
            Transfer::Start => {
                dev.arm(&mut self.deadline);
                0
            }
            Transfer::Running { done } => done,
        };

        while let Some(&byte) = self.data.get(done) {
            match dev.port.write_byte(byte) {
                Ok(()) => done += 1,
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(err)) => return Poll::Ready(Err(err.into())),
            }
        }
        self.transfer = Transfer::Running { done };

        if done == self.data.len() {
            trace!("uart: wrote {} bytes", done);
            return Poll::Ready(Ok(done));
        }
        if dev.expired(&self.deadline) {
            return Poll::Ready(Err(Error::TimedOut));
        }
        Poll::Pending
    }
}

/// Wait until the transmitter has drained
#[derive(Debug, Default)]
pub struct Flush {
    deadline: Option<Timer>,
    started: bool,
}

impl Flush {
    pub const fn new() -> Self {
        Self {
            deadline: None,
            started: false,
        }
    }
}

impl<U: UartPort, K: Clock> Operation<UartDevice<U, K>> for Flush {
    type Output = ();

    fn poll(&mut self, dev: &mut UartDevice<U, K>) -> Status {
        if !self.started {
            self.started = true;
            dev.arm(&mut self.deadline);
        }

        match dev.port.flush() {
            Ok(()) => Poll::Ready(Ok(())),
            Err(nb::Error::Other(err)) => Poll::Ready(Err(err.into())),
            Err(nb::Error::WouldBlock) if dev.expired(&self.deadline) => {
                Poll::Ready(Err(Error::TimedOut))
            }
            Err(nb::Error::WouldBlock) => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::ManualClock;
    use hub_hal::HalError;

    struct Silent;

    impl UartPort for Silent {
        fn configure(&mut self, _config: &UartConfig) -> hub_hal::HalResult<()> {
            Ok(())
        }

        fn read_byte(&mut self) -> nb::Result<u8, HalError> {
            Err(nb::Error::WouldBlock)
        }

        fn write_byte(&mut self, _byte: u8) -> nb::Result<(), HalError> {
            Err(nb::Error::WouldBlock)
        }

        fn flush(&mut self) -> nb::Result<(), HalError> {
            Err(nb::Error::WouldBlock)
        }

        fn available(&self) -> usize {
            0
        }
    }

    #[test]
    fn zero_timeout_is_invalid() {
        let mut dev = UartDevice::new(Silent, ManualClock::new());
        assert_eq!(
            dev.set_timeout(Some(Duration::ZERO)),
            Err(Error::InvalidArgument)
        );
        assert_eq!(dev.timeout(), None);
    }

    #[test]
    fn timeout_beyond_timer_range_is_invalid() {
        let mut dev = UartDevice::new(Silent, ManualClock::new());
        assert_eq!(
            dev.set_timeout(Some(Duration::from_millis(u32::MAX))),
            Err(Error::InvalidArgument)
        );
        dev.set_timeout(Some(Duration::MAX)).unwrap();

        let mut flush = Flush::new();
        assert_eq!(flush.poll(&mut dev), Poll::Pending);
    }

    #[test]
    fn flush_times_out() {
        let mut dev = UartDevice::new(Silent, ManualClock::new());
        dev.set_timeout(Some(Duration::from_millis(5))).unwrap();

        let mut flush = Flush::new();
        assert_eq!(flush.poll(&mut dev), Poll::Pending);
        dev.clock.advance(Duration::from_millis(5));
        assert_eq!(flush.poll(&mut dev), Poll::Ready(Err(Error::TimedOut)));
    }
}
