//! ADC sampling as a resumable operation

use core::task::Poll;

use hub_core::{Clock, Duration, Error, HubResult, Operation, Status, Timer};
use hub_hal::adc::AdcChannel;

/// ADC channel with its clock and conversion timeout
#[derive(Debug)]
pub struct AdcDevice<A, K> {
    channel: A,
    clock: K,
    timeout: Option<Duration>,
}

impl<A: AdcChannel, K: Clock> AdcDevice<A, K> {
    pub fn new(channel: A, clock: K) -> Self {
        Self {
            channel,
            clock,
            timeout: None,
        }
    }

    /// `None` waits forever; zero and anything above [`Duration::MAX`] are
    /// rejected
    pub fn set_timeout(&mut self, timeout: Option<Duration>) -> HubResult<()> {
        if timeout.is_some_and(|timeout| timeout.is_zero() || timeout > Duration::MAX) {
            return Err(Error::InvalidArgument);
        }
        self.timeout = timeout;
        Ok(())
    }

    pub fn channel_number(&self) -> u8 {
        self.channel.channel_number()
    }
}

/// Wait for one conversion result
#[derive(Debug, Default)]
pub struct Sample {
    deadline: Option<Timer>,
    started: bool,
}

impl Sample {
    pub const fn new() -> Self {
        Self {
            deadline: None,
            started: false,
        }
    }
}

impl<A: AdcChannel, K: Clock> Operation<AdcDevice<A, K>> for Sample {
    type Output = u16;

    fn poll(&mut self, dev: &mut AdcDevice<A, K>) -> Status<u16> {
        if !self.started {
            self.started = true;
            if let Some(timeout) = dev.timeout {
                let mut timer = Timer::new();
                timer.start(&dev.clock, timeout);
                self.deadline = Some(timer);
            }
        }

        match dev.channel.read_raw() {
            Ok(value) => Poll::Ready(Ok(value)),
            Err(nb::Error::Other(err)) => Poll::Ready(Err(err.into())),
            Err(nb::Error::WouldBlock) => {
                if self.deadline.is_some_and(|timer| timer.is_expired(&dev.clock)) {
                    Poll::Ready(Err(Error::TimedOut))
                } else {
                    Poll::Pending
                }
            }
        }
    }
}
