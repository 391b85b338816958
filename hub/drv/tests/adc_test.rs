use std::task::Poll;

use hub_core::{Duration, Error, ManualClock, Operation};
use hub_drv::adc::{AdcDevice, Sample};
use hub_hal::adc::AdcChannel;
use hub_hal::HalError;

/// Channel that converts after a number of busy reads
struct SlowChannel {
    busy_reads: u32,
    value: Result<u16, HalError>,
}

impl AdcChannel for SlowChannel {
    fn read_raw(&mut self) -> nb::Result<u16, HalError> {
        if self.busy_reads > 0 {
            self.busy_reads -= 1;
            return Err(nb::Error::WouldBlock);
        }
        self.value.map_err(nb::Error::Other)
    }

    fn channel_number(&self) -> u8 {
        5
    }
}

#[test]
fn sample_waits_for_conversion() {
    let clock = ManualClock::new();
    let mut adc = AdcDevice::new(
        SlowChannel {
            busy_reads: 2,
            value: Ok(1023),
        },
        &clock,
    );
    assert_eq!(adc.channel_number(), 5);

    let mut sample = Sample::new();
    assert_eq!(sample.poll(&mut adc), Poll::Pending);
    assert_eq!(sample.poll(&mut adc), Poll::Pending);
    assert_eq!(sample.poll(&mut adc), Poll::Ready(Ok(1023)));
}

#[test]
fn sample_times_out() {
    let clock = ManualClock::new();
    let mut adc = AdcDevice::new(
        SlowChannel {
            busy_reads: u32::MAX,
            value: Ok(0),
        },
        &clock,
    );
    adc.set_timeout(Some(Duration::from_millis(2))).unwrap();
    assert_eq!(adc.set_timeout(Some(Duration::ZERO)), Err(Error::InvalidArgument));

    let mut sample = Sample::new();
    assert_eq!(sample.poll(&mut adc), Poll::Pending);
    clock.advance(Duration::from_millis(2));
    assert_eq!(sample.poll(&mut adc), Poll::Ready(Err(Error::TimedOut)));
}

#[test]
fn conversion_error_is_reported() {
    let clock = ManualClock::new();
    let mut adc = AdcDevice::new(
        SlowChannel {
            busy_reads: 0,
            value: Err(HalError::HardwareError),
        },
        &clock,
    );

    assert_eq!(Sample::new().poll(&mut adc), Poll::Ready(Err(Error::Io)));
}

#[test]
fn long_timeout_does_not_expire_at_start() {
    let clock = ManualClock::new();
    let mut adc = AdcDevice::new(
        SlowChannel {
            busy_reads: u32::MAX,
            value: Ok(0),
        },
        &clock,
    );
    assert_eq!(
        adc.set_timeout(Some(Duration::from_secs(u32::MAX))),
        Err(Error::InvalidArgument)
    );
    adc.set_timeout(Some(Duration::MAX)).unwrap();

    let mut sample = Sample::new();
    assert_eq!(sample.poll(&mut adc), Poll::Pending);
    clock.advance(Duration::from_secs(3600));
    assert_eq!(sample.poll(&mut adc), Poll::Pending);
}
