use std::collections::VecDeque;
use std::task::Poll;

use hub_core::{Duration, Error, ManualClock, Operation};
use hub_drv::uart::{Flush, Read, UartDevice, Write};
use hub_hal::uart::{UartConfig, UartPort};
use hub_hal::{HalError, HalResult};

/// UART whose receive side replays a script; `None` means "nothing yet"
#[derive(Debug, Default)]
struct ScriptedUart {
    rx: VecDeque<Option<u8>>,
    tx: Vec<u8>,
    tx_room: usize,
    tx_draining: bool,
    error: Option<HalError>,
    config: Option<UartConfig>,
}

impl ScriptedUart {
    fn receiving(script: &[Option<u8>]) -> Self {
        Self {
            rx: script.iter().copied().collect(),
            ..Self::default()
        }
    }
}

impl UartPort for ScriptedUart {
    fn configure(&mut self, config: &UartConfig) -> HalResult<()> {
        self.config = Some(*config);
        Ok(())
    }

    fn read_byte(&mut self) -> nb::Result<u8, HalError> {
        if let Some(err) = self.error {
            return Err(nb::Error::Other(err));
        }
        match self.rx.pop_front() {
            Some(Some(byte)) => Ok(byte),
            Some(None) | None => Err(nb::Error::WouldBlock),
        }
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), HalError> {
        if let Some(err) = self.error {
            return Err(nb::Error::Other(err));
        }
        if self.tx_room == 0 {
            return Err(nb::Error::WouldBlock);
        }
        self.tx_room -= 1;
        self.tx.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), HalError> {
        if self.tx_draining {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn available(&self) -> usize {
        self.rx.iter().take_while(|slot| slot.is_some()).count()
    }
}

#[test]
fn read_resumes_where_it_stopped() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(ScriptedUart::receiving(&[Some(1), Some(2), None, Some(3)]), &clock);

    let mut buf = [0u8; 3];
    let mut read = Read::new(&mut buf);
    assert_eq!(read.poll(&mut dev), Poll::Pending);
    assert_eq!(read.received(), [1, 2]);
    assert_eq!(read.poll(&mut dev), Poll::Ready(Ok(3)));
    drop(read);

    assert_eq!(buf, [1, 2, 3]);
}

#[test]
fn read_times_out_with_partial_data() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(ScriptedUart::receiving(&[Some(9)]), &clock);
    dev.set_timeout(Some(Duration::from_millis(10))).unwrap();

    let mut buf = [0u8; 4];
    let mut read = Read::new(&mut buf);
    assert_eq!(read.poll(&mut dev), Poll::Pending);

    clock.advance(Duration::from_millis(9));
    assert_eq!(read.poll(&mut dev), Poll::Pending);

    clock.advance(Duration::from_millis(1));
    assert_eq!(read.poll(&mut dev), Poll::Ready(Err(Error::TimedOut)));
    assert_eq!(read.received(), [9]);
}

#[test]
fn read_without_timeout_waits_forever() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(ScriptedUart::default(), &clock);

    let mut buf = [0u8; 1];
    let mut read = Read::new(&mut buf);
    for _ in 0..10 {
        assert_eq!(read.poll(&mut dev), Poll::Pending);
        clock.advance(Duration::from_secs(60));
    }
}

#[test]
fn write_continues_when_room_frees_up() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(
        ScriptedUart {
            tx_room: 2,
            ..ScriptedUart::default()
        },
        &clock,
    );

    let mut write = Write::new(b"hello");
    assert_eq!(write.poll(&mut dev), Poll::Pending);
    assert_eq!(dev.port().tx, b"he");

    dev.port_mut().tx_room = 16;
    assert_eq!(write.poll(&mut dev), Poll::Ready(Ok(5)));
    assert_eq!(dev.port().tx, b"hello");
}

#[test]
fn hardware_errors_end_the_transfer() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(
        ScriptedUart {
            error: Some(HalError::Overrun),
            ..ScriptedUart::default()
        },
        &clock,
    );

    let mut buf = [0u8; 2];
    assert_eq!(Read::new(&mut buf).poll(&mut dev), Poll::Ready(Err(Error::Io)));

    dev.port_mut().error = Some(HalError::Busy);
    assert_eq!(Write::new(b"x").poll(&mut dev), Poll::Ready(Err(Error::Busy)));
}

#[test]
fn flush_waits_for_the_transmitter() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(
        ScriptedUart {
            tx_draining: true,
            ..ScriptedUart::default()
        },
        &clock,
    );

    let mut flush = Flush::new();
    assert_eq!(flush.poll(&mut dev), Poll::Pending);
    dev.port_mut().tx_draining = false;
    assert_eq!(flush.poll(&mut dev), Poll::Ready(Ok(())));
}

#[test]
fn flush_input_and_configure() {
    let clock = ManualClock::new();
    let mut dev = UartDevice::new(ScriptedUart::receiving(&[Some(1), Some(2), Some(3)]), &clock);

    assert_eq!(dev.flush_input(), Ok(3));
    assert_eq!(dev.port().available(), 0);

    dev.configure(&UartConfig::with_baud_rate(2400)).unwrap();
    assert_eq!(dev.port().config.map(|config| config.baud_rate), Some(2400));
}
