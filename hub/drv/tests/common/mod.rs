//! Test doubles shared by the driver tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use hub_drv::ioport::IoportPins;
use hub_hal::{GpioPin, HalError, HalResult, Level, PinMode, Pull};

/// Something done to a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Mode(PinMode),
    Pull(Pull),
    Write(Level),
}

pub type PinLog = Rc<RefCell<Vec<(&'static str, Action)>>>;

/// Configuration a pin ends up in, `None` where never set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub mode: Option<PinMode>,
    pub pull: Option<Pull>,
    pub level: Level,
}

/// Pin that appends every change to a log shared by all pins of a test
#[derive(Debug)]
pub struct RecordingPin {
    name: &'static str,
    number: u32,
    mode: Option<PinMode>,
    pull: Option<Pull>,
    level: Level,
    log: PinLog,
    fail_on: Option<PinMode>,
}

impl RecordingPin {
    pub fn new(name: &'static str, number: u32, log: &PinLog) -> Self {
        Self {
            name,
            number,
            mode: None,
            pull: None,
            level: Level::Low,
            log: Rc::clone(log),
            fail_on: None,
        }
    }

    /// Refuse switching to `mode` with a hardware error
    pub fn failing_on(mut self, mode: PinMode) -> Self {
        self.fail_on = Some(mode);
        self
    }

    pub fn state(&self) -> PinState {
        PinState {
            mode: self.mode,
            pull: self.pull,
            level: self.level,
        }
    }
}

impl GpioPin for RecordingPin {
    fn set_mode(&mut self, mode: PinMode) -> HalResult<()> {
        if self.fail_on == Some(mode) {
            return Err(HalError::HardwareError);
        }
        self.mode = Some(mode);
        self.log.borrow_mut().push((self.name, Action::Mode(mode)));
        Ok(())
    }

    fn set_pull(&mut self, pull: Pull) -> HalResult<()> {
        self.pull = Some(pull);
        self.log.borrow_mut().push((self.name, Action::Pull(pull)));
        Ok(())
    }

    fn read(&self) -> HalResult<Level> {
        Ok(self.level)
    }

    fn write(&mut self, level: Level) -> HalResult<()> {
        self.level = level;
        self.log.borrow_mut().push((self.name, Action::Write(level)));
        Ok(())
    }

    fn pin_number(&self) -> u32 {
        self.number
    }
}

pub const UART_TX_ALT: u8 = 7;
pub const UART_RX_ALT: u8 = 8;

/// Pins of one port, all writing to `log`
pub fn port_pins(log: &PinLog) -> IoportPins<RecordingPin> {
    IoportPins {
        uart_buf: RecordingPin::new("buf", 0, log),
        p5: RecordingPin::new("p5", 1, log),
        uart_tx: RecordingPin::new("tx", 2, log),
        uart_tx_alt: UART_TX_ALT,
        p6: RecordingPin::new("p6", 3, log),
        uart_rx: RecordingPin::new("rx", 4, log),
        uart_rx_alt: UART_RX_ALT,
    }
}

/// State of every pin of a port, in field order
pub fn pin_states(pins: &IoportPins<RecordingPin>) -> [PinState; 5] {
    [
        pins.uart_buf.state(),
        pins.p5.state(),
        pins.uart_tx.state(),
        pins.p6.state(),
        pins.uart_rx.state(),
    ]
}

/// The GPIO/ADC baseline as it shows up in the log
pub fn baseline() -> Vec<(&'static str, Action)> {
    vec![
        ("p5", Action::Mode(PinMode::Input)),
        ("p6", Action::Mode(PinMode::Input)),
        ("tx", Action::Mode(PinMode::Input)),
        ("rx", Action::Mode(PinMode::Input)),
        ("buf", Action::Write(Level::High)),
        ("buf", Action::Mode(PinMode::Output)),
        ("p5", Action::Pull(Pull::None)),
        ("p6", Action::Pull(Pull::None)),
        ("buf", Action::Pull(Pull::None)),
        ("tx", Action::Pull(Pull::None)),
        ("rx", Action::Pull(Pull::None)),
    ]
}
