//! GPIO pins without hardware

use hub_hal::{GpioPin, HalResult, Level, PinMode, Pull};
use log::trace;

/// In-memory pin that logs every change
#[derive(Debug, Clone)]
pub struct LoggingPin {
    name: &'static str,
    number: u32,
    mode: PinMode,
    pull: Pull,
    level: Level,
}

impl LoggingPin {
    pub const fn new(name: &'static str, number: u32) -> Self {
        Self {
            name,
            number,
            mode: PinMode::Input,
            pull: Pull::None,
            level: Level::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn mode(&self) -> PinMode {
        self.mode
    }

    pub fn pull(&self) -> Pull {
        self.pull
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl GpioPin for LoggingPin {
    fn set_mode(&mut self, mode: PinMode) -> HalResult<()> {
        trace!("pin {}: mode {:?}", self.name, mode);
        self.mode = mode;
        Ok(())
    }

    fn set_pull(&mut self, pull: Pull) -> HalResult<()> {
        trace!("pin {}: pull {:?}", self.name, pull);
        self.pull = pull;
        Ok(())
    }

    fn read(&self) -> HalResult<Level> {
        Ok(self.level)
    }

    fn write(&mut self, level: Level) -> HalResult<()> {
        trace!("pin {}: {:?}", self.name, level);
        self.level = level;
        Ok(())
    }

    fn pin_number(&self) -> u32 {
        self.number
    }
}
