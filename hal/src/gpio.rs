//! GPIO (General Purpose Input/Output) abstraction

use crate::error::HalResult;

/// GPIO pin modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Input, pull resistors configured separately
    Input,
    /// Output (push-pull)
    Output,
    /// Alternate function (vendor-specific)
    Alternate(u8),
}

/// Internal pull resistor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// GPIO pin levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Low level (0V)
    Low,
    /// High level (VCC)
    High,
}

/// GPIO pin trait (object-safe)
pub trait GpioPin {
    /// Configure pin mode
    fn set_mode(&mut self, mode: PinMode) -> HalResult<()>;

    /// Configure the pull resistor
    fn set_pull(&mut self, pull: Pull) -> HalResult<()>;

    /// Read current level
    fn read(&self) -> HalResult<Level>;

    /// Write level (for output pins)
    fn write(&mut self, level: Level) -> HalResult<()>;

    /// Get pin number
    fn pin_number(&self) -> u32;

    /// Switch to input
    fn input(&mut self) -> HalResult<()> {
        self.set_mode(PinMode::Input)
    }

    /// Drive high. The level is latched before the output is enabled.
    fn out_high(&mut self) -> HalResult<()> {
        self.write(Level::High)?;
        self.set_mode(PinMode::Output)
    }

    /// Drive low. The level is latched before the output is enabled.
    fn out_low(&mut self) -> HalResult<()> {
        self.write(Level::Low)?;
        self.set_mode(PinMode::Output)
    }

    /// Hand the pin to a peripheral
    fn alternate(&mut self, function: u8) -> HalResult<()> {
        self.set_mode(PinMode::Alternate(function))
    }

    /// Toggle output
    fn toggle(&mut self) -> HalResult<()> {
        let current = self.read()?;
        let new_level = match current {
            Level::Low => Level::High,
            Level::High => Level::Low,
        };
        self.write(new_level)
    }
}

impl<P: GpioPin + ?Sized> GpioPin for &mut P {
    fn set_mode(&mut self, mode: PinMode) -> HalResult<()> {
        (**self).set_mode(mode)
    }

    fn set_pull(&mut self, pull: Pull) -> HalResult<()> {
        (**self).set_pull(pull)
    }

    fn read(&self) -> HalResult<Level> {
        (**self).read()
    }

    fn write(&mut self, level: Level) -> HalResult<()> {
        (**self).write(level)
    }

    fn pin_number(&self) -> u32 {
        (**self).pin_number()
    }
}
