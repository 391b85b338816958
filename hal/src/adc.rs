//! ADC (Analog-to-Digital Converter) abstraction

use crate::error::HalError;

/// Non-blocking ADC channel
pub trait AdcChannel {
    /// Read raw ADC value, `WouldBlock` while a conversion is in progress
    fn read_raw(&mut self) -> nb::Result<u16, HalError>;

    /// Get channel number
    fn channel_number(&self) -> u8;
}
