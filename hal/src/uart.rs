//! UART (Universal Asynchronous Receiver/Transmitter) abstraction

use crate::error::{HalError, HalResult};

/// UART data bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
    Nine,
}

/// UART stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// UART parity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// UART configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub stop_bits: StopBits,
    pub parity: Parity,
}

impl Default for UartConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

impl UartConfig {
    /// Default framing at a different baud rate
    pub const fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
        }
    }
}

/// Non-blocking UART peripheral.
///
/// `WouldBlock` means the FIFO is empty (read) or full (write) right now.
pub trait UartPort {
    /// Configure UART parameters
    fn configure(&mut self, config: &UartConfig) -> HalResult<()>;

    /// Take one received byte
    fn read_byte(&mut self) -> nb::Result<u8, HalError>;

    /// Queue one byte for transmission
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), HalError>;

    /// Wait for the transmitter to drain
    fn flush(&mut self) -> nb::Result<(), HalError>;

    /// Bytes available in RX buffer
    fn available(&self) -> usize;
}
