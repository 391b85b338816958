//! Hardware Abstraction Layer (HAL) for the hub drivers
//!
//! This crate provides vendor-agnostic traits for the peripherals the port
//! and Bluetooth drivers talk to. Blocking calls are not part of the
//! contract: anything that may have to wait returns [`nb::Result`] so the
//! caller can yield and try again on the next poll.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod adc;
pub mod error;
pub mod gpio;
pub mod uart;

// Re-export commonly used types
pub use error::{HalError, HalResult};
pub use gpio::{GpioPin, Level, PinMode, Pull};
pub use nb;
