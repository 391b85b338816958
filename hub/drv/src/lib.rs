#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # Hub Drivers
//!
//! Drivers written against the resumable [`Operation`](hub_core::Operation)
//! contract:
//!
//! - [`ioport`]: the port mode state machine that switches a port's shared
//!   pins between GPIO/ADC, UART and I2C use.
//! - [`uart`] and [`adc`]: non-blocking transfers with timeouts.
//! - [`bluetooth`]: the Bluetooth driver core, its main service thread and
//!   the simulation adapter used on the host.

pub mod adc;
pub mod bluetooth;
pub mod ioport;
pub mod uart;

pub use ioport::{P5P6Mode, Port, PortMode, PortModes, PortPlatformData};
