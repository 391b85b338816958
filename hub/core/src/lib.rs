#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # Hub Core
//!
//! Core types shared by every layer of the hub controller: the error
//! taxonomy, the millisecond clock and [`Timer`], and the resumable
//! [`Operation`] contract that all cooperative code is written against.
//!
//! A resumable operation is polled repeatedly. Each poll does a bounded
//! amount of work and returns either [`Poll::Pending`] ("call me again") or
//! [`Poll::Ready`] with a terminal [`HubResult`]. Because "again" lives in the
//! outer [`Poll`] and never in [`Error`], a terminal caller cannot mistake it
//! for a failure.

use core::fmt;
use core::task::Poll;

pub mod cancel;
pub mod op;
pub mod time;
pub mod timer;

pub use cancel::*;
pub use op::*;
pub use time::*;
pub use timer::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the hub core
pub type HubResult<T> = Result<T, Error>;

/// Outcome of polling a resumable operation once.
///
/// `Pending` is the scheduling sentinel; `Ready` carries the terminal result.
pub type Status<T = ()> = Poll<HubResult<T>>;

/// Terminal error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// Unspecified failure
    Failed,
    /// Malformed caller input, such as an unsupported timeout value
    InvalidArgument,
    /// Operation not permitted in the current state
    InvalidOperation,
    /// Operation or mode not available on this port or hardware
    NotSupported,
    /// Feature intentionally stubbed on this platform
    NotImplemented,
    /// Transient hardware or transport failure
    Io,
    /// Operation did not complete before its deadline
    TimedOut,
    /// Resource is occupied by another operation
    Busy,
    /// No device is attached or connected
    NoDevice,
    /// Fixed-capacity storage exhausted
    NoMemory,
    /// Operation stopped early on request
    Canceled,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Failed => write!(f, "Operation failed"),
            Error::InvalidArgument => write!(f, "Invalid argument"),
            Error::InvalidOperation => write!(f, "Operation not permitted in current state"),
            Error::NotSupported => write!(f, "Operation not supported"),
            Error::NotImplemented => write!(f, "Operation not implemented"),
            Error::Io => write!(f, "I/O error"),
            Error::TimedOut => write!(f, "Operation timed out"),
            Error::Busy => write!(f, "Resource busy"),
            Error::NoDevice => write!(f, "No device"),
            Error::NoMemory => write!(f, "Out of memory"),
            Error::Canceled => write!(f, "Operation canceled"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Failed => defmt::write!(fmt, "Failed"),
            Error::InvalidArgument => defmt::write!(fmt, "InvalidArgument"),
            Error::InvalidOperation => defmt::write!(fmt, "InvalidOperation"),
            Error::NotSupported => defmt::write!(fmt, "NotSupported"),
            Error::NotImplemented => defmt::write!(fmt, "NotImplemented"),
            Error::Io => defmt::write!(fmt, "Io"),
            Error::TimedOut => defmt::write!(fmt, "TimedOut"),
            Error::Busy => defmt::write!(fmt, "Busy"),
            Error::NoDevice => defmt::write!(fmt, "NoDevice"),
            Error::NoMemory => defmt::write!(fmt, "NoMemory"),
            Error::Canceled => defmt::write!(fmt, "Canceled"),
        }
    }
}
