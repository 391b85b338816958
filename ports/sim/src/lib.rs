//! Host port for the hub.
//!
//! Runs the `no_std` scheduler and drivers as an ordinary process: time
//! comes from [`std::time::Instant`], the Bluetooth host is the terminal
//! (stdin in, stdout out) and GPIO pins only log what they are asked to do.

pub mod board;
pub mod clock;
pub mod echo;
pub mod io;
pub mod pin;

pub use board::Board;
pub use clock::StdClock;
pub use echo::Echo;
pub use io::{StdinStream, StdoutSink};
pub use pin::LoggingPin;
