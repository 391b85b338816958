#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![forbid(unsafe_code)]

//! # Hub OS
//!
//! Cooperative, run-to-completion scheduler for resumable processes.
//! There is no preemption: each registered [`Process`] is polled once per
//! pass in registration order, and a pass only happens after someone called
//! [`request_poll`] (a timer tick, an interrupt handler, or a driver that
//! made progress).
//!
//! ```
//! use hub_core::Idle;
//! use hub_os::{PollSignal, Process, Scheduler, SchedulerConfig};
//!
//! let signal = PollSignal::new();
//! let mut idle: Process<Idle, ()> = Process::new("idle", ());
//!
//! let mut scheduler: Scheduler<'_, 4> =
//!     Scheduler::with_signal(SchedulerConfig::default(), &signal);
//! let id = scheduler.start(&mut idle).unwrap();
//!
//! assert!(!scheduler.run_once());
//! assert!(scheduler.status(id).unwrap().is_pending());
//! ```

pub mod process;
pub mod scheduler;
pub mod signal;

pub use process::*;
pub use scheduler::*;
pub use signal::*;
