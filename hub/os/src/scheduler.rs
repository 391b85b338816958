//! Cooperative scheduler polling registered processes in order

use core::fmt;
use core::task::Poll;

use heapless::Vec;
use hub_core::{Error, HubResult, Status};
use log::{debug, trace, warn};

use crate::{PollSignal, ProcessId, Runnable, POLL};

/// Default number of process slots
pub const MAX_PROCESSES: usize = 16;

/// Scheduler configuration
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub name: &'static str,
    /// Called when no poll is pending, with interrupts masked
    pub idle_callback: Option<fn()>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "hub",
            idle_callback: None,
        }
    }
}

impl SchedulerConfig {
    /// Creates a new scheduler configuration builder.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for [`SchedulerConfig`]
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl SchedulerConfigBuilder {
    /// Sets the scheduler name.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Sets the idle callback function.
    pub fn idle_callback(mut self, callback: fn()) -> Self {
        self.config.idle_callback = Some(callback);
        self
    }

    pub fn build(self) -> SchedulerConfig {
        self.config
    }
}

/// Fixed-capacity process registry.
///
/// Processes are polled once per pass in registration order. A process that
/// reaches a terminal status stays registered so its result can be read
/// back, but it is never polled again unless restarted.
pub struct Scheduler<'a, const N: usize = MAX_PROCESSES> {
    config: SchedulerConfig,
    processes: Vec<&'a mut dyn Runnable, N>,
    signal: &'a PollSignal,
    passes: u32,
}

impl<'a, const N: usize> Scheduler<'a, N> {
    /// Scheduler driven by the global [`POLL`] signal
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_signal(config, &POLL)
    }

    /// Scheduler driven by its own signal
    pub fn with_signal(config: SchedulerConfig, signal: &'a PollSignal) -> Self {
        Self {
            config,
            processes: Vec::new(),
            signal,
            passes: 0,
        }
    }

    /// Register a process, re-initialize it and request a poll.
    ///
    /// Fails with [`Error::NoMemory`] when every slot is taken; the process
    /// is left untouched then.
    pub fn start(&mut self, process: &'a mut dyn Runnable) -> HubResult<ProcessId> {
        if self.processes.is_full() {
            warn!("{}: no slot left for process {}", self.config.name, process.name());
            return Err(Error::NoMemory);
        }

        let id = ProcessId::new(self.processes.len());
        let name = process.name();
        process.restart();
        if self.processes.push(process).is_err() {
            return Err(Error::NoMemory);
        }

        debug!("{}: started process {} as {}", self.config.name, name, id);
        self.signal.request();
        Ok(id)
    }

    /// Start an already registered process over from its initial state
    pub fn restart(&mut self, id: ProcessId) -> HubResult<()> {
        let process = self
            .processes
            .get_mut(id.index())
            .ok_or(Error::InvalidArgument)?;
        process.restart();
        debug!("{}: restarted process {}", self.config.name, process.name());
        self.signal.request();
        Ok(())
    }

    /// Poll every pending process once. Returns how many were polled.
    pub fn poll_all(&mut self) -> usize {
        let mut polled = 0;
        self.passes = self.passes.wrapping_add(1);

        for (index, process) in self.processes.iter_mut().enumerate() {
            if !process.is_pending() {
                continue;
            }
            polled += 1;
            match process.resume() {
                Poll::Pending => {}
                Poll::Ready(Ok(())) => {
                    debug!("{}: process {} #{} done", self.config.name, process.name(), index)
                }
                Poll::Ready(Err(err)) => debug!(
                    "{}: process {} #{} ended: {}",
                    self.config.name,
                    process.name(),
                    index,
                    err
                ),
            }
        }

        trace!("{}: pass {} polled {}", self.config.name, self.passes, polled);
        polled
    }

    /// Consume a pending poll request and service it.
    ///
    /// Returns true if another request arrived in the meantime.
    pub fn run_once(&mut self) -> bool {
        if self.signal.take() {
            self.poll_all();
        }
        self.signal.is_pending()
    }

    /// Service poll requests until none is pending, then idle.
    ///
    /// The idle hook runs inside a critical section and only if no request
    /// slipped in after the last pass, so a wake-up is never lost.
    pub fn run_until_idle(&mut self) {
        while self.run_once() {}

        let idle = self.config.idle_callback.unwrap_or(on_idle);
        critical_section::with(|cs| {
            if !self.signal.is_pending_in(cs) {
                idle();
            }
        });
    }

    /// Keep servicing processes while `keep_running` returns true
    pub fn run_while(&mut self, mut keep_running: impl FnMut() -> bool) {
        while keep_running() {
            self.run_until_idle();
        }
    }

    /// Service processes forever
    pub fn run(&mut self) -> ! {
        loop {
            self.run_until_idle();
        }
    }

    /// Last observed status of a process
    pub fn status(&self, id: ProcessId) -> Option<Status> {
        self.processes.get(id.index()).map(|process| process.status())
    }

    /// Number of registered processes
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Number of processes that will be polled on the next pass
    pub fn pending_count(&self) -> usize {
        self.processes
            .iter()
            .filter(|process| process.is_pending())
            .count()
    }

    /// Number of completed `poll_all` passes
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Returns the scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn signal(&self) -> &'a PollSignal {
        self.signal
    }
}

impl<const N: usize> fmt::Debug for Scheduler<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.config.name)
            .field("processes", &self.processes.len())
            .field("pending", &self.pending_count())
            .field("passes", &self.passes)
            .finish()
    }
}

/// Default idle hook: sleep until the next interrupt
fn on_idle() {
    #[cfg(target_arch = "arm")]
    {
        cortex_m::asm::wfi();
    }
}
