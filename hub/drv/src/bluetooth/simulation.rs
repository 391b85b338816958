//! Bluetooth without a radio.
//!
//! [`SimulatedBackend`] completes every command at once and writes stdout
//! notifications to an [`OutputSink`]. [`SimulationProcess`] runs the
//! [`MainThread`] on top of it and feeds bytes from an [`InputStream`] in as
//! if a host had written them to the hub's stdin.

use core::task::Poll;

use hub_core::{Clock, Duration, HubResult, Operation, Status, Timer};
use hub_hal::HalError;
use log::{trace, warn};

use super::{
    Backend, Bluetooth, Command, Connection, MainThread, Response, COMMAND_WRITE_STDIN,
    EVENT_WRITE_STDOUT,
};

/// How often the input stream is checked
const INPUT_INTERVAL: Duration = Duration::from_millis(1);
const INPUT_CHUNK_SIZE: usize = 64;

/// Non-blocking byte source standing in for the host
pub trait InputStream {
    /// Read whatever is available, `WouldBlock` if nothing is
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, HalError>;
}

/// Destination for the hub's stdout
pub trait OutputSink {
    fn write(&mut self, data: &[u8]) -> HubResult<()>;
}

impl<T: InputStream + ?Sized> InputStream for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, HalError> {
        (**self).read(buf)
    }
}

impl<T: OutputSink + ?Sized> OutputSink for &mut T {
    fn write(&mut self, data: &[u8]) -> HubResult<()> {
        (**self).write(data)
    }
}

/// Backend that is always connected to a host and has no peripherals
#[derive(Debug, Default)]
pub struct SimulatedBackend<W> {
    sink: W,
    advertising: bool,
    observing: bool,
    commands: u32,
}

impl<W: OutputSink> SimulatedBackend<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            advertising: false,
            observing: false,
            commands: 0,
        }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Number of commands completed so far
    pub fn commands(&self) -> u32 {
        self.commands
    }

    fn execute(&mut self, command: Command) -> HubResult<Response> {
        trace!("bluetooth sim: {:?}", command);
        self.commands = self.commands.wrapping_add(1);

        match command {
            Command::SendNotification(payload) => {
                // Only stdout reaches the sink; status and app data go nowhere.
                if let Some((&EVENT_WRITE_STDOUT, data)) = payload.split_first() {
                    self.sink.write(data)?;
                }
            }
            Command::StartAdvertising { .. } | Command::StartBroadcasting(_) => {
                self.advertising = true;
            }
            Command::StopAdvertising => self.advertising = false,
            Command::StartObserving => self.observing = true,
            Command::StopObserving => self.observing = false,
            Command::ResetController => {
                self.advertising = false;
                self.observing = false;
            }
            Command::InitializeController | Command::Disconnect => {}
            Command::ScanAndConnect(_)
            | Command::DiscoverCharacteristic(_)
            | Command::ReadCharacteristic(_)
            | Command::WriteCharacteristic { .. } => return Err(hub_core::Error::NoDevice),
        }
        Ok(Response::Done)
    }
}

/// A command that completes on its first poll
#[derive(Debug, Default)]
pub struct SimulatedOp {
    command: Option<Command>,
}

impl<W: OutputSink> Operation<SimulatedBackend<W>> for SimulatedOp {
    type Output = Response;

    fn poll(&mut self, backend: &mut SimulatedBackend<W>) -> Status<Response> {
        match self.command.take() {
            Some(command) => Poll::Ready(backend.execute(command)),
            None => Poll::Ready(Err(hub_core::Error::InvalidOperation)),
        }
    }
}

impl<W: OutputSink> Backend for SimulatedBackend<W> {
    type Op = SimulatedOp;

    fn begin(&mut self, command: Command) -> SimulatedOp {
        SimulatedOp {
            command: Some(command),
        }
    }

    fn is_connected(&self, connection: Connection) -> bool {
        matches!(connection, Connection::Le | Connection::Pybricks)
    }
}

/// Everything [`SimulationProcess`] needs
#[derive(Debug)]
pub struct SimulationContext<'a, B, K, S> {
    pub bluetooth: &'a Bluetooth<B, K>,
    pub input: S,
}

impl<'a, B, K, S> SimulationContext<'a, B, K, S> {
    pub fn new(bluetooth: &'a Bluetooth<B, K>, input: S) -> Self {
        Self { bluetooth, input }
    }
}

/// Bluetooth main thread plus host input.
///
/// Stays pending for good, even after the main thread stops, so the
/// simulated hub never looks finished to the scheduler.
pub struct SimulationProcess<B: Backend> {
    input_timer: Timer,
    thread: MainThread<B>,
    thread_status: Status,
}

impl<B: Backend> Default for SimulationProcess<B> {
    fn default() -> Self {
        Self {
            input_timer: Timer::with_duration(INPUT_INTERVAL),
            thread: MainThread::default(),
            thread_status: Poll::Pending,
        }
    }
}

impl<B: Backend> core::fmt::Debug for SimulationProcess<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulationProcess")
            .field("thread", &self.thread)
            .field("thread_status", &self.thread_status)
            .finish()
    }
}

impl<B: Backend> SimulationProcess<B> {
    /// Last status of the wrapped main thread
    pub fn thread_status(&self) -> &Status {
        &self.thread_status
    }
}

fn forward_input<B: Backend, K: Clock, S: InputStream>(bluetooth: &Bluetooth<B, K>, input: &mut S) {
    let mut buf = [0u8; 1 + INPUT_CHUNK_SIZE];
    buf[0] = COMMAND_WRITE_STDIN;

    match input.read(&mut buf[1..]) {
        Ok(0) | Err(nb::Error::WouldBlock) => {}
        Ok(count) => {
            if let Err(err) = bluetooth.receive(&buf[..=count]) {
                warn!("bluetooth sim: input dropped: {}", err);
            }
        }
        Err(nb::Error::Other(err)) => warn!("bluetooth sim: input error: {}", err),
    }
}

impl<'a, B, K, S> Operation<SimulationContext<'a, B, K, S>> for SimulationProcess<B>
where
    B: Backend,
    K: Clock,
    S: InputStream,
{
    type Output = ();

    fn poll(&mut self, cx: &mut SimulationContext<'a, B, K, S>) -> Status {
        let mut bluetooth = cx.bluetooth;

        if self.input_timer.is_expired(&bluetooth.clock) {
            self.input_timer.extend(&bluetooth.clock);
            forward_input(bluetooth, &mut cx.input);
        }

        if self.thread_status.is_pending() {
            self.thread_status = self.thread.poll(&mut bluetooth);
            if let Poll::Ready(Err(err)) = self.thread_status {
                warn!("bluetooth sim: main thread stopped: {}", err);
            }
        }

        Poll::Pending
    }
}
