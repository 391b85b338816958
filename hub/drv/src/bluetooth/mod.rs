//! Bluetooth driver core.
//!
//! The driver is split in two. Capability functions such as [`Bluetooth::tx`]
//! or [`Bluetooth::start_broadcasting`] only record a request and kick the
//! scheduler. The [`MainThread`] process picks requests up one at a time and
//! runs them on the radio [`Backend`], which means none of the capability
//! functions ever waits on the radio itself.
//!
//! Callers that need the outcome poll one of the small operations in this
//! module ([`PowerOn`], [`SendEvent`], [`AwaitPeripheralCommand`],
//! [`AwaitAdvertiseOrScan`]).

use core::cell::{Ref, RefCell, RefMut};
use core::fmt;
use core::task::Poll;

use heapless::{Deque, String, Vec};
use hub_core::{CancelFlag, Clock, Duration, Error, HubResult, Operation, Status, Timer};
use hub_os::request_poll;
use log::{debug, warn};

mod simulation;
mod thread;

pub use simulation::{
    InputStream, OutputSink, SimulatedBackend, SimulatedOp, SimulationContext, SimulationProcess,
};
pub use thread::MainThread;

/// Pybricks protocol command: bytes for the standard input of the hub
pub const COMMAND_WRITE_STDIN: u8 = 6;
/// Pybricks protocol event: status report
pub const EVENT_STATUS_REPORT: u8 = 0;
/// Pybricks protocol event: bytes from the standard output of the hub
pub const EVENT_WRITE_STDOUT: u8 = 1;
/// Pybricks protocol event: data for the application
pub const EVENT_WRITE_APP_DATA: u8 = 2;
/// Size of a status report including its event byte
pub const STATUS_REPORT_SIZE: usize = 6;

/// Largest characteristic value the driver sends or receives
pub const MAX_CHAR_SIZE: usize = 20;
/// Largest advertising payload
pub const MAX_ADV_SIZE: usize = 31;
/// Longest hub or peripheral name
pub const MAX_NAME_SIZE: usize = 20;

/// One packet being sent plus one ready to go
const STDOUT_BUFFER_SIZE: usize = MAX_CHAR_SIZE * 2;
const STDIN_BUFFER_SIZE: usize = 256;

/// How long a peripheral scan survives without anyone awaiting it
const PERIPHERAL_WATCHDOG: Duration = Duration::from_millis(10);

pub type Payload = Vec<u8, MAX_CHAR_SIZE>;
pub type AdvertisingData = Vec<u8, MAX_ADV_SIZE>;
pub type Name = String<MAX_NAME_SIZE>;

/// Handles incoming commands and peripheral notifications
pub type ReceiveHandler = fn(&[u8]) -> HubResult<()>;
/// Receives advertisements while observing
pub type ObserveCallback = fn(data: &[u8], rssi: i8);
/// Decides whether an advertisement belongs to the wanted peripheral
pub type AdvertisementMatcher = fn(data: &[u8]) -> bool;

/// Kinds of Bluetooth connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connection {
    /// Any low energy connection
    Le,
    /// Pybricks service notifications enabled
    Pybricks,
    /// Nordic UART service notifications enabled
    Uart,
    /// Connected to a peripheral as central
    Peripheral,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Connection {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Le => defmt::write!(fmt, "Le"),
            Self::Pybricks => defmt::write!(fmt, "Pybricks"),
            Self::Uart => defmt::write!(fmt, "Uart"),
            Self::Peripheral => defmt::write!(fmt, "Peripheral"),
        }
    }
}

/// How to find and connect to a peripheral
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanConfig {
    pub match_adv: Option<AdvertisementMatcher>,
    pub match_adv_rsp: Option<AdvertisementMatcher>,
    pub notification_handler: Option<ReceiveHandler>,
    /// Pair (and bond) after connecting
    pub pair: bool,
    /// `None` scans until canceled
    pub timeout: Option<Duration>,
}

/// A GATT characteristic of a connected peripheral
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Characteristic {
    pub handle: u16,
    pub handle_max: u16,
    pub properties: u16,
    pub uuid16: u16,
    pub uuid128: [u8; 16],
    pub request_notification: bool,
    pub value: Payload,
}

/// Work item handed to the radio backend
#[derive(Debug, Clone)]
pub enum Command {
    ResetController,
    InitializeController,
    SendNotification(Payload),
    StartAdvertising { hub_name: Name },
    StopAdvertising,
    StartBroadcasting(AdvertisingData),
    StartObserving,
    StopObserving,
    ScanAndConnect(ScanConfig),
    Disconnect,
    DiscoverCharacteristic(Characteristic),
    ReadCharacteristic(Characteristic),
    WriteCharacteristic { handle: u16, data: Payload },
}

/// Result of a completed backend command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Done,
    Connected { name: Name },
    Characteristic(Characteristic),
}

/// Radio and HCI transport.
///
/// Each command becomes an operation that is polled with the backend
/// itself as context until it completes.
pub trait Backend {
    type Op: Operation<Self, Output = Response>;

    fn begin(&mut self, command: Command) -> Self::Op;

    fn is_connected(&self, connection: Connection) -> bool;
}

/// Bluetooth driver configuration
#[derive(Debug, Clone)]
pub struct BluetoothConfig {
    pub hub_name: Name,
    /// Status reports are repeated at this interval even when unchanged
    pub status_interval: Duration,
    /// Pause between two rounds of request servicing
    pub poll_interval: Duration,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        let mut hub_name = Name::new();
        let _ = hub_name.push_str("Pybricks Hub");
        Self {
            hub_name,
            status_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl BluetoothConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BluetoothConfigBuilder {
        BluetoothConfigBuilder::default()
    }
}

/// Builder for [`BluetoothConfig`]
#[derive(Debug, Clone, Default)]
pub struct BluetoothConfigBuilder {
    config: BluetoothConfig,
}

impl BluetoothConfigBuilder {
    /// Sets the advertised hub name, truncated to [`MAX_NAME_SIZE`] bytes.
    pub fn hub_name(mut self, name: &str) -> Self {
        self.config.hub_name.clear();
        for c in name.chars() {
            if self.config.hub_name.push(c).is_err() {
                break;
            }
        }
        self
    }

    pub fn status_interval(mut self, interval: Duration) -> Self {
        self.config.status_interval = interval;
        self
    }

    /// Sets the service interval. Never shorter than one millisecond.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = Duration::from_millis(interval.as_millis().max(1));
        self
    }

    pub fn build(self) -> BluetoothConfig {
        self.config
    }
}

/// Advertising and scanning work, one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdvertisingTask {
    StartAdvertising,
    StopAdvertising,
    StartBroadcasting,
    StartObserving,
    StopObserving,
}

/// Peripheral work, one at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeripheralTask {
    ScanAndConnect,
    Disconnect,
    DiscoverCharacteristic,
    ReadCharacteristic,
    WriteCharacteristic,
}

#[derive(Debug)]
struct Peripheral {
    task: Option<PeripheralTask>,
    result: HubResult<()>,
    config: ScanConfig,
    name: Name,
    characteristic: Characteristic,
    write_handle: u16,
    write_data: Payload,
    timeout: Option<Timer>,
    watchdog: Timer,
}

impl Default for Peripheral {
    fn default() -> Self {
        Self {
            task: None,
            result: Ok(()),
            config: ScanConfig::default(),
            name: Name::new(),
            characteristic: Characteristic::default(),
            write_handle: 0,
            write_data: Payload::new(),
            timeout: None,
            watchdog: Timer::new(),
        }
    }
}

#[derive(Debug)]
struct State {
    power_on_requested: bool,
    /// Starts busy since the controller is still being reset
    power_change_busy: bool,
    receive_handler: Option<ReceiveHandler>,
    stdin: Deque<u8, STDIN_BUFFER_SIZE>,
    status: [u8; STATUS_REPORT_SIZE],
    status_pending: bool,
    stdout: Deque<u8, STDOUT_BUFFER_SIZE>,
    stdout_busy: bool,
    user_notification: Option<Payload>,
    advertising_task: Option<AdvertisingTask>,
    advertising_result: HubResult<()>,
    broadcast: AdvertisingData,
    is_advertising: bool,
    is_broadcasting: bool,
    is_observing: bool,
    observe_callback: Option<ObserveCallback>,
    observe_restart_requested: bool,
    peripheral: Peripheral,
}

impl Default for State {
    fn default() -> Self {
        Self {
            power_on_requested: false,
            power_change_busy: true,
            receive_handler: None,
            stdin: Deque::new(),
            status: [0; STATUS_REPORT_SIZE],
            status_pending: false,
            stdout: Deque::new(),
            stdout_busy: false,
            user_notification: None,
            advertising_task: None,
            advertising_result: Ok(()),
            broadcast: AdvertisingData::new(),
            is_advertising: false,
            is_broadcasting: false,
            is_observing: false,
            observe_callback: None,
            observe_restart_requested: false,
            peripheral: Peripheral::default(),
        }
    }
}

impl State {
    fn take_status(&mut self) -> Payload {
        self.status_pending = false;
        let mut payload = Payload::new();
        let _ = payload.extend_from_slice(&self.status);
        payload
    }

    fn take_stdout_chunk(&mut self) -> Payload {
        let mut payload = Payload::new();
        let _ = payload.push(EVENT_WRITE_STDOUT);
        while payload.len() < MAX_CHAR_SIZE {
            match self.stdout.pop_front() {
                Some(byte) => {
                    let _ = payload.push(byte);
                }
                None => break,
            }
        }
        payload
    }
}

/// Bluetooth driver state shared between the main thread and callers.
///
/// All access happens from the cooperative scheduler, so plain `RefCell`s
/// suffice. No borrow is held across a poll.
pub struct Bluetooth<B, K> {
    backend: RefCell<B>,
    clock: K,
    config: BluetoothConfig,
    state: RefCell<State>,
    cancel: CancelFlag,
}

impl<B, K> fmt::Debug for Bluetooth<B, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bluetooth")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl<B: Backend, K: Clock> Bluetooth<B, K> {
    pub fn new(backend: B, clock: K, config: BluetoothConfig) -> Self {
        Self {
            backend: RefCell::new(backend),
            clock,
            config,
            state: RefCell::new(State::default()),
            cancel: CancelFlag::new(),
        }
    }

    pub fn config(&self) -> &BluetoothConfig {
        &self.config
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn hub_name(&self) -> &str {
        self.config.hub_name.as_str()
    }

    /// Shared access to the backend, for inspection
    pub fn backend(&self) -> Ref<'_, B> {
        self.backend.borrow()
    }

    pub fn is_connected(&self, connection: Connection) -> bool {
        self.backend.borrow().is_connected(connection)
    }

    /// True once power on was requested and the controller is initialized
    pub fn is_powered_on(&self) -> bool {
        let state = self.state.borrow();
        state.power_on_requested && !state.power_change_busy
    }

    //
    // Incoming data
    //

    /// Install the handler for incoming commands other than stdin
    pub fn set_receive_handler(&self, handler: Option<ReceiveHandler>) {
        self.state.borrow_mut().receive_handler = handler;
    }

    /// Handle a command written by the connected host.
    ///
    /// Stdin bytes are buffered for [`Bluetooth::read_stdin`]; everything
    /// else goes to the receive handler.
    pub fn receive(&self, data: &[u8]) -> HubResult<()> {
        let Some((&command, payload)) = data.split_first() else {
            return Err(Error::InvalidArgument);
        };

        if command == COMMAND_WRITE_STDIN {
            let mut state = self.state.borrow_mut();
            for &byte in payload {
                if state.stdin.push_back(byte).is_err() {
                    warn!("bluetooth: stdin overflow");
                    return Err(Error::NoMemory);
                }
            }
            request_poll();
            return Ok(());
        }

        let handler = self.state.borrow().receive_handler;
        match handler {
            Some(handler) => handler(data),
            None => Err(Error::NotSupported),
        }
    }

    /// Take buffered stdin bytes
    pub fn read_stdin(&self, buf: &mut [u8]) -> usize {
        let mut state = self.state.borrow_mut();
        let mut count = 0;
        for slot in buf.iter_mut() {
            match state.stdin.pop_front() {
                Some(byte) => {
                    *slot = byte;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    pub fn stdin_available(&self) -> usize {
        self.state.borrow().stdin.len()
    }

    /// Forward a notification from the connected peripheral
    pub fn handle_peripheral_notification(&self, data: &[u8]) -> HubResult<()> {
        let handler = self.state.borrow().peripheral.config.notification_handler;
        match handler {
            Some(handler) => handler(data),
            None => Ok(()),
        }
    }

    /// Forward an advertisement seen while observing
    pub fn handle_advertisement(&self, data: &[u8], rssi: i8) {
        let callback = {
            let state = self.state.borrow();
            state.observe_callback.filter(|_| state.is_observing)
        };
        if let Some(callback) = callback {
            callback(data, rssi);
        }
    }

    //
    // Outgoing notifications
    //

    /// Queue a status report. Identical consecutive reports are dropped.
    pub fn schedule_status_update(&self, status: &[u8; STATUS_REPORT_SIZE]) {
        let mut state = self.state.borrow_mut();
        if state.status == *status {
            return;
        }
        state.status = *status;
        state.status_pending = true;
        request_poll();
    }

    /// Buffer stdout bytes.
    ///
    /// Returns how many bytes were taken, or `Pending` if the buffer is
    /// full. Fails with [`Error::InvalidOperation`] without a connection.
    pub fn tx(&self, data: &[u8]) -> Status<usize> {
        if !self.is_connected(Connection::Pybricks) {
            return Poll::Ready(Err(Error::InvalidOperation));
        }
        if data.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let mut state = self.state.borrow_mut();
        let mut written = 0;
        for &byte in data {
            if state.stdout.push_back(byte).is_err() {
                break;
            }
            written += 1;
        }
        if written == 0 {
            return Poll::Pending;
        }

        // Sending is left to the main thread so small writes coalesce.
        request_poll();
        Poll::Ready(Ok(written))
    }

    /// Free stdout buffer space, unlimited without a connection
    pub fn tx_available(&self) -> usize {
        if !self.is_connected(Connection::Pybricks) {
            return usize::MAX;
        }
        let state = self.state.borrow();
        state.stdout.capacity() - state.stdout.len()
    }

    /// True when all buffered stdout has been sent
    pub fn tx_is_idle(&self) -> bool {
        if !self.is_connected(Connection::Pybricks) {
            return true;
        }
        let state = self.state.borrow();
        !state.stdout_busy && state.stdout.is_empty()
    }

    //
    // Advertising and scanning
    //

    fn queue_advertising_task(&self, state: &mut State, task: AdvertisingTask) {
        debug!("bluetooth: queued {:?}", task);
        state.advertising_task = Some(task);
        state.advertising_result = Ok(());
        request_poll();
    }

    /// Start or stop advertising the hub for connections
    pub fn start_advertising(&self, start: bool) -> HubResult<()> {
        let mut state = self.state.borrow_mut();
        if state.advertising_task.is_some() {
            return Err(Error::Busy);
        }

        state.broadcast.clear();
        let task = if start {
            AdvertisingTask::StartAdvertising
        } else {
            AdvertisingTask::StopAdvertising
        };
        self.queue_advertising_task(&mut state, task);
        Ok(())
    }

    /// Broadcast `data` as advertising payload. Empty data stops it.
    pub fn start_broadcasting(&self, data: &[u8]) -> HubResult<()> {
        let mut state = self.state.borrow_mut();
        if state.advertising_task.is_some() {
            return Err(Error::Busy);
        }
        if data.len() > MAX_ADV_SIZE {
            return Err(Error::InvalidArgument);
        }

        if data.is_empty() {
            if state.is_broadcasting {
                self.queue_advertising_task(&mut state, AdvertisingTask::StopAdvertising);
            }
            return Ok(());
        }

        // Repeating the same payload in a tight loop costs no radio traffic.
        if state.is_broadcasting && state.broadcast.as_slice() == data {
            return Ok(());
        }

        state.broadcast.clear();
        state
            .broadcast
            .extend_from_slice(data)
            .map_err(|_| Error::InvalidArgument)?;
        self.queue_advertising_task(&mut state, AdvertisingTask::StartBroadcasting);
        Ok(())
    }

    /// Observe advertisements with `callback`, or stop observing with `None`
    pub fn start_observing(&self, callback: Option<ObserveCallback>) -> HubResult<()> {
        let mut state = self.state.borrow_mut();
        if state.advertising_task.is_some() {
            return Err(Error::Busy);
        }

        state.observe_callback = callback;
        let should_observe = callback.is_some();
        if should_observe == state.is_observing {
            return Ok(());
        }

        let task = if should_observe {
            AdvertisingTask::StartObserving
        } else {
            AdvertisingTask::StopObserving
        };
        self.queue_advertising_task(&mut state, task);
        Ok(())
    }

    /// Ask the main thread to stop and start observing again
    pub fn restart_observing_request(&self) {
        self.state.borrow_mut().observe_restart_requested = true;
        request_poll();
    }

    pub fn is_advertising(&self) -> bool {
        self.state.borrow().is_advertising
    }

    pub fn is_broadcasting(&self) -> bool {
        self.state.borrow().is_broadcasting
    }

    pub fn is_observing(&self) -> bool {
        self.state.borrow().is_observing
    }

    fn advertising_command(&self, task: AdvertisingTask) -> Command {
        match task {
            AdvertisingTask::StartAdvertising => Command::StartAdvertising {
                hub_name: self.config.hub_name.clone(),
            },
            AdvertisingTask::StopAdvertising => Command::StopAdvertising,
            AdvertisingTask::StartBroadcasting => {
                Command::StartBroadcasting(self.state.borrow().broadcast.clone())
            }
            AdvertisingTask::StartObserving => Command::StartObserving,
            AdvertisingTask::StopObserving => Command::StopObserving,
        }
    }

    fn finish_advertising_task(&self, result: HubResult<Response>) {
        let mut state = self.state.borrow_mut();
        let Some(task) = state.advertising_task.take() else {
            return;
        };

        if result.is_ok() {
            match task {
                AdvertisingTask::StartAdvertising => state.is_advertising = true,
                AdvertisingTask::StopAdvertising => {
                    state.is_advertising = false;
                    state.is_broadcasting = false;
                }
                AdvertisingTask::StartBroadcasting => state.is_broadcasting = true,
                AdvertisingTask::StartObserving => state.is_observing = true,
                AdvertisingTask::StopObserving => state.is_observing = false,
            }
        }
        state.advertising_result = result.map(drop);
        debug!("bluetooth: {:?} finished: {:?}", task, state.advertising_result);
        request_poll();
    }

    //
    // Peripheral
    //

    /// Scan for a peripheral and connect to it
    pub fn peripheral_scan_and_connect(&self, config: ScanConfig) -> HubResult<()> {
        if self.is_connected(Connection::Peripheral) {
            return Err(Error::Busy);
        }
        let mut state = self.state.borrow_mut();
        if state.peripheral.task.is_some() {
            return Err(Error::Busy);
        }

        let peripheral = &mut state.peripheral;
        *peripheral = Peripheral::default();
        peripheral.config = config;
        peripheral.timeout = config.timeout.map(|timeout| {
            let mut timer = Timer::new();
            timer.start(&self.clock, timeout);
            timer
        });
        peripheral.watchdog.start(&self.clock, PERIPHERAL_WATCHDOG);
        peripheral.task = Some(PeripheralTask::ScanAndConnect);
        self.cancel.clear();
        request_poll();
        Ok(())
    }

    /// Disconnect from the peripheral. Succeeds if not connected.
    pub fn peripheral_disconnect(&self) -> HubResult<()> {
        let mut state = self.state.borrow_mut();
        if state.peripheral.task.is_some() {
            return Err(Error::Busy);
        }
        if !self.is_connected(Connection::Peripheral) {
            return Ok(());
        }

        state.peripheral.config.notification_handler = None;
        self.queue_peripheral_task(&mut state, PeripheralTask::Disconnect);
        Ok(())
    }

    /// Look up the handle of `characteristic` on the peripheral
    pub fn peripheral_discover_characteristic(
        &self,
        mut characteristic: Characteristic,
    ) -> HubResult<()> {
        let mut state = self.peripheral_ready()?;
        characteristic.handle = 0;
        state.peripheral.characteristic = characteristic;
        self.queue_peripheral_task(&mut state, PeripheralTask::DiscoverCharacteristic);
        Ok(())
    }

    /// Read the value of a discovered characteristic
    pub fn peripheral_read_characteristic(&self, characteristic: Characteristic) -> HubResult<()> {
        let mut state = self.peripheral_ready()?;
        state.peripheral.characteristic = characteristic;
        self.queue_peripheral_task(&mut state, PeripheralTask::ReadCharacteristic);
        Ok(())
    }

    /// Write a characteristic value by handle
    pub fn peripheral_write_characteristic(&self, handle: u16, data: &[u8]) -> HubResult<()> {
        let mut state = self.peripheral_ready()?;
        if data.len() > MAX_CHAR_SIZE {
            return Err(Error::InvalidArgument);
        }

        state.peripheral.write_handle = handle;
        state.peripheral.write_data.clear();
        state
            .peripheral
            .write_data
            .extend_from_slice(data)
            .map_err(|_| Error::InvalidArgument)?;
        self.queue_peripheral_task(&mut state, PeripheralTask::WriteCharacteristic);
        Ok(())
    }

    /// Ask a running peripheral scan to stop.
    ///
    /// Other peripheral tasks run to completion.
    pub fn cancel_operation_request(&self) {
        self.cancel.request();
    }

    /// Name of the connected peripheral
    pub fn peripheral_name(&self) -> Name {
        self.state.borrow().peripheral.name.clone()
    }

    /// Characteristic as left by the last discover or read
    pub fn peripheral_characteristic(&self) -> Characteristic {
        self.state.borrow().peripheral.characteristic.clone()
    }

    fn peripheral_ready(&self) -> HubResult<RefMut<'_, State>> {
        if !self.is_connected(Connection::Peripheral) {
            return Err(Error::NoDevice);
        }
        let state = self.state.borrow_mut();
        if state.peripheral.task.is_some() {
            return Err(Error::Busy);
        }
        Ok(state)
    }

    fn queue_peripheral_task(&self, state: &mut State, task: PeripheralTask) {
        debug!("bluetooth: queued {:?}", task);
        state.peripheral.task = Some(task);
        state.peripheral.result = Ok(());
        request_poll();
    }

    fn peripheral_command(&self, task: PeripheralTask) -> Command {
        let state = self.state.borrow();
        let peripheral = &state.peripheral;
        match task {
            PeripheralTask::ScanAndConnect => Command::ScanAndConnect(peripheral.config),
            PeripheralTask::Disconnect => Command::Disconnect,
            PeripheralTask::DiscoverCharacteristic => {
                Command::DiscoverCharacteristic(peripheral.characteristic.clone())
            }
            PeripheralTask::ReadCharacteristic => {
                Command::ReadCharacteristic(peripheral.characteristic.clone())
            }
            PeripheralTask::WriteCharacteristic => Command::WriteCharacteristic {
                handle: peripheral.write_handle,
                data: peripheral.write_data.clone(),
            },
        }
    }

    /// Reason to abandon the running peripheral task early, if any
    fn peripheral_interruption(&self) -> Option<Error> {
        let state = self.state.borrow();
        let peripheral = &state.peripheral;
        if peripheral.task != Some(PeripheralTask::ScanAndConnect) {
            return None;
        }
        if self.cancel.is_requested() || peripheral.watchdog.is_expired(&self.clock) {
            return Some(Error::Canceled);
        }
        if peripheral
            .timeout
            .is_some_and(|timer| timer.is_expired(&self.clock))
        {
            return Some(Error::TimedOut);
        }
        None
    }

    fn finish_peripheral_task(&self, result: HubResult<Response>) {
        let mut state = self.state.borrow_mut();
        let peripheral = &mut state.peripheral;
        let Some(task) = peripheral.task.take() else {
            return;
        };

        peripheral.result = match result {
            Ok(Response::Connected { name }) => {
                peripheral.name = name;
                Ok(())
            }
            Ok(Response::Characteristic(characteristic)) => {
                peripheral.characteristic = characteristic;
                Ok(())
            }
            Ok(Response::Done) => Ok(()),
            Err(err) => Err(err),
        };
        debug!("bluetooth: {:?} finished: {:?}", task, peripheral.result);
        self.cancel.clear();
        request_poll();
    }
}

/// Turn the radio on or off and wait until the change has taken effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerOn {
    on: bool,
    requested: bool,
}

impl PowerOn {
    pub const fn new(on: bool) -> Self {
        Self {
            on,
            requested: false,
        }
    }
}

impl<'a, B: Backend, K: Clock> Operation<&'a Bluetooth<B, K>> for PowerOn {
    type Output = ();

    fn poll(&mut self, bt: &mut &'a Bluetooth<B, K>) -> Status {
        let mut state = bt.state.borrow_mut();

        // Let an ongoing change finish first.
        if state.power_change_busy {
            return Poll::Pending;
        }
        if self.requested || state.power_on_requested == self.on {
            return Poll::Ready(Ok(()));
        }

        debug!("bluetooth: power {} requested", if self.on { "on" } else { "off" });
        state.power_change_busy = true;
        state.power_on_requested = self.on;
        self.requested = true;
        request_poll();
        Poll::Pending
    }
}

/// Send a Pybricks event notification and wait until it is out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendEvent<'d> {
    event: u8,
    data: &'d [u8],
    queued: bool,
}

impl<'d> SendEvent<'d> {
    pub const fn new(event: u8, data: &'d [u8]) -> Self {
        Self {
            event,
            data,
            queued: false,
        }
    }
}

impl<'a, B: Backend, K: Clock> Operation<&'a Bluetooth<B, K>> for SendEvent<'_> {
    type Output = ();

    fn poll(&mut self, bt: &mut &'a Bluetooth<B, K>) -> Status {
        let mut state = bt.state.borrow_mut();

        if self.queued {
            return if state.user_notification.is_some() {
                Poll::Pending
            } else {
                Poll::Ready(Ok(()))
            };
        }

        if self.data.len() + 1 > MAX_CHAR_SIZE {
            return Poll::Ready(Err(Error::InvalidArgument));
        }
        if state.user_notification.is_some() {
            return Poll::Ready(Err(Error::Busy));
        }

        let mut payload = Payload::new();
        let _ = payload.push(self.event);
        let _ = payload.extend_from_slice(self.data);
        state.user_notification = Some(payload);
        self.queued = true;
        request_poll();
        Poll::Pending
    }
}

/// Wait for the queued peripheral task to finish.
///
/// A scan is canceled if nobody polls this for a while.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwaitPeripheralCommand;

impl<'a, B: Backend, K: Clock> Operation<&'a Bluetooth<B, K>> for AwaitPeripheralCommand {
    type Output = ();

    fn poll(&mut self, bt: &mut &'a Bluetooth<B, K>) -> Status {
        let mut state = bt.state.borrow_mut();
        state.peripheral.watchdog.start(&bt.clock, PERIPHERAL_WATCHDOG);
        match state.peripheral.task {
            Some(_) => Poll::Pending,
            None => Poll::Ready(state.peripheral.result),
        }
    }
}

/// Wait for the queued advertising or scanning task to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AwaitAdvertiseOrScan;

impl<'a, B: Backend, K: Clock> Operation<&'a Bluetooth<B, K>> for AwaitAdvertiseOrScan {
    type Output = ();

    fn poll(&mut self, bt: &mut &'a Bluetooth<B, K>) -> Status {
        let state = bt.state.borrow();
        match state.advertising_task {
            Some(_) => Poll::Pending,
            None => Poll::Ready(state.advertising_result),
        }
    }
}
