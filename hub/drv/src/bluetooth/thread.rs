//! The process that services Bluetooth requests

use core::fmt;
use core::task::Poll;

use hub_core::{ready, AwaitMs, Clock, Error, Operation, Status, Timer};
use hub_os::request_poll;
use log::{debug, warn};

use super::{Backend, Bluetooth, Command, Connection, PeripheralTask, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Step {
    #[default]
    Reset,
    Resetting,
    Off,
    Initializing,
    Idle,
    Status,
    SendingStatus,
    Stdout,
    SendingStdout,
    UserData,
    SendingUserData,
    AdvertiseOrScan,
    RunningAdvertiseOrScan,
    Peripheral,
    StoppingObserve,
    RunningPeripheral,
    ObserveRestart,
    RestartStop,
    RestartStart,
}

/// Main Bluetooth process.
///
/// Resets the controller, waits for a power on request and then services
/// queued work each poll interval, in a fixed order: status report, stdout,
/// user notification, advertising or scanning, peripheral, observe restart.
/// A power off request resets the controller and starts over. Never
/// completes.
pub struct MainThread<B: Backend> {
    step: Step,
    sub: Option<B::Op>,
    wait: AwaitMs,
    status_timer: Timer,
}

impl<B: Backend> Default for MainThread<B> {
    fn default() -> Self {
        Self {
            step: Step::Reset,
            sub: None,
            wait: AwaitMs::default(),
            status_timer: Timer::new(),
        }
    }
}

impl<B: Backend> fmt::Debug for MainThread<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MainThread")
            .field("step", &self.step)
            .field("busy", &self.sub.is_some())
            .finish()
    }
}

impl<B: Backend> MainThread<B> {
    pub fn new() -> Self {
        Self::default()
    }

    fn begin<K>(&mut self, bt: &Bluetooth<B, K>, command: Command) {
        self.sub = Some(bt.backend.borrow_mut().begin(command));
    }

    fn poll_sub<K>(&mut self, bt: &Bluetooth<B, K>) -> Status<Response> {
        let Some(op) = self.sub.as_mut() else {
            return Poll::Ready(Err(Error::InvalidOperation));
        };
        let result = ready!(op.poll(&mut *bt.backend.borrow_mut()));
        self.sub = None;
        Poll::Ready(result)
    }
}

impl<'a, B: Backend, K: Clock> Operation<&'a Bluetooth<B, K>> for MainThread<B> {
    type Output = ();

    fn poll(&mut self, bt: &mut &'a Bluetooth<B, K>) -> Status {
        let bt: &Bluetooth<B, K> = bt;

        loop {
            match self.step {
                Step::Reset => {
                    {
                        let mut state = bt.state.borrow_mut();
                        state.is_advertising = false;
                        state.is_broadcasting = false;
                        state.is_observing = false;
                        state.observe_restart_requested = false;
                    }
                    self.begin(bt, Command::ResetController);
                    self.step = Step::Resetting;
                }
                Step::Resetting => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: controller reset failed: {}", err);
                    }
                    debug!("bluetooth: off");
                    bt.state.borrow_mut().power_change_busy = false;
                    request_poll();
                    self.step = Step::Off;
                }
                Step::Off => {
                    if !bt.state.borrow().power_on_requested {
                        return Poll::Pending;
                    }
                    self.begin(bt, Command::InitializeController);
                    self.step = Step::Initializing;
                }
                Step::Initializing => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: init failed: {}", err);
                        self.step = Step::Reset;
                        continue;
                    }
                    debug!("bluetooth: on");
                    bt.state.borrow_mut().power_change_busy = false;
                    request_poll();
                    self.wait = AwaitMs::new(bt.config.poll_interval);
                    self.status_timer.start(&bt.clock, bt.config.status_interval);
                    self.step = Step::Idle;
                }
                Step::Idle => {
                    if !bt.state.borrow().power_on_requested {
                        debug!("bluetooth: power off requested");
                        self.step = Step::Reset;
                        continue;
                    }
                    ready!(self.wait.poll_with(&bt.clock))?;
                    self.wait.restart();
                    self.step = Step::Status;
                }
                Step::Status => {
                    let can_send = bt.is_connected(Connection::Pybricks);
                    let due = bt.state.borrow().status_pending
                        || self.status_timer.is_expired(&bt.clock);
                    self.step = Step::Stdout;
                    if can_send && due {
                        let payload = bt.state.borrow_mut().take_status();
                        self.begin(bt, Command::SendNotification(payload));
                        self.step = Step::SendingStatus;
                    }
                }
                Step::SendingStatus => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: status report not sent: {}", err);
                    }
                    self.status_timer.extend(&bt.clock);
                    self.step = Step::Stdout;
                }
                Step::Stdout => {
                    let can_send = bt.is_connected(Connection::Pybricks);
                    self.step = Step::UserData;
                    if can_send && !bt.state.borrow().stdout.is_empty() {
                        let payload = {
                            let mut state = bt.state.borrow_mut();
                            state.stdout_busy = true;
                            state.take_stdout_chunk()
                        };
                        self.begin(bt, Command::SendNotification(payload));
                        self.step = Step::SendingStdout;
                    }
                }
                Step::SendingStdout => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: stdout not sent: {}", err);
                    }
                    bt.state.borrow_mut().stdout_busy = false;
                    request_poll();
                    self.step = Step::UserData;
                }
                Step::UserData => {
                    let can_send = bt.is_connected(Connection::Pybricks);
                    self.step = Step::AdvertiseOrScan;
                    if can_send {
                        let payload = bt.state.borrow().user_notification.clone();
                        if let Some(payload) = payload {
                            self.begin(bt, Command::SendNotification(payload));
                            self.step = Step::SendingUserData;
                        }
                    }
                }
                Step::SendingUserData => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: event not sent: {}", err);
                    }
                    bt.state.borrow_mut().user_notification = None;
                    request_poll();
                    self.step = Step::AdvertiseOrScan;
                }
                Step::AdvertiseOrScan => {
                    let task = bt.state.borrow().advertising_task;
                    self.step = Step::Peripheral;
                    if let Some(task) = task {
                        let command = bt.advertising_command(task);
                        self.begin(bt, command);
                        self.step = Step::RunningAdvertiseOrScan;
                    }
                }
                Step::RunningAdvertiseOrScan => {
                    let result = ready!(self.poll_sub(bt));
                    bt.finish_advertising_task(result);
                    self.step = Step::Peripheral;
                }
                Step::Peripheral => {
                    let task = bt.state.borrow().peripheral.task;
                    self.step = Step::ObserveRestart;
                    match task {
                        None => {}
                        // Scanning for a peripheral conflicts with observing.
                        Some(PeripheralTask::ScanAndConnect) if bt.is_observing() => {
                            self.begin(bt, Command::StopObserving);
                            self.step = Step::StoppingObserve;
                        }
                        Some(task) => {
                            let command = bt.peripheral_command(task);
                            self.begin(bt, command);
                            self.step = Step::RunningPeripheral;
                        }
                    }
                }
                Step::StoppingObserve => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: stop observing failed: {}", err);
                    }
                    {
                        let mut state = bt.state.borrow_mut();
                        state.is_observing = false;
                        state.observe_restart_requested = true;
                    }
                    let command = bt.peripheral_command(PeripheralTask::ScanAndConnect);
                    self.begin(bt, command);
                    self.step = Step::RunningPeripheral;
                }
                Step::RunningPeripheral => {
                    if let Some(err) = bt.peripheral_interruption() {
                        debug!("bluetooth: peripheral scan stopped: {}", err);
                        self.sub = None;
                        bt.finish_peripheral_task(Err(err));
                        self.step = Step::ObserveRestart;
                        continue;
                    }
                    let result = ready!(self.poll_sub(bt));
                    bt.finish_peripheral_task(result);
                    self.step = Step::ObserveRestart;
                }
                Step::ObserveRestart => {
                    self.step = Step::Idle;
                    let restart = {
                        let state = bt.state.borrow();
                        state.observe_restart_requested && state.observe_callback.is_some()
                    };
                    if restart {
                        self.begin(bt, Command::StopObserving);
                        self.step = Step::RestartStop;
                    } else {
                        bt.state.borrow_mut().observe_restart_requested = false;
                    }
                }
                Step::RestartStop => {
                    if let Err(err) = ready!(self.poll_sub(bt)) {
                        warn!("bluetooth: stop observing failed: {}", err);
                    }
                    bt.state.borrow_mut().is_observing = false;
                    self.begin(bt, Command::StartObserving);
                    self.step = Step::RestartStart;
                }
                Step::RestartStart => {
                    let result = ready!(self.poll_sub(bt));
                    let mut state = bt.state.borrow_mut();
                    match result {
                        Ok(_) => state.is_observing = true,
                        Err(err) => warn!("bluetooth: restart observing failed: {}", err),
                    }
                    state.observe_restart_requested = false;
                    self.step = Step::Idle;
                }
            }
        }
    }
}
