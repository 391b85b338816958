use std::collections::VecDeque;
use std::io::Cursor;
use std::task::Poll;
use std::thread;
use std::time::Duration as StdDuration;

use hub_core::{Duration, ManualClock, Operation};
use hub_drv::bluetooth::{
    Bluetooth, BluetoothConfig, InputStream, OutputSink, SimulatedBackend, SimulationContext,
    SimulationProcess,
};
use hub_drv::ioport::PortId;
use hub_drv::PortMode;
use hub_hal::{HalError, Level, PinMode};
use hub_sim::{Board, Echo, StdinStream, StdoutSink};

#[test]
fn stdin_stream_hands_over_chunks() {
    let mut stream = StdinStream::spawn(Cursor::new(b"hello".to_vec()));
    let mut received = Vec::new();
    let mut buf = [0u8; 3];

    for _ in 0..200 {
        match stream.read(&mut buf) {
            Ok(count) => received.extend_from_slice(&buf[..count]),
            Err(nb::Error::WouldBlock) if stream.is_closed() => break,
            Err(nb::Error::WouldBlock) => thread::sleep(StdDuration::from_millis(5)),
            Err(nb::Error::Other(err)) => panic!("unexpected error: {err}"),
        }
    }

    assert_eq!(received, b"hello");
    assert!(stream.is_closed());
}

#[test]
fn stdout_sink_writes_everything() {
    let mut sink = StdoutSink::new(Vec::new());
    sink.write(b"abc").unwrap();
    sink.write(b"def").unwrap();
    assert_eq!(sink.get_ref(), b"abcdef");
}

#[test]
fn board_starts_in_default_modes() {
    let mut board = Board::new();
    board.init().unwrap();

    assert_eq!(board.ports()[0].mode(), PortMode::GpioAdc);
    assert_eq!(board.ports()[1].mode(), PortMode::Quadrature);
    assert_eq!(board.vcc().level(), Level::High);

    let port_a = board.port_mut(PortId(b'A')).unwrap();
    port_a.set_mode(PortMode::Uart).unwrap();
    let pins = port_a.pins().unwrap();
    assert_eq!(pins.uart_tx.mode(), PinMode::Alternate(7));
    assert_eq!(pins.uart_buf.level(), Level::Low);

    board.power_off().unwrap();
    assert_eq!(board.ports()[0].mode(), PortMode::None);
    assert_eq!(board.ports()[1].mode(), PortMode::Quadrature);
    assert_eq!(board.vcc().level(), Level::Low);
}

struct Typed(VecDeque<u8>);

impl InputStream for Typed {
    fn read(&mut self, buf: &mut [u8]) -> nb::Result<usize, HalError> {
        if self.0.is_empty() {
            return Err(nb::Error::WouldBlock);
        }
        let count = buf.len().min(self.0.len());
        for (slot, byte) in buf.iter_mut().zip(self.0.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}

#[test]
fn echo_sends_input_back() {
    let clock = ManualClock::new();
    let bt = Bluetooth::new(
        SimulatedBackend::new(StdoutSink::new(Vec::new())),
        &clock,
        BluetoothConfig::builder().hub_name("Test Hub").build(),
    );
    let mut cx = SimulationContext::new(&bt, Typed(b"echo me".iter().copied().collect()));
    let mut sim = SimulationProcess::default();
    let mut echo = Echo::default();

    for _ in 0..20 {
        clock.advance(Duration::from_millis(1));
        assert_eq!(sim.poll(&mut cx), Poll::Pending);
        let mut bt_ref = &bt;
        assert_eq!(echo.poll(&mut bt_ref), Poll::Pending);
    }

    assert!(bt.backend().is_advertising());
    assert_eq!(bt.backend().sink().get_ref(), b"echo me");
    assert!(echo.backlog().is_empty());
}
