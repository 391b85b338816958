//! A two-port virtual hub

use hub_core::HubResult;
use hub_drv::ioport::{enable_vcc, find_port, power_off_all, IoportPins, PortId};
use hub_drv::{Port, PortMode, PortModes, PortPlatformData};
use log::info;

use crate::LoggingPin;

const UART_ALT: u8 = 7;

/// Port A takes sensors: GPIO/ADC, UART or I2C
pub static PORT_A: PortPlatformData = PortPlatformData::new(
    b'A',
    PortModes::only(PortMode::GpioAdc)
        .with(PortMode::Uart)
        .with(PortMode::I2c),
)
.uart(0)
.i2c(0);

/// Port B is wired to a motor encoder
pub static PORT_B: PortPlatformData =
    PortPlatformData::new(b'B', PortModes::only(PortMode::Quadrature)).counter(0);

fn port_a_pins() -> IoportPins<LoggingPin> {
    IoportPins {
        uart_buf: LoggingPin::new("A.buf", 0),
        p5: LoggingPin::new("A.p5", 1),
        uart_tx: LoggingPin::new("A.tx", 2),
        uart_tx_alt: UART_ALT,
        p6: LoggingPin::new("A.p6", 3),
        uart_rx: LoggingPin::new("A.rx", 4),
        uart_rx_alt: UART_ALT,
    }
}

/// Ports plus the shared VCC pin
#[derive(Debug)]
pub struct Board {
    ports: [Port<LoggingPin>; 2],
    vcc: LoggingPin,
}

impl Board {
    pub fn new() -> Self {
        Self {
            ports: [
                Port::new(&PORT_A, Some(port_a_pins())),
                Port::new(&PORT_B, None),
            ],
            vcc: LoggingPin::new("vcc", 5),
        }
    }

    /// Power the ports and put each one in its startup mode
    pub fn init(&mut self) -> HubResult<()> {
        enable_vcc(&mut self.vcc, true)?;
        for port in self.ports.iter_mut() {
            port.init()?;
            info!("port {}: {:?}", port.id(), port.mode());
        }
        Ok(())
    }

    pub fn port_mut(&mut self, id: PortId) -> HubResult<&mut Port<LoggingPin>> {
        find_port(&mut self.ports, id)
    }

    pub fn ports(&self) -> &[Port<LoggingPin>] {
        &self.ports
    }

    pub fn vcc(&self) -> &LoggingPin {
        &self.vcc
    }

    pub fn power_off(&mut self) -> HubResult<()> {
        power_off_all(&mut self.ports, &mut self.vcc)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
