//! I/O port pin groups and the port mode state machine.
//!
//! Every electrical mode change goes through the GPIO/ADC baseline first:
//! all pins become inputs with pull resistors explicitly disabled and the
//! UART line driver is switched off. Only then are the pins configured for
//! the requested role, so nothing left over from a previous mode survives.

use core::fmt;

use hub_core::{Error, HubResult};
use hub_hal::GpioPin;
use hub_hal::Pull;
use log::{debug, warn};

/// Electrical mode of pins 5 and 6 of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum P5P6Mode {
    /// All pins inputs, no pull, line driver off
    GpioAdc,
    /// Wired to a quadrature counter at startup
    Quadrature,
    /// Pins handed to the UART peripheral, line driver on
    Uart,
    /// Pins prepared for open-drain I2C
    I2c,
}

#[cfg(feature = "defmt")]
impl defmt::Format for P5P6Mode {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::GpioAdc => defmt::write!(fmt, "GpioAdc"),
            Self::Quadrature => defmt::write!(fmt, "Quadrature"),
            Self::Uart => defmt::write!(fmt, "Uart"),
            Self::I2c => defmt::write!(fmt, "I2c"),
        }
    }
}

/// Pins of one port
#[derive(Debug)]
pub struct IoportPins<P> {
    /// Enables (low) or disables (high) the external UART line driver
    pub uart_buf: P,
    /// Pin 5 input
    pub p5: P,
    /// Pin 5 output, or UART TX when the buffer is enabled
    pub uart_tx: P,
    /// Alternate function number of `uart_tx` for UART use
    pub uart_tx_alt: u8,
    /// Pin 6 input or output
    pub p6: P,
    /// Pin 6 input, or UART RX when the buffer is enabled
    pub uart_rx: P,
    /// Alternate function number of `uart_rx` for UART use
    pub uart_rx_alt: u8,
}

impl<P: GpioPin> IoportPins<P> {
    fn reset_to_baseline(&mut self) -> HubResult<()> {
        self.p5.input()?;
        self.p6.input()?;
        self.uart_tx.input()?;
        self.uart_rx.input()?;
        self.uart_buf.out_high()?;

        // Not left to the reset defaults: a bootloader may have enabled pulls,
        // which breaks passive device detection.
        self.p5.set_pull(Pull::None)?;
        self.p6.set_pull(Pull::None)?;
        self.uart_buf.set_pull(Pull::None)?;
        self.uart_tx.set_pull(Pull::None)?;
        self.uart_rx.set_pull(Pull::None)?;
        Ok(())
    }
}

/// Why a mode request was refused.
///
/// All causes surface as [`Error::NotSupported`]; this keeps them apart for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeRejection {
    /// The port has no GPIO pins to configure
    NoPins,
    /// Quadrature wiring is fixed at startup and cannot be renegotiated
    QuadratureFixed,
    /// The port does not list the requested mode
    NotSupportedByPort,
}

impl fmt::Display for ModeRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPins => write!(f, "port has no pins"),
            Self::QuadratureFixed => write!(f, "quadrature mode is fixed at startup"),
            Self::NotSupportedByPort => write!(f, "mode not supported by port"),
        }
    }
}

impl From<ModeRejection> for Error {
    fn from(_: ModeRejection) -> Self {
        Error::NotSupported
    }
}

/// Check whether `mode` can be applied to a pin group
pub fn check_mode<P>(pins: Option<&IoportPins<P>>, mode: P5P6Mode) -> Result<(), ModeRejection> {
    if mode == P5P6Mode::Quadrature {
        return Err(ModeRejection::QuadratureFixed);
    }
    if pins.is_none() {
        return Err(ModeRejection::NoPins);
    }
    Ok(())
}

/// Configure the pins of a port for `mode`.
///
/// UART and I2C start from the GPIO/ADC baseline and stop at the first
/// failing pin operation. Quadrature is always refused here since the
/// counter driver owns that wiring.
pub fn set_mode<P: GpioPin>(pins: Option<&mut IoportPins<P>>, mode: P5P6Mode) -> HubResult<()> {
    check_mode(pins.as_deref(), mode)?;
    let Some(pins) = pins else {
        return Err(ModeRejection::NoPins.into());
    };

    match mode {
        P5P6Mode::GpioAdc => pins.reset_to_baseline(),
        P5P6Mode::Uart => {
            pins.reset_to_baseline()?;
            pins.uart_rx.alternate(pins.uart_rx_alt)?;
            pins.uart_tx.alternate(pins.uart_tx_alt)?;
            pins.uart_buf.out_low()?;
            Ok(())
        }
        P5P6Mode::I2c => {
            pins.reset_to_baseline()?;
            pins.p5.out_low()?;
            pins.p5.input()?;
            pins.p6.out_low()?;
            pins.p6.input()?;
            Ok(())
        }
        P5P6Mode::Quadrature => Err(ModeRejection::QuadratureFixed.into()),
    }
}

/// Switch VCC on pin 4 of all ports
pub fn enable_vcc<P: GpioPin + ?Sized>(vcc: &mut P, enable: bool) -> HubResult<()> {
    if enable {
        vcc.out_high()?;
    } else {
        vcc.out_low()?;
    }
    Ok(())
}

/// High level port mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PortMode {
    /// Not configured, pins at baseline
    #[default]
    None,
    GpioAdc,
    Uart,
    I2c,
    Quadrature,
}

impl PortMode {
    const fn bit(self) -> u8 {
        match self {
            Self::None => 0,
            Self::GpioAdc => 1 << 0,
            Self::Uart => 1 << 1,
            Self::I2c => 1 << 2,
            Self::Quadrature => 1 << 3,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PortMode {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::None => defmt::write!(fmt, "None"),
            Self::GpioAdc => defmt::write!(fmt, "GpioAdc"),
            Self::Uart => defmt::write!(fmt, "Uart"),
            Self::I2c => defmt::write!(fmt, "I2c"),
            Self::Quadrature => defmt::write!(fmt, "Quadrature"),
        }
    }
}

/// Set of [`PortMode`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortModes(u8);

impl PortModes {
    pub const EMPTY: Self = Self(0);

    pub const fn with(self, mode: PortMode) -> Self {
        Self(self.0 | mode.bit())
    }

    pub const fn only(mode: PortMode) -> Self {
        Self(mode.bit())
    }

    pub const fn contains(self, mode: PortMode) -> bool {
        let bit = mode.bit();
        bit != 0 && self.0 & bit == bit
    }

    pub const fn is_only(self, mode: PortMode) -> bool {
        self.0 == mode.bit()
    }
}

/// Port identifier, the letter printed next to the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub u8);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0 as char)
    }
}

/// Constant board data for one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPlatformData {
    pub id: PortId,
    pub supported_modes: PortModes,
    pub uart_driver: Option<u8>,
    pub i2c_driver: Option<u8>,
    pub counter_driver: Option<u8>,
}

impl PortPlatformData {
    pub const fn new(id: u8, supported_modes: PortModes) -> Self {
        Self {
            id: PortId(id),
            supported_modes,
            uart_driver: None,
            i2c_driver: None,
            counter_driver: None,
        }
    }

    pub const fn uart(mut self, index: u8) -> Self {
        self.uart_driver = Some(index);
        self
    }

    pub const fn i2c(mut self, index: u8) -> Self {
        self.i2c_driver = Some(index);
        self
    }

    pub const fn counter(mut self, index: u8) -> Self {
        self.counter_driver = Some(index);
        self
    }
}

/// A physical port: platform data, pins and the current mode.
///
/// The mode only changes through [`Port::set_mode`].
#[derive(Debug)]
pub struct Port<P> {
    pdata: &'static PortPlatformData,
    pins: Option<IoportPins<P>>,
    mode: PortMode,
    /// A switch failed part way; the pins match no mode
    pins_dirty: bool,
    last_rejection: Option<ModeRejection>,
}

impl<P: GpioPin> Port<P> {
    pub fn new(pdata: &'static PortPlatformData, pins: Option<IoportPins<P>>) -> Self {
        Self {
            pdata,
            pins,
            mode: PortMode::None,
            pins_dirty: false,
            last_rejection: None,
        }
    }

    /// Apply the startup mode.
    ///
    /// Quadrature-only ports are fixed to quadrature here and never change
    /// again; the counter driver has already wired them.
    pub fn init(&mut self) -> HubResult<()> {
        if self.is_quadrature_fixed() {
            self.mode = PortMode::Quadrature;
            debug!("port {}: fixed to quadrature", self.pdata.id);
            return Ok(());
        }
        if self.pdata.supported_modes.contains(PortMode::GpioAdc) {
            return self.set_mode(PortMode::GpioAdc);
        }
        Ok(())
    }

    /// Change the port mode.
    ///
    /// Does nothing if `mode` is already active, unless an earlier switch
    /// failed part way, in which case the pins are set up again. Fails with
    /// [`Error::NotSupported`] if the port does not offer `mode` or if
    /// quadrature is involved. [`PortMode::None`] is always accepted on
    /// ports that are not fixed to quadrature and resets the pins.
    pub fn set_mode(&mut self, mode: PortMode) -> HubResult<()> {
        if self.mode == mode && !self.pins_dirty {
            return Ok(());
        }

        if let Err(rejection) = self.check(mode) {
            warn!("port {}: {:?} refused: {}", self.pdata.id, mode, rejection);
            self.last_rejection = Some(rejection);
            return Err(rejection.into());
        }

        let result = match mode {
            PortMode::None => match self.pins.as_mut() {
                Some(pins) => set_mode(Some(pins), P5P6Mode::GpioAdc),
                None => Ok(()),
            },
            PortMode::GpioAdc => set_mode(self.pins.as_mut(), P5P6Mode::GpioAdc),
            PortMode::Uart => set_mode(self.pins.as_mut(), P5P6Mode::Uart),
            PortMode::I2c => set_mode(self.pins.as_mut(), P5P6Mode::I2c),
            PortMode::Quadrature => Err(ModeRejection::QuadratureFixed.into()),
        };

        match result {
            Ok(()) => {
                debug!("port {}: {:?} -> {:?}", self.pdata.id, self.mode, mode);
                self.mode = mode;
                self.pins_dirty = false;
                self.last_rejection = None;
                Ok(())
            }
            Err(err) => {
                warn!("port {}: switching to {:?} failed: {}", self.pdata.id, mode, err);
                self.mode = PortMode::None;
                self.pins_dirty = true;
                Err(err)
            }
        }
    }

    fn check(&self, mode: PortMode) -> Result<(), ModeRejection> {
        if self.is_quadrature_fixed() {
            return Err(ModeRejection::QuadratureFixed);
        }
        match mode {
            PortMode::None => Ok(()),
            PortMode::Quadrature if self.pdata.supported_modes.contains(mode) => {
                Err(ModeRejection::QuadratureFixed)
            }
            _ if !self.pdata.supported_modes.contains(mode) => {
                Err(ModeRejection::NotSupportedByPort)
            }
            _ if self.pins.is_none() => Err(ModeRejection::NoPins),
            _ => Ok(()),
        }
    }

    /// Reset the pins ahead of system power off.
    ///
    /// Ports fixed to quadrature keep their wiring.
    pub fn power_off(&mut self) -> HubResult<()> {
        if self.is_quadrature_fixed() {
            return Ok(());
        }
        self.set_mode(PortMode::None)
    }

    /// UART driver index, available only in UART mode
    pub fn uart_driver(&self) -> HubResult<u8> {
        let index = self.pdata.uart_driver.ok_or(Error::NotSupported)?;
        if self.mode != PortMode::Uart {
            return Err(Error::InvalidOperation);
        }
        Ok(index)
    }

    /// I2C driver index, available only in I2C mode.
    ///
    /// Re-applies the I2C pin setup, since a device may have left the bus
    /// lines in a different state.
    pub fn i2c_driver(&mut self) -> HubResult<u8> {
        let index = self.pdata.i2c_driver.ok_or(Error::NotSupported)?;
        if self.mode != PortMode::I2c {
            return Err(Error::InvalidOperation);
        }
        set_mode(self.pins.as_mut(), P5P6Mode::I2c)?;
        Ok(index)
    }

    /// Counter driver index, if the port has one
    pub fn counter_driver(&self) -> HubResult<u8> {
        self.pdata.counter_driver.ok_or(Error::NoDevice)
    }

    pub fn id(&self) -> PortId {
        self.pdata.id
    }

    pub fn mode(&self) -> PortMode {
        self.mode
    }

    /// Cause of the most recent refused mode request
    pub fn last_rejection(&self) -> Option<ModeRejection> {
        self.last_rejection
    }

    pub fn pins(&self) -> Option<&IoportPins<P>> {
        self.pins.as_ref()
    }

    pub fn platform_data(&self) -> &'static PortPlatformData {
        self.pdata
    }

    fn is_quadrature_fixed(&self) -> bool {
        self.pdata.supported_modes.is_only(PortMode::Quadrature)
    }
}

/// Find a port by its identifier
pub fn find_port<P: GpioPin>(ports: &mut [Port<P>], id: PortId) -> HubResult<&mut Port<P>> {
    ports
        .iter_mut()
        .find(|port| port.id() == id)
        .ok_or(Error::NoDevice)
}

/// Reset every port and switch off VCC
pub fn power_off_all<P: GpioPin, V: GpioPin + ?Sized>(
    ports: &mut [Port<P>],
    vcc: &mut V,
) -> HubResult<()> {
    let mut result = Ok(());
    for port in ports.iter_mut() {
        if let Err(err) = port.power_off() {
            result = Err(err);
        }
    }
    enable_vcc(vcc, false)?;
    result
}
