//! Serial bus variant.
//!
//! The port is anything implementing [`SerialPort`]: a UART peripheral, a
//! tty, or a byte stream standing in for one. Line settings are applied once
//! in `init`; `open` and `close` have nothing to do for a serial line.

use crate::config::{DriverConfig, SerialConfig};
use crate::driver::{BusDriver, BusInterface, BusType};
use crate::error::{Error, IoErrorKind, Result};
use crate::io::{Read, Write};

/// A physical serial line.
pub trait SerialPort: Read + Write {
    /// Applies line settings. A port that cannot honor them should fail.
    fn configure(&mut self, config: &SerialConfig) -> Result<()>;
}

/// A serial port together with the settings it is driven with.
#[derive(Debug)]
pub struct SerialDevice<T> {
    port: T,
    config: SerialConfig,
}

impl<T> SerialDevice<T> {
    /// Pairs `port` with the settings `init` will apply.
    pub fn new(port: T, config: SerialConfig) -> Self {
        Self { port, config }
    }

    /// Returns the line settings.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Returns the underlying port.
    pub fn port(&self) -> &T {
        &self.port
    }

    /// Returns the underlying port mutably.
    pub fn port_mut(&mut self) -> &mut T {
        &mut self.port
    }

    /// Consumes the device, returning the port.
    pub fn into_inner(self) -> T {
        self.port
    }
}

/// Capability table for serial buses.
#[derive(Debug)]
pub struct SerialInterface;

/// The table shared by every serial driver.
pub static SERIAL_INTERFACE: SerialInterface = SerialInterface;

impl<T: SerialPort + 'static> BusInterface<SerialDevice<T>> for SerialInterface {
    fn init(&self, bus: &mut BusDriver<SerialDevice<T>>) -> Result<()> {
        let device = bus.port_mut();
        let config = device.config;
        device.port.configure(&config)?;

        log::info!(
            "{} configured: {} baud, {} data bits, {:?} parity, {:?} stop, tx pin {}, rx pin {}",
            bus,
            config.baud_rate,
            config.data_bits,
            config.parity,
            config.stop_bits,
            config.tx_pin,
            config.rx_pin
        );
        Ok(())
    }

    fn rx_limit(&self, device: &SerialDevice<T>) -> usize {
        device.config.max_read_chunk
    }

    fn receive(&self, device: &mut SerialDevice<T>, buf: &mut [u8]) -> Result<usize> {
        match device.port.read(buf) {
            Ok(received) => {
                if received > 0 {
                    log::trace!("serial rx: {:02x?}", &buf[..received]);
                }
                Ok(received)
            }
            // Nothing arrived within the read timeout.
            Err(Error::Io(IoErrorKind::TimedOut)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn transmit(&self, device: &mut SerialDevice<T>, batch: &[u8]) -> Result<usize> {
        let written = device.port.write(batch)?;
        device.port.flush()?;
        log::trace!("serial tx: {:02x?}", &batch[..written.min(batch.len())]);
        Ok(written)
    }
}

/// Registers a serial driver over `port`.
pub fn register<T: SerialPort + 'static>(
    name: &str,
    bus_id: u8,
    config: &DriverConfig,
    port: T,
    serial: SerialConfig,
) -> Result<BusDriver<SerialDevice<T>>> {
    BusDriver::register(
        name,
        BusType::Serial,
        bus_id,
        config,
        &SERIAL_INTERFACE,
        SerialDevice::new(port, serial),
    )
}
