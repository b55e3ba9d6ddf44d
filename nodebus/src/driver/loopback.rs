//! In-memory loopback bus.
//!
//! Bytes sent by `sync_tx` land on a bounded "wire" and come back on the
//! next `sync_rx`. The wire does not evict: when it is full a transmit is
//! short and reported as a mismatch, like a physical port that stalls.

use crate::buffer::RingBuffer;
use crate::config::DriverConfig;
use crate::driver::{BusDriver, BusInterface, BusType};
use crate::error::{Error, Result};

/// An echo wire of fixed capacity.
#[derive(Debug)]
pub struct LoopbackPort {
    wire: RingBuffer,
}

impl LoopbackPort {
    /// Allocates a wire holding `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        let wire = RingBuffer::create(capacity).ok_or(Error::AllocationFailed)?;
        Ok(Self { wire })
    }

    /// Bytes sent but not yet received back.
    pub fn in_flight(&self) -> usize {
        self.wire.data_len()
    }

    /// Places bytes on the wire as if a remote end had sent them.
    pub fn inject(&mut self, data: &[u8]) -> usize {
        self.wire.put(data)
    }
}

/// Capability table for loopback buses.
#[derive(Debug)]
pub struct LoopbackInterface;

/// The table shared by every loopback driver.
pub static LOOPBACK_INTERFACE: LoopbackInterface = LoopbackInterface;

impl BusInterface<LoopbackPort> for LoopbackInterface {
    fn init(&self, bus: &mut BusDriver<LoopbackPort>) -> Result<()> {
        bus.port_mut().wire.reset();
        Ok(())
    }

    fn receive(&self, port: &mut LoopbackPort, buf: &mut [u8]) -> Result<usize> {
        Ok(port.wire.get(buf))
    }

    fn transmit(&self, port: &mut LoopbackPort, batch: &[u8]) -> Result<usize> {
        Ok(port.wire.put(batch))
    }
}

/// Registers a loopback driver whose wire holds `wire_capacity` bytes.
pub fn register(
    name: &str,
    bus_id: u8,
    config: &DriverConfig,
    wire_capacity: usize,
) -> Result<BusDriver<LoopbackPort>> {
    let port = LoopbackPort::new(wire_capacity)?;
    BusDriver::register(name, BusType::Loopback, bus_id, config, &LOOPBACK_INTERFACE, port)
}
