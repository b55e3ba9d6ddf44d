//! Buffered bus drivers.
//!
//! A [`BusDriver`] sits between the application and a blocking physical
//! port. Each direction gets its own ring buffer:
//!
//! ```text
//! write() ──► [ tx ring ] ──► sync_tx() ──► port
//! read()  ◄── [ rx ring ] ◄── sync_rx() ◄── port
//! ```
//!
//! `write` and `read` never block. `sync_tx` and `sync_rx` are meant to be
//! called periodically and each performs exactly one physical operation.
//! Both rings use the force policy, so under pressure the oldest bytes are
//! dropped rather than the caller blocked.
//!
//! Transport variants plug in through a [`BusInterface`] table. The tables
//! are stateless statics shared by every driver of the variant; the
//! per-instance hardware handle is the driver's port `P`.
//!
//! When the application and the sync calls run on different threads, a
//! driver can be split into a [`BusHandle`] and a [`BusPump`] (with the
//! `std` feature). The rings then sit behind a lock that is never held
//! across a physical operation.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use heapless::String;

use crate::buffer::{RingBuffer, MAX_CAPACITY};
use crate::config::DriverConfig;
use crate::error::{Error, Result};

pub mod loopback;
pub mod serial;
#[cfg(feature = "std")]
pub mod split;

#[cfg(feature = "std")]
pub use split::{BusHandle, BusPump, ReuniteError};

/// Longest device name kept, in bytes. Longer names are truncated.
pub const MAX_NAME_LEN: usize = 16;

/// Kind of transport behind a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    /// A UART or anything standing in for one.
    Serial,
    /// The in-memory echo wire.
    Loopback,
}

impl BusType {
    /// Returns the lowercase name used in log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            BusType::Serial => "serial",
            BusType::Loopback => "loopback",
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a registered driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    /// Buffers allocated, port untouched.
    Registered,
    /// Port configured.
    Initialized,
    /// Steady-state operations allowed.
    Open,
    /// Closed; may be opened again.
    Closed,
}

/// Byte counters for one driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BusStats {
    /// Bytes accepted by `write`.
    pub tx_staged: u64,
    /// Bytes handed to the port by `sync_tx`.
    pub tx_bytes: u64,
    /// Outbound bytes lost to eviction or failed transmits.
    pub tx_dropped: u64,
    /// Bytes received from the port by `sync_rx`.
    pub rx_bytes: u64,
    /// Bytes returned by `read`.
    pub rx_read: u64,
    /// Inbound bytes evicted before the application read them.
    pub rx_dropped: u64,
    /// Failed `sync_tx`/`sync_rx` calls.
    pub sync_errors: u64,
}

/// Capability table of one transport variant.
///
/// `write`/`read` work on the buffered layer and default to the shared
/// buffering logic. A variant supplies the physical I/O through `receive`
/// and `transmit`; the default `sync_rx`/`sync_tx` wrap them with
/// [`BusDriver::sync_rx_with`] and [`BusDriver::sync_tx_with`].
pub trait BusInterface<P: 'static>: Sync {
    fn init(&self, bus: &mut BusDriver<P>) -> Result<()>;

    fn open(&self, _bus: &mut BusDriver<P>) -> Result<()> {
        Ok(())
    }

    fn close(&self, _bus: &mut BusDriver<P>) -> Result<()> {
        Ok(())
    }

    fn write(&self, bus: &mut BusDriver<P>, data: &[u8]) -> Result<usize> {
        Ok(bus.stage_tx(data))
    }

    fn read(&self, bus: &mut BusDriver<P>, buf: &mut [u8]) -> Result<usize> {
        Ok(bus.take_rx(buf))
    }

    fn sync_rx(&self, bus: &mut BusDriver<P>) -> Result<usize> {
        let limit = self.rx_limit(bus.port());
        bus.sync_rx_with(limit, |port, buf| self.receive(port, buf))
    }

    fn sync_tx(&self, bus: &mut BusDriver<P>) -> Result<usize> {
        bus.sync_tx_with(|port, batch| self.transmit(port, batch))
    }

    /// Most bytes one physical read may take. The inbound capacity still
    /// applies on top of this.
    fn rx_limit(&self, _port: &P) -> usize {
        usize::MAX
    }

    /// One physical read into `buf`. Returns the count received.
    fn receive(&self, port: &mut P, buf: &mut [u8]) -> Result<usize>;

    /// One physical write of `batch`. Returns the count the port accepted.
    fn transmit(&self, port: &mut P, batch: &[u8]) -> Result<usize>;
}

/// Identity, state, rings and counters of a driver: everything except the
/// port and the scratch batches.
pub(crate) struct BusCore {
    name: String<MAX_NAME_LEN>,
    bus_type: BusType,
    bus_id: u8,
    state: BusState,
    rx: RingBuffer,
    tx: RingBuffer,
    stats: BusStats,
}

impl BusCore {
    pub(crate) fn require(&self, allowed: &[BusState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            log::warn!("{} operation rejected in state {:?}", self, self.state);
            Err(Error::InvalidState)
        }
    }

    pub(crate) fn stage_tx(&mut self, data: &[u8]) -> usize {
        let free = self.tx.space_len();
        let accepted = self.tx.put_force(data);

        let dropped = data.len().saturating_sub(free);
        if dropped > 0 {
            self.stats.tx_dropped += dropped as u64;
            log::debug!("{} tx ring overflow, dropped {} bytes", self, dropped);
        }
        if accepted > 0 {
            self.stats.tx_staged += accepted as u64;
            log::trace!("{} write: {:02x?}", self.name, data);
        }
        accepted
    }

    pub(crate) fn take_rx(&mut self, buf: &mut [u8]) -> usize {
        let count = self.rx.get(buf);
        if count > 0 {
            self.stats.rx_read += count as u64;
            log::trace!("{} read: {:02x?}", self.name, &buf[..count]);
        }
        count
    }

    /// Empties the outbound ring into `batch`.
    pub(crate) fn drain_tx(&mut self, batch: &mut [u8]) -> usize {
        self.tx.get(batch)
    }

    /// Accounts for the physical write of `drained` bytes.
    pub(crate) fn settle_tx(&mut self, drained: usize, outcome: Result<usize>) -> Result<usize> {
        let written = match outcome {
            Ok(written) => written,
            Err(e) => {
                self.stats.sync_errors += 1;
                self.stats.tx_dropped += drained as u64;
                log::warn!("{} transmit of {} bytes failed: {}", self, drained, e);
                return Err(e);
            }
        };

        if written != drained {
            let sent = core::cmp::min(written, drained);
            self.stats.sync_errors += 1;
            self.stats.tx_bytes += sent as u64;
            self.stats.tx_dropped += (drained - sent) as u64;
            log::warn!("{} transmitted {} of {} bytes", self, written, drained);
            return Err(Error::TxMismatch { drained, written });
        }

        self.stats.tx_bytes += written as u64;
        Ok(written)
    }

    /// Accounts for one physical read into `batch[..limit]` and force-pushes
    /// what arrived.
    pub(crate) fn settle_rx(
        &mut self,
        limit: usize,
        outcome: Result<usize>,
        batch: &[u8],
    ) -> Result<usize> {
        let received = match outcome {
            Ok(received) if received <= limit => received,
            Ok(received) => {
                self.stats.sync_errors += 1;
                log::warn!("{} port reported {} bytes into a {} byte batch", self, received, limit);
                return Err(Error::RxMismatch { received, staged: 0 });
            }
            Err(e) => {
                self.stats.sync_errors += 1;
                log::warn!("{} receive failed: {}", self, e);
                return Err(e);
            }
        };
        if received == 0 {
            return Ok(0);
        }

        let free = self.rx.space_len();
        let staged = self.rx.put_force(&batch[..received]);
        self.stats.rx_bytes += received as u64;

        let dropped = received.saturating_sub(free);
        if dropped > 0 {
            self.stats.rx_dropped += dropped as u64;
            log::debug!("{} rx ring overflow, dropped {} bytes", self, dropped);
        }

        if staged != received {
            self.stats.sync_errors += 1;
            return Err(Error::RxMismatch { received, staged });
        }
        Ok(staged)
    }
}

impl fmt::Display for BusCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.bus_type, self.name, self.bus_id)
    }
}

impl fmt::Debug for BusCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusCore")
            .field("name", &self.name)
            .field("bus_type", &self.bus_type)
            .field("bus_id", &self.bus_id)
            .field("state", &self.state)
            .field("rx_pending", &self.rx.data_len())
            .field("tx_pending", &self.tx.data_len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// A registered bus driver instance.
pub struct BusDriver<P: 'static> {
    core: BusCore,
    rx_batch: Box<[u8]>,
    tx_batch: Box<[u8]>,
    interface: &'static dyn BusInterface<P>,
    port: P,
}

impl<P: 'static> BusDriver<P> {
    /// Allocates both rings and binds `interface` and `port`.
    ///
    /// Nothing is leaked on failure: whatever was allocated is dropped
    /// before the error is returned.
    pub fn register(
        name: &str,
        bus_type: BusType,
        bus_id: u8,
        config: &DriverConfig,
        interface: &'static dyn BusInterface<P>,
        port: P,
    ) -> Result<Self> {
        for capacity in [config.rx_capacity, config.tx_capacity] {
            if capacity == 0 || capacity > MAX_CAPACITY {
                return Err(Error::InvalidCapacity);
            }
        }

        let rx = RingBuffer::create(config.rx_capacity).ok_or(Error::AllocationFailed);
        let tx = RingBuffer::create(config.tx_capacity).ok_or(Error::AllocationFailed);
        let (rx, tx, rx_batch, tx_batch) = match (
            rx,
            tx,
            zeroed(config.rx_capacity),
            zeroed(config.tx_capacity),
        ) {
            (Ok(rx), Ok(tx), Ok(rx_batch), Ok(tx_batch)) => (rx, tx, rx_batch, tx_batch),
            _ => {
                log::error!("{} {}#{}: buffer allocation failed", bus_type, name, bus_id);
                return Err(Error::AllocationFailed);
            }
        };

        let bus = Self {
            core: BusCore {
                name: truncated(name),
                bus_type,
                bus_id,
                state: BusState::Registered,
                rx,
                tx,
                stats: BusStats::default(),
            },
            rx_batch,
            tx_batch,
            interface,
            port,
        };
        log::debug!(
            "{} registered: rx {} bytes, tx {} bytes",
            bus,
            config.rx_capacity,
            config.tx_capacity
        );
        Ok(bus)
    }

    /// Returns the device name, truncated to [`MAX_NAME_LEN`] bytes.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Returns the transport kind.
    pub fn bus_type(&self) -> BusType {
        self.core.bus_type
    }

    /// Returns the numeric bus id.
    pub fn bus_id(&self) -> u8 {
        self.core.bus_id
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> BusState {
        self.core.state
    }

    /// Returns a snapshot of the byte counters.
    pub fn stats(&self) -> BusStats {
        self.core.stats
    }

    /// Returns the inbound ring capacity.
    pub fn rx_capacity(&self) -> usize {
        self.core.rx.size()
    }

    /// Returns the outbound ring capacity.
    pub fn tx_capacity(&self) -> usize {
        self.core.tx.size()
    }

    /// Bytes waiting for `read`.
    pub fn rx_pending(&self) -> usize {
        self.core.rx.data_len()
    }

    /// Bytes waiting for `sync_tx`.
    pub fn tx_pending(&self) -> usize {
        self.core.tx.data_len()
    }

    /// Returns the physical port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Returns the physical port mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Prepares the port. Only allowed once, right after registration.
    pub fn init(&mut self) -> Result<()> {
        self.core.require(&[BusState::Registered])?;
        let interface = self.interface;
        interface.init(self)?;
        self.core.state = BusState::Initialized;
        log::debug!("{} initialized", self);
        Ok(())
    }

    /// Enables steady-state operations, after `init` or a `close`.
    pub fn open(&mut self) -> Result<()> {
        self.core.require(&[BusState::Initialized, BusState::Closed])?;
        let interface = self.interface;
        interface.open(self)?;
        self.core.state = BusState::Open;
        log::debug!("{} open", self);
        Ok(())
    }

    /// Disables steady-state operations. Buffered bytes are kept.
    pub fn close(&mut self) -> Result<()> {
        self.core.require(&[BusState::Open])?;
        let interface = self.interface;
        interface.close(self)?;
        self.core.state = BusState::Closed;
        log::debug!("{} closed", self);
        Ok(())
    }

    /// Queues `data` for the next `sync_tx`. Returns `data.len()`.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.core.require(&[BusState::Open])?;
        let interface = self.interface;
        interface.write(self, data)
    }

    /// Takes whatever received bytes are available, possibly none.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.core.require(&[BusState::Open])?;
        let interface = self.interface;
        interface.read(self, buf)
    }

    /// Moves one physical read into the inbound ring.
    pub fn sync_rx(&mut self) -> Result<usize> {
        self.core.require(&[BusState::Open])?;
        let interface = self.interface;
        interface.sync_rx(self)
    }

    /// Sends everything queued in one physical write.
    pub fn sync_tx(&mut self) -> Result<usize> {
        self.core.require(&[BusState::Open])?;
        let interface = self.interface;
        interface.sync_tx(self)
    }

    /// Force-pushes `data` into the outbound ring.
    pub fn stage_tx(&mut self, data: &[u8]) -> usize {
        self.core.stage_tx(data)
    }

    /// Pops buffered inbound bytes into `buf`.
    pub fn take_rx(&mut self, buf: &mut [u8]) -> usize {
        self.core.take_rx(buf)
    }

    /// Drains the outbound ring into one batch and hands it to `transmit`,
    /// which must perform exactly one physical write and return the count
    /// the port accepted.
    ///
    /// An empty ring skips the physical write. The batch is never resent.
    pub fn sync_tx_with<F>(&mut self, transmit: F) -> Result<usize>
    where
        F: FnOnce(&mut P, &[u8]) -> Result<usize>,
    {
        let drained = self.core.drain_tx(&mut self.tx_batch);
        if drained == 0 {
            return Ok(0);
        }

        let outcome = transmit(&mut self.port, &self.tx_batch[..drained]);
        self.core.settle_tx(drained, outcome)
    }

    /// Gives `receive` a batch of at most `limit` bytes (and never more than
    /// the inbound capacity) for one physical read, then force-pushes what
    /// arrived into the inbound ring.
    pub fn sync_rx_with<F>(&mut self, limit: usize, receive: F) -> Result<usize>
    where
        F: FnOnce(&mut P, &mut [u8]) -> Result<usize>,
    {
        let limit = core::cmp::min(limit, self.rx_batch.len());
        let outcome = receive(&mut self.port, &mut self.rx_batch[..limit]);
        self.core.settle_rx(limit, outcome, &self.rx_batch)
    }
}

impl<P: 'static> fmt::Display for BusDriver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.core, f)
    }
}

impl<P: 'static> fmt::Debug for BusDriver<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusDriver")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

fn zeroed(len: usize) -> Result<Box<[u8]>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::AllocationFailed)?;
    buf.resize(len, 0u8);
    Ok(buf.into_boxed_slice())
}

fn truncated(name: &str) -> String<MAX_NAME_LEN> {
    let mut out = String::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}
