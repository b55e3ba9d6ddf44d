//! Splitting a driver between the application and the sync calls.
//!
//! [`BusDriver::split`] hands the buffered side to a [`BusHandle`] and the
//! port to a [`BusPump`]. Both share the rings behind one lock. The pump
//! takes that lock only to drain or fill a ring, never while the port is
//! blocked, so `write` and `read` on the handle stay immediate while a
//! physical read or write is in progress.
//!
//! ```text
//!  BusHandle                  BusPump
//!  write() ─► [ tx ring ] ─► drain ─► transmit ─► port
//!  read()  ◄─ [ rx ring ] ◄─ fill  ◄─ receive  ◄─ port
//!             (locked)               (unlocked)
//! ```

use std::boxed::Box;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{BusCore, BusDriver, BusInterface, BusState, BusStats};
use crate::error::Result;

fn lock(core: &Mutex<BusCore>) -> MutexGuard<'_, BusCore> {
    // Ring updates cannot panic half way; a poisoned lock still guards
    // consistent cursors.
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Application half of a split driver.
pub struct BusHandle {
    core: Arc<Mutex<BusCore>>,
}

impl BusHandle {
    /// Queues `data` for the pump. Returns `data.len()`.
    pub fn write(&self, data: &[u8]) -> Result<usize> {
        let mut core = lock(&self.core);
        core.require(&[BusState::Open])?;
        Ok(core.stage_tx(data))
    }

    /// Takes whatever received bytes are available, possibly none.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut core = lock(&self.core);
        core.require(&[BusState::Open])?;
        Ok(core.take_rx(buf))
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> BusState {
        lock(&self.core).state
    }

    /// Returns a snapshot of the byte counters.
    pub fn stats(&self) -> BusStats {
        lock(&self.core).stats
    }

    /// Bytes waiting for `read`.
    pub fn rx_pending(&self) -> usize {
        lock(&self.core).rx.data_len()
    }

    /// Bytes waiting for the pump.
    pub fn tx_pending(&self) -> usize {
        lock(&self.core).tx.data_len()
    }
}

impl fmt::Display for BusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*lock(&self.core), f)
    }
}

impl fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusHandle")
            .field("core", &*lock(&self.core))
            .finish()
    }
}

/// Port half of a split driver.
pub struct BusPump<P: 'static> {
    core: Arc<Mutex<BusCore>>,
    rx_batch: Box<[u8]>,
    tx_batch: Box<[u8]>,
    interface: &'static dyn BusInterface<P>,
    port: P,
}

impl<P: 'static> BusPump<P> {
    /// Moves one physical read into the inbound ring.
    pub fn sync_rx(&mut self) -> Result<usize> {
        lock(&self.core).require(&[BusState::Open])?;

        let limit = core::cmp::min(self.interface.rx_limit(&self.port), self.rx_batch.len());
        let outcome = self.interface.receive(&mut self.port, &mut self.rx_batch[..limit]);
        lock(&self.core).settle_rx(limit, outcome, &self.rx_batch)
    }

    /// Sends everything queued in one physical write.
    pub fn sync_tx(&mut self) -> Result<usize> {
        let drained = {
            let mut core = lock(&self.core);
            core.require(&[BusState::Open])?;
            core.drain_tx(&mut self.tx_batch)
        };
        if drained == 0 {
            return Ok(0);
        }

        let outcome = self.interface.transmit(&mut self.port, &self.tx_batch[..drained]);
        lock(&self.core).settle_tx(drained, outcome)
    }

    /// Returns a snapshot of the byte counters.
    pub fn stats(&self) -> BusStats {
        lock(&self.core).stats
    }

    /// Returns the physical port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Returns the physical port mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Puts the driver back together.
    ///
    /// Fails, handing both halves back, if `handle` belongs to another
    /// driver.
    pub fn reunite(self, handle: BusHandle) -> core::result::Result<BusDriver<P>, ReuniteError<P>> {
        if !Arc::ptr_eq(&self.core, &handle.core) {
            return Err(ReuniteError(self, handle));
        }
        drop(handle);

        let BusPump {
            core,
            rx_batch,
            tx_batch,
            interface,
            port,
        } = self;
        match Arc::try_unwrap(core) {
            Ok(core) => Ok(BusDriver {
                core: core.into_inner().unwrap_or_else(PoisonError::into_inner),
                rx_batch,
                tx_batch,
                interface,
                port,
            }),
            Err(core) => {
                let handle = BusHandle { core: core.clone() };
                let pump = BusPump {
                    core,
                    rx_batch,
                    tx_batch,
                    interface,
                    port,
                };
                Err(ReuniteError(pump, handle))
            }
        }
    }
}

impl<P: 'static> fmt::Debug for BusPump<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusPump")
            .field("core", &*lock(&self.core))
            .finish_non_exhaustive()
    }
}

/// Returned by [`BusPump::reunite`] when the halves come from different
/// drivers.
pub struct ReuniteError<P: 'static>(pub BusPump<P>, pub BusHandle);

impl<P: 'static> fmt::Debug for ReuniteError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReuniteError").field(&self.0).field(&self.1).finish()
    }
}

impl<P: 'static> fmt::Display for ReuniteError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tried to reunite halves of different buses")
    }
}

impl<P: 'static> std::error::Error for ReuniteError<P> {}

impl<P: 'static> BusDriver<P> {
    /// Splits the driver so that `write`/`read` and the sync calls can run
    /// on different threads.
    ///
    /// The lifecycle is frozen while split: both halves keep checking that
    /// the driver is open, and [`BusPump::reunite`] gives back a driver that
    /// can be closed.
    pub fn split(self) -> (BusHandle, BusPump<P>) {
        let core = Arc::new(Mutex::new(self.core));
        let handle = BusHandle { core: core.clone() };
        let pump = BusPump {
            core,
            rx_batch: self.rx_batch,
            tx_batch: self.tx_batch,
            interface: self.interface,
            port: self.port,
        };
        (handle, pump)
    }
}
