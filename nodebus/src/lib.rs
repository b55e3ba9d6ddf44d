//! # nodebus - Buffered Bus Drivers
//!
//! nodebus is a `no_std` (with `alloc`) library that lets application code
//! and a periodic, blocking transport task exchange a byte stream without
//! either side waiting on the other:
//!
//! - **RingBuffer**: fixed-capacity byte FIFO with mirror-flagged cursors,
//!   using every byte of its storage
//! - **Force writes**: hardware-facing pushes evict the oldest bytes instead
//!   of failing
//! - **BusDriver**: an inbound and an outbound ring in front of a physical
//!   port, with `sync_rx`/`sync_tx` doing one physical operation per call
//! - **Capability tables**: transports (serial, loopback) plug in by
//!   implementing one seven-operation trait
//! - **Split drivers**: with `std`, a driver splits into an application
//!   handle and a pump so that physical I/O never holds up `write`/`read`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application                          │
//! │              write()            read()                  │
//! ├─────────────────────────────────────────────────────────┤
//! │                    BusDriver                            │
//! │  ┌─────────────┐                   ┌─────────────┐      │
//! │  │   tx ring   │                   │   rx ring   │      │
//! │  └─────────────┘                   └─────────────┘      │
//! │           sync_tx()            sync_rx()                │
//! ├─────────────────────────────────────────────────────────┤
//! │             BusInterface (serial, loopback)             │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Physical port                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use nodebus::{serial, DriverConfig, SerialConfig};
//!
//! let mut bus = serial::register("ttyEsp", 1, &DriverConfig::default(), port, SerialConfig::default())?;
//! bus.init()?;
//! bus.open()?;
//!
//! bus.write(b"hello")?;
//! bus.sync_tx()?;
//!
//! bus.sync_rx()?;
//! let mut buf = [0u8; 256];
//! let n = bus.read(&mut buf)?;
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod buffer;
pub mod config;
pub mod driver;
pub mod error;
pub mod io;

// Re-export commonly used types
pub use buffer::{RingBuffer, RingBufferState, MAX_CAPACITY};
pub use config::{DriverConfig, Parity, SerialConfig, StopBits};
pub use driver::serial::{self, SerialDevice, SerialPort};
pub use driver::loopback::{self, LoopbackPort};
pub use driver::{BusDriver, BusInterface, BusState, BusStats, BusType};
#[cfg(feature = "std")]
pub use driver::{BusHandle, BusPump, ReuniteError};
pub use error::{Error, IoErrorKind, Result};
