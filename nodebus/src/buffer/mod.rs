//! Buffer management for bus drivers.
//!
//! - RingBuffer: fixed-capacity byte FIFO with mirror-flagged cursors

mod ring;

pub use ring::{RingBuffer, RingBufferState, MAX_CAPACITY};
