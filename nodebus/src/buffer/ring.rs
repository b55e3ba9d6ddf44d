//! Ring buffer with mirror-flagged cursors.
//!
//! Each cursor is an index into storage plus a mirror bit that flips every
//! time the cursor passes the end. Think of the storage as followed by a
//! virtual mirror copy of itself:
//!
//! ```text
//!          mirror = 0                    mirror = 1
//! +---+---+---+---+---+---+---+|+~~~+~~~+~~~+~~~+~~~+~~~+~~~+
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 ||| 0 | 1 | 2 | 3 | 4 | 5 | 6 | Full
//! +---+---+---+---+---+---+---+|+~~~+~~~+~~~+~~~+~~~+~~~+~~~+
//!  read-^                       write-^
//!
//! +---+---+---+---+---+---+---+|+~~~+~~~+~~~+~~~+~~~+~~~+~~~+
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 ||| 0 | 1 | 2 | 3 | 4 | 5 | 6 | Empty
//! +---+---+---+---+---+---+---+|+~~~+~~~+~~~+~~~+~~~+~~~+~~~+
//!  read-^ ^-write
//! ```
//!
//! Equal indices with equal mirrors mean empty, equal indices with different
//! mirrors mean full, so every byte of storage is usable.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{Error, Result};

/// Largest capacity a ring buffer accepts.
pub const MAX_CAPACITY: usize = i32::MAX as usize;

/// Fill state of a ring buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingBufferState {
    /// No bytes buffered.
    Empty,
    /// No space left.
    Full,
    /// Neither full nor empty.
    HalfFull,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    index: usize,
    mirror: bool,
}

impl Cursor {
    /// Moves forward by `count <= capacity` bytes.
    #[inline]
    fn advance(&mut self, count: usize, capacity: usize) {
        self.index += count;
        if self.index >= capacity {
            self.index -= capacity;
            self.mirror = !self.mirror;
        }
    }
}

/// A fixed-capacity byte FIFO.
///
/// `put` refuses to overwrite unread bytes and reports a short count;
/// `put_force` always applies and evicts the oldest bytes instead.
///
/// The buffer does no locking. One context may produce and another consume
/// only if they are externally serialized.
#[derive(Debug)]
pub struct RingBuffer<S = Box<[u8]>> {
    storage: S,
    capacity: usize,
    read: Cursor,
    write: Cursor,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> RingBuffer<S> {
    /// Creates an empty ring buffer over the first `capacity` bytes of `storage`.
    pub fn init(storage: S, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY || capacity > storage.as_ref().len() {
            return Err(Error::InvalidCapacity);
        }

        Ok(Self {
            storage,
            capacity,
            read: Cursor::default(),
            write: Cursor::default(),
        })
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn size(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered bytes.
    pub fn data_len(&self) -> usize {
        let (read, write) = (self.read, self.write);
        if read.index == write.index {
            if read.mirror == write.mirror {
                0
            } else {
                self.capacity
            }
        } else if write.index > read.index {
            write.index - read.index
        } else {
            self.capacity - (read.index - write.index)
        }
    }

    /// Same as [`data_len`](RingBuffer::data_len).
    #[inline]
    pub fn len(&self) -> usize {
        self.data_len()
    }

    /// Returns the number of bytes `put` can accept.
    #[inline]
    pub fn space_len(&self) -> usize {
        self.capacity - self.data_len()
    }

    /// Returns true if no bytes are buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Returns true if every byte of capacity is in use.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.read.index == self.write.index && self.read.mirror != self.write.mirror
    }

    /// Reports whether the buffer is empty, full or in between.
    pub fn status(&self) -> RingBufferState {
        if self.is_empty() {
            RingBufferState::Empty
        } else if self.is_full() {
            RingBufferState::Full
        } else {
            RingBufferState::HalfFull
        }
    }

    /// Empties the buffer. Stored bytes are left in place but unreachable.
    pub fn reset(&mut self) {
        self.read = Cursor::default();
        self.write = Cursor::default();
    }

    /// Copies `data` at the write cursor. `data.len()` must not exceed capacity.
    fn copy_in(&mut self, data: &[u8]) {
        let at = self.write.index;
        let first = core::cmp::min(data.len(), self.capacity - at);
        let buf = self.storage.as_mut();
        buf[at..at + first].copy_from_slice(&data[..first]);
        buf[..data.len() - first].copy_from_slice(&data[first..]);
        self.write.advance(data.len(), self.capacity);
    }

    /// Puts as much of `data` as fits without touching unread bytes.
    ///
    /// Returns the number of bytes copied.
    pub fn put(&mut self, data: &[u8]) -> usize {
        let count = core::cmp::min(data.len(), self.space_len());
        if count == 0 {
            return 0;
        }

        self.copy_in(&data[..count]);
        count
    }

    /// Puts all of `data`, evicting the oldest unread bytes if needed.
    ///
    /// When `data` is longer than the capacity only its last `capacity` bytes
    /// are kept. Always returns `data.len()`.
    pub fn put_force(&mut self, data: &[u8]) -> usize {
        let total = data.len();
        if total == 0 {
            return 0;
        }

        let data = if total > self.capacity {
            &data[total - self.capacity..]
        } else {
            data
        };
        let overflow = data.len() > self.space_len();

        self.copy_in(data);

        if overflow {
            // Oldest surviving byte sits right after the newest one.
            self.read = Cursor {
                index: self.write.index,
                mirror: !self.write.mirror,
            };
        }

        total
    }

    /// Puts one byte. Returns 0 if the buffer is full.
    pub fn put_char(&mut self, ch: u8) -> usize {
        if self.is_full() {
            return 0;
        }

        self.storage.as_mut()[self.write.index] = ch;
        self.write.advance(1, self.capacity);
        1
    }

    /// Puts one byte, evicting the oldest one when full. Always returns 1.
    pub fn put_char_force(&mut self, ch: u8) -> usize {
        let full = self.is_full();

        self.storage.as_mut()[self.write.index] = ch;
        self.write.advance(1, self.capacity);

        if full {
            self.read.advance(1, self.capacity);
        }
        1
    }

    /// Copies up to `buf.len()` bytes out in FIFO order.
    ///
    /// Returns the number of bytes copied, 0 when empty.
    pub fn get(&mut self, buf: &mut [u8]) -> usize {
        let count = core::cmp::min(buf.len(), self.data_len());
        if count == 0 {
            return 0;
        }

        let at = self.read.index;
        let first = core::cmp::min(count, self.capacity - at);
        let storage = self.storage.as_ref();
        buf[..first].copy_from_slice(&storage[at..at + first]);
        buf[first..count].copy_from_slice(&storage[..count - first]);

        self.read.advance(count, self.capacity);
        count
    }

    /// Pops one byte.
    pub fn get_char(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        let ch = self.storage.as_ref()[self.read.index];
        self.read.advance(1, self.capacity);
        Some(ch)
    }

    /// Returns the buffered bytes from the read cursor up to the end of
    /// storage, without consuming them.
    ///
    /// If the data wraps, this is only the first run; call [`skip`] and peek
    /// again for the rest.
    ///
    /// [`skip`]: RingBuffer::skip
    pub fn peek(&self) -> &[u8] {
        let len = self.data_len();
        if len == 0 {
            return &[];
        }

        let at = self.read.index;
        let run = core::cmp::min(len, self.capacity - at);
        &self.storage.as_ref()[at..at + run]
    }

    /// Consumes up to `count` bytes without copying them.
    pub fn skip(&mut self, count: usize) -> usize {
        let count = core::cmp::min(count, self.data_len());
        self.read.advance(count, self.capacity);
        count
    }

    /// Releases the buffer.
    pub fn destroy(self) {}

    /// Releases the buffer and hands its storage back.
    pub fn into_storage(self) -> S {
        self.storage
    }
}

impl RingBuffer<Box<[u8]>> {
    /// Allocates zeroed storage of `capacity` bytes and builds an empty buffer
    /// over it.
    ///
    /// Returns `None` if the capacity is invalid or the allocation fails.
    pub fn create(capacity: usize) -> Option<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return None;
        }

        let mut storage = Vec::new();
        storage.try_reserve_exact(capacity).ok()?;
        storage.resize(capacity, 0u8);

        Self::init(storage.into_boxed_slice(), capacity).ok()
    }
}
