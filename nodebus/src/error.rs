//! Error types for ring buffers and bus drivers.

use core::fmt;

/// Kind of a physical I/O failure reported by a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    UnexpectedEof,
    WriteZero,
    Interrupted,
    TimedOut,
    Other,
}

/// Errors returned by ring buffer construction and bus driver operations.
///
/// Short writes, evictions and empty reads are not errors; they are reported
/// through return counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Capacity is zero, larger than `MAX_CAPACITY`, or larger than the
    /// supplied storage.
    InvalidCapacity,
    /// Storage for a ring buffer could not be allocated.
    AllocationFailed,
    /// The operation is not allowed in the driver's current state.
    InvalidState,
    /// The physical write accepted a different count than was drained.
    TxMismatch { drained: usize, written: usize },
    /// The inbound ring accepted a different count than was received.
    RxMismatch { received: usize, staged: usize },
    /// The physical port failed.
    Io(IoErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCapacity => write!(f, "Invalid ring buffer capacity"),
            Error::AllocationFailed => write!(f, "Ring buffer allocation failed"),
            Error::InvalidState => write!(f, "Operation not allowed in current bus state"),
            Error::TxMismatch { drained, written } => {
                write!(f, "Transmit mismatch: drained {} bytes, wrote {}", drained, written)
            }
            Error::RxMismatch { received, staged } => {
                write!(f, "Receive mismatch: received {} bytes, staged {}", received, staged)
            }
            Error::Io(kind) => match kind {
                IoErrorKind::UnexpectedEof => write!(f, "Unexpected end of file"),
                IoErrorKind::WriteZero => write!(f, "Write zero bytes"),
                IoErrorKind::Interrupted => write!(f, "Operation interrupted"),
                IoErrorKind::TimedOut => write!(f, "Operation timed out"),
                IoErrorKind::Other => write!(f, "Other I/O error"),
            },
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match err {
            Error::Io(IoErrorKind::UnexpectedEof) => std::io::ErrorKind::UnexpectedEof,
            Error::Io(IoErrorKind::WriteZero) => std::io::ErrorKind::WriteZero,
            Error::Io(IoErrorKind::Interrupted) => std::io::ErrorKind::Interrupted,
            Error::Io(IoErrorKind::TimedOut) => std::io::ErrorKind::TimedOut,
            Error::AllocationFailed => std::io::ErrorKind::OutOfMemory,
            Error::InvalidCapacity => std::io::ErrorKind::InvalidInput,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(feature = "std")]
impl From<std::io::ErrorKind> for IoErrorKind {
    fn from(kind: std::io::ErrorKind) -> Self {
        match kind {
            std::io::ErrorKind::UnexpectedEof => IoErrorKind::UnexpectedEof,
            std::io::ErrorKind::WriteZero => IoErrorKind::WriteZero,
            std::io::ErrorKind::Interrupted => IoErrorKind::Interrupted,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => IoErrorKind::TimedOut,
            _ => IoErrorKind::Other,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
