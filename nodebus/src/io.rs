//! Byte-level I/O traits for physical ports.
//!
//! Each call is one physical operation: a driver never loops on them, so a
//! short count is reported to the caller as-is.

use crate::Result;
#[cfg(feature = "std")]
use crate::Error;

pub trait Read {
    /// Performs one blocking read, returning the number of bytes received.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

pub trait Write {
    /// Performs one blocking write, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn flush(&mut self) -> Result<()>;
}

// Blanket implementations for std types that implement std::io::{Read, Write}
#[cfg(feature = "std")]
impl<T: std::io::Read> Read for T {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        std::io::Read::read(self, buf).map_err(|e| Error::Io(e.kind().into()))
    }
}

#[cfg(feature = "std")]
impl<T: std::io::Write> Write for T {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        std::io::Write::write(self, buf).map_err(|e| Error::Io(e.kind().into()))
    }

    fn flush(&mut self) -> Result<()> {
        std::io::Write::flush(self).map_err(|e| Error::Io(e.kind().into()))
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::error::IoErrorKind;
    use std::io::Cursor;
    use std::vec;
    use std::vec::Vec;

    struct Stalled;

    impl std::io::Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::WouldBlock.into())
        }
    }

    #[test]
    fn test_std_reader_is_a_port() {
        let mut src = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        let n = Read::read(&mut src, &mut buf).unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
    }

    #[test]
    fn test_would_block_maps_to_timeout() {
        let mut buf = [0u8; 4];
        let err = Read::read(&mut Stalled, &mut buf).unwrap_err();
        assert_eq!(err, Error::Io(IoErrorKind::TimedOut));
    }

    #[test]
    fn test_std_writer_is_a_port() {
        let mut sink: Vec<u8> = Vec::new();
        assert_eq!(Write::write(&mut sink, b"abc").unwrap(), 3);
        Write::flush(&mut sink).unwrap();
        assert_eq!(sink, b"abc");
    }
}
