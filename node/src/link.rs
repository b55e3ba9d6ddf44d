//! Byte links that stand in for a UART.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::str::FromStr;

use nodebus::{SerialConfig, SerialPort};
use vsock::{VsockAddr, VsockStream};

/// Where the serial line is reached: `tcp:<host>:<port>` or
/// `vsock:<cid>:<port>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAddr {
    Tcp(String),
    Vsock { cid: u32, port: u32 },
}

impl FromStr for LinkAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("tcp", addr)) if !addr.is_empty() => Ok(LinkAddr::Tcp(addr.to_string())),
            Some(("vsock", rest)) => {
                let (cid, port) = rest
                    .split_once(':')
                    .ok_or_else(|| format!("expected vsock:<cid>:<port>, got {s}"))?;
                let cid = cid.parse().map_err(|_| format!("invalid vsock cid in {s}"))?;
                let port = port.parse().map_err(|_| format!("invalid vsock port in {s}"))?;
                Ok(LinkAddr::Vsock { cid, port })
            }
            _ => Err(format!("unsupported link address {s}")),
        }
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkAddr::Tcp(addr) => write!(f, "tcp:{addr}"),
            LinkAddr::Vsock { cid, port } => write!(f, "vsock:{cid}:{port}"),
        }
    }
}

/// A connected byte stream used as the serial port.
pub enum Link {
    Tcp(TcpStream),
    Vsock(VsockStream),
}

impl Link {
    pub fn connect(addr: &LinkAddr) -> io::Result<Self> {
        match addr {
            LinkAddr::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str())?;
                stream.set_nodelay(true)?;
                Ok(Link::Tcp(stream))
            }
            LinkAddr::Vsock { cid, port } => {
                let stream = VsockStream::connect(&VsockAddr::new(*cid, *port))?;
                Ok(Link::Vsock(stream))
            }
        }
    }
}

impl io::Read for Link {
    /// Reads from the socket. A hang-up is reported as `UnexpectedEof`
    /// rather than as an empty read, which a serial driver cannot tell apart
    /// from a quiet line.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match self {
            Link::Tcp(stream) => stream.read(buf)?,
            Link::Vsock(stream) => stream.read(buf)?,
        };
        if n == 0 && !buf.is_empty() {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(n)
    }
}

impl io::Write for Link {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Link::Tcp(stream) => stream.write(buf),
            Link::Vsock(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Link::Tcp(stream) => stream.flush(),
            Link::Vsock(stream) => stream.flush(),
        }
    }
}

impl SerialPort for Link {
    fn configure(&mut self, config: &SerialConfig) -> nodebus::Result<()> {
        // A socket has no line settings; only the read timeout carries over.
        let timeout = Some(config.read_timeout).filter(|t| !t.is_zero());
        let result = match self {
            Link::Tcp(stream) => stream.set_read_timeout(timeout),
            Link::Vsock(stream) => stream.set_read_timeout(timeout),
        };
        result.map_err(|e| nodebus::Error::Io(e.kind().into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_parse_link_addr() {
        assert_eq!(
            "tcp:127.0.0.1:4000".parse::<LinkAddr>().unwrap(),
            LinkAddr::Tcp("127.0.0.1:4000".to_string())
        );
        assert_eq!(
            "vsock:3:1234".parse::<LinkAddr>().unwrap(),
            LinkAddr::Vsock { cid: 3, port: 1234 }
        );
        assert!("vsock:3".parse::<LinkAddr>().is_err());
        assert!("uart:/dev/ttyS0".parse::<LinkAddr>().is_err());
        assert!("tcp:".parse::<LinkAddr>().is_err());
    }

    #[test]
    fn test_hang_up_is_unexpected_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = LinkAddr::Tcp(listener.local_addr().unwrap().to_string());
        let mut link = Link::connect(&addr).unwrap();
        drop(listener.accept().unwrap());

        let mut buf = [0u8; 16];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let err = nodebus::io::Read::read(&mut link, &mut buf).unwrap_err();
        assert_eq!(err, nodebus::Error::Io(nodebus::IoErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_link_addr_display_round_trip() {
        let addr = LinkAddr::Vsock { cid: 103, port: 1234 };
        assert_eq!(addr.to_string().parse::<LinkAddr>().unwrap(), addr);
    }
}
