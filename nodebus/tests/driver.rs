use std::collections::VecDeque;
use std::io;
use std::sync::mpsc;
use std::thread;

use nodebus::{
    serial, BusDriver, BusState, DriverConfig, Error, IoErrorKind, SerialConfig, SerialDevice,
    SerialPort, MAX_CAPACITY,
};

/// Scripted UART: reads come from `incoming`, writes are recorded per call.
#[derive(Default)]
struct MockUart {
    incoming: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    accept_limit: Option<usize>,
    broken: bool,
    write_broken: bool,
    over_report: bool,
    configured: Option<SerialConfig>,
}

impl io::Read for MockUart {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.broken {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if self.over_report {
            return Ok(buf.len() + 1);
        }
        if self.incoming.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(self.incoming.len());
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl io::Write for MockUart {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.write_broken {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let n = self.accept_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        self.writes.push(buf[..n].to_vec());
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialPort for MockUart {
    fn configure(&mut self, config: &SerialConfig) -> nodebus::Result<()> {
        self.configured = Some(*config);
        Ok(())
    }
}

type SerialBus = BusDriver<SerialDevice<MockUart>>;

fn registered(config: DriverConfig) -> SerialBus {
    serial::register("ttyEsp", 1, &config, MockUart::default(), SerialConfig::default()).unwrap()
}

fn opened(config: DriverConfig) -> SerialBus {
    let mut bus = registered(config);
    bus.init().unwrap();
    bus.open().unwrap();
    bus
}

fn uart(bus: &mut SerialBus) -> &mut MockUart {
    bus.port_mut().port_mut()
}

#[test]
fn test_write_then_sync_tx_sends_once_in_order() {
    let mut bus = opened(DriverConfig::default());

    assert_eq!(bus.write(b"hello ").unwrap(), 6);
    assert_eq!(bus.write(b"world").unwrap(), 5);
    assert_eq!(bus.tx_pending(), 11);

    assert_eq!(bus.sync_tx().unwrap(), 11);
    assert_eq!(uart(&mut bus).writes, vec![b"hello world".to_vec()]);

    // Nothing left, so no second physical write.
    assert_eq!(bus.sync_tx().unwrap(), 0);
    assert_eq!(uart(&mut bus).writes.len(), 1);
    assert_eq!(bus.stats().tx_bytes, 11);
}

#[test]
fn test_write_overflow_keeps_newest_bytes() {
    let mut bus = opened(DriverConfig::default().with_tx_capacity(8));

    assert_eq!(bus.write(b"0123").unwrap(), 4);
    assert_eq!(bus.write(b"456789AB").unwrap(), 8);

    assert_eq!(bus.sync_tx().unwrap(), 8);
    assert_eq!(uart(&mut bus).writes[0], b"456789AB");

    let stats = bus.stats();
    assert_eq!(stats.tx_staged, 12);
    assert_eq!(stats.tx_dropped, 4);
}

#[test]
fn test_short_physical_write_is_not_retried() {
    let mut bus = opened(DriverConfig::default());
    uart(&mut bus).accept_limit = Some(3);

    bus.write(b"abcdef").unwrap();
    assert_eq!(
        bus.sync_tx().unwrap_err(),
        Error::TxMismatch { drained: 6, written: 3 }
    );
    assert_eq!(bus.sync_tx().unwrap(), 0);
    assert_eq!(uart(&mut bus).writes, vec![b"abc".to_vec()]);
    assert_eq!(bus.stats().sync_errors, 1);
}

#[test]
fn test_failed_transmit_drops_batch() {
    let mut bus = opened(DriverConfig::default());
    bus.write(b"abcdef").unwrap();
    uart(&mut bus).write_broken = true;

    assert_eq!(bus.sync_tx().unwrap_err(), Error::Io(IoErrorKind::Other));
    let stats = bus.stats();
    assert_eq!(stats.sync_errors, 1);
    assert_eq!(stats.tx_dropped, 6);
    assert_eq!(stats.tx_bytes, 0);

    // The batch is gone even once the port recovers.
    uart(&mut bus).write_broken = false;
    assert_eq!(bus.tx_pending(), 0);
    assert_eq!(bus.sync_tx().unwrap(), 0);
    assert!(uart(&mut bus).writes.is_empty());
}

#[test]
fn test_sync_rx_rejects_over_reported_count() {
    let mut bus = opened(DriverConfig::default());
    uart(&mut bus).over_report = true;

    // The port claims one byte more than the 128-byte chunk it was given.
    assert_eq!(
        bus.sync_rx().unwrap_err(),
        Error::RxMismatch { received: 129, staged: 0 }
    );
    assert_eq!(bus.rx_pending(), 0);

    let stats = bus.stats();
    assert_eq!(stats.sync_errors, 1);
    assert_eq!(stats.rx_bytes, 0);
}

#[test]
fn test_sync_rx_then_read_in_arrival_order() {
    let mut bus = opened(DriverConfig::default());
    uart(&mut bus).incoming.extend(1u8..=10);

    assert_eq!(bus.sync_rx().unwrap(), 10);
    assert_eq!(bus.rx_pending(), 10);

    let mut buf = [0u8; 4];
    assert_eq!(bus.read(&mut buf).unwrap(), 4);
    assert_eq!(buf, [1, 2, 3, 4]);

    let mut rest = [0u8; 32];
    let n = bus.read(&mut rest).unwrap();
    assert_eq!(&rest[..n], &[5, 6, 7, 8, 9, 10]);
    assert_eq!(bus.read(&mut rest).unwrap(), 0);
}

#[test]
fn test_sync_rx_takes_one_chunk_per_call() {
    let mut bus = opened(DriverConfig::default());
    uart(&mut bus).incoming.extend(std::iter::repeat(0x55).take(300));

    // Default serial settings cap one physical read at 128 bytes.
    assert_eq!(bus.sync_rx().unwrap(), 128);
    assert_eq!(bus.sync_rx().unwrap(), 128);
    assert_eq!(bus.sync_rx().unwrap(), 44);
    assert_eq!(bus.rx_pending(), 256);

    let stats = bus.stats();
    assert_eq!(stats.rx_bytes, 300);
    assert_eq!(stats.rx_dropped, 44);
}

#[test]
fn test_sync_rx_timeout_is_empty_read() {
    let mut bus = opened(DriverConfig::default());
    assert_eq!(bus.sync_rx().unwrap(), 0);
    assert_eq!(bus.stats().sync_errors, 0);
}

#[test]
fn test_sync_rx_port_failure_is_reported() {
    let mut bus = opened(DriverConfig::default());
    uart(&mut bus).broken = true;

    assert_eq!(bus.sync_rx().unwrap_err(), Error::Io(IoErrorKind::Other));
    assert_eq!(bus.stats().sync_errors, 1);

    // Transient: the next cycle works again.
    uart(&mut bus).broken = false;
    uart(&mut bus).incoming.push_back(9);
    assert_eq!(bus.sync_rx().unwrap(), 1);
}

#[test]
fn test_init_configures_port() {
    let mut bus = registered(DriverConfig::default());
    assert_eq!(bus.state(), BusState::Registered);
    assert!(uart(&mut bus).configured.is_none());

    bus.init().unwrap();
    assert_eq!(bus.state(), BusState::Initialized);
    assert_eq!(uart(&mut bus).configured, Some(SerialConfig::default()));
}

#[test]
fn test_steady_state_requires_open() {
    let mut bus = registered(DriverConfig::default());
    let mut buf = [0u8; 8];

    assert_eq!(bus.write(b"x").unwrap_err(), Error::InvalidState);
    assert_eq!(bus.read(&mut buf).unwrap_err(), Error::InvalidState);
    assert_eq!(bus.sync_tx().unwrap_err(), Error::InvalidState);
    assert_eq!(bus.sync_rx().unwrap_err(), Error::InvalidState);
    assert_eq!(bus.open().unwrap_err(), Error::InvalidState);

    bus.init().unwrap();
    assert_eq!(bus.init().unwrap_err(), Error::InvalidState);
    assert_eq!(bus.write(b"x").unwrap_err(), Error::InvalidState);

    bus.open().unwrap();
    bus.write(b"x").unwrap();

    bus.close().unwrap();
    assert_eq!(bus.state(), BusState::Closed);
    assert_eq!(bus.sync_tx().unwrap_err(), Error::InvalidState);
    assert_eq!(bus.close().unwrap_err(), Error::InvalidState);

    // Reopening keeps what was staged.
    bus.open().unwrap();
    assert_eq!(bus.sync_tx().unwrap(), 1);
}

#[test]
fn test_register_rejects_invalid_capacity() {
    let zero = DriverConfig::default().with_rx_capacity(0);
    let err = serial::register("ttyEsp", 1, &zero, MockUart::default(), SerialConfig::default())
        .unwrap_err();
    assert_eq!(err, Error::InvalidCapacity);

    let huge = DriverConfig::default().with_tx_capacity(MAX_CAPACITY + 1);
    let err = serial::register("ttyEsp", 1, &huge, MockUart::default(), SerialConfig::default())
        .unwrap_err();
    assert_eq!(err, Error::InvalidCapacity);
}

#[test]
fn test_identity() {
    let bus = registered(DriverConfig::default().with_rx_capacity(64).with_tx_capacity(32));
    assert_eq!(bus.to_string(), "serial:ttyEsp#1");
    assert_eq!(bus.name(), "ttyEsp");
    assert_eq!(bus.bus_id(), 1);
    assert_eq!(bus.rx_capacity(), 64);
    assert_eq!(bus.tx_capacity(), 32);
}

/// UART whose reads block until the test releases a chunk.
struct GatedUart {
    reading: mpsc::Sender<()>,
    release: mpsc::Receiver<Vec<u8>>,
    writes: Vec<Vec<u8>>,
}

impl io::Read for GatedUart {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reading.send(()).unwrap();
        let chunk = self
            .release
            .recv()
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }
}

impl io::Write for GatedUart {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialPort for GatedUart {
    fn configure(&mut self, _config: &SerialConfig) -> nodebus::Result<()> {
        Ok(())
    }
}

#[test]
fn test_split_write_and_read_while_sync_rx_blocks() {
    let (reading_tx, reading_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gated = GatedUart {
        reading: reading_tx,
        release: release_rx,
        writes: Vec::new(),
    };
    let mut bus =
        serial::register("ttyEsp", 1, &DriverConfig::default(), gated, SerialConfig::default())
            .unwrap();
    bus.init().unwrap();
    bus.open().unwrap();
    let (handle, mut pump) = bus.split();

    let pumping = thread::spawn(move || {
        let received = pump.sync_rx();
        (pump, received)
    });
    // The pump is now parked inside the physical read.
    reading_rx.recv().unwrap();

    assert_eq!(handle.write(b"ping").unwrap(), 4);
    assert_eq!(handle.tx_pending(), 4);
    let mut buf = [0u8; 8];
    assert_eq!(handle.read(&mut buf).unwrap(), 0);

    release_tx.send(b"pong".to_vec()).unwrap();
    let (pump, received) = pumping.join().unwrap();
    assert_eq!(received.unwrap(), 4);
    let n = handle.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"pong");

    let mut bus = pump.reunite(handle).unwrap();
    assert_eq!(bus.sync_tx().unwrap(), 4);
    assert_eq!(bus.port().port().writes, vec![b"ping".to_vec()]);
    bus.close().unwrap();
}
