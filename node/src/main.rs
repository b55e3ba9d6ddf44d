mod link;

use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, error, info, warn};
use nodebus::{serial, BusPump, DriverConfig, Error, IoErrorKind, SerialConfig, SerialDevice};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::link::{Link, LinkAddr};

const DEFAULT_LINK: &str = "tcp:127.0.0.1:4000";
const DEVICE_NAME: &str = "ttyEsp";
const BUS_ID: u8 = 1;

const SYNC_PERIOD: Duration = Duration::from_millis(10);
const READ_PERIOD: Duration = Duration::from_millis(10);
const WRITE_PERIOD: Duration = Duration::from_secs(1);

const READ_BUF_SIZE: usize = 256;
const FRAME_LEN: usize = 10;

type SerialPump = BusPump<SerialDevice<Link>>;
// Both pumps drive the same link, one physical operation at a time.
type SharedPump = Arc<Mutex<SerialPump>>;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr: LinkAddr = env::var("NODEBUS_LINK")
        .unwrap_or_else(|_| DEFAULT_LINK.to_string())
        .parse()
        .expect("Invalid NODEBUS_LINK");

    info!("Connecting to {}...", addr);
    let link = Link::connect(&addr).expect("Failed to connect link");
    info!("Connected!");

    let mut bus = serial::register(
        DEVICE_NAME,
        BUS_ID,
        &DriverConfig::default(),
        link,
        SerialConfig::default(),
    )
    .expect("Failed to register serial bus");
    bus.init().expect("Failed to initialize serial bus");
    bus.open().expect("Failed to open serial bus");
    info!("{} open", bus);

    let (handle, pump) = bus.split();
    let handle = Arc::new(handle);
    let pump: SharedPump = Arc::new(Mutex::new(pump));
    let shutdown = CancellationToken::new();

    let rx_pump = {
        let pump = pump.clone();
        let shutdown = shutdown.clone();
        move || {
            let Ok(mut pump) = pump.lock() else {
                error!("Bus pump lock poisoned");
                return false;
            };
            match pump.sync_rx() {
                Ok(0) => {}
                Ok(n) => debug!("rx pump staged {} bytes", n),
                Err(Error::Io(IoErrorKind::UnexpectedEof)) => {
                    error!("Link closed by peer");
                    shutdown.cancel();
                    return false;
                }
                Err(e) => warn!("sync_rx failed: {}", e),
            }
            true
        }
    };

    let tx_pump = {
        let pump = pump.clone();
        move || {
            let Ok(mut pump) = pump.lock() else {
                error!("Bus pump lock poisoned");
                return false;
            };
            match pump.sync_tx() {
                Ok(0) => {}
                Ok(n) => debug!("tx pump sent {} bytes", n),
                Err(e) => warn!("sync_tx failed: {}", e),
            }
            true
        }
    };

    let reader = {
        let handle = handle.clone();
        let mut buf = [0u8; READ_BUF_SIZE];
        move || {
            match handle.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => info!("Received {} bytes: {:02x?}", n, &buf[..n]),
                Err(e) => warn!("read failed: {}", e),
            }
            true
        }
    };

    let writer = {
        let handle = handle.clone();
        let mut seq = 0u8;
        move || {
            let mut frame = [0u8; FRAME_LEN];
            frame[..8].copy_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
            frame[FRAME_LEN - 1] = seq;
            seq = seq.wrapping_add(1);

            if let Err(e) = handle.write(&frame) {
                warn!("write failed: {}", e);
            }
            true
        }
    };

    let tasks = vec![
        spawn_periodic("rx_pump", SYNC_PERIOD, shutdown.clone(), rx_pump),
        spawn_periodic("tx_pump", SYNC_PERIOD, shutdown.clone(), tx_pump),
        spawn_periodic("reader", READ_PERIOD, shutdown.clone(), reader),
        spawn_periodic("writer", WRITE_PERIOD, shutdown.clone(), writer),
    ];

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.expect("Failed to listen for ctrl-c");
            info!("Shutting down...");
        }
        _ = shutdown.cancelled() => info!("Link lost, shutting down..."),
    }
    shutdown.cancel();

    for result in join_all(tasks).await {
        if let Err(e) = result {
            error!("task failed: {}", e);
        }
    }

    let handle = Arc::try_unwrap(handle).expect("Bus handle still shared");
    let pump = Arc::try_unwrap(pump)
        .expect("Bus pump still shared")
        .into_inner()
        .expect("Bus pump lock poisoned");
    let mut bus = pump.reunite(handle).expect("Failed to reunite bus halves");

    if let Err(e) = bus.sync_tx() {
        warn!("final sync_tx failed: {}", e);
    }
    bus.close().expect("Failed to close serial bus");

    let stats = bus.stats();
    info!("=== Bus Closed ===");
    info!("Sent: {} bytes ({} dropped)", stats.tx_bytes, stats.tx_dropped);
    info!("Received: {} bytes ({} dropped)", stats.rx_bytes, stats.rx_dropped);
    info!("Sync errors: {}", stats.sync_errors);
}

/// Runs `step` every `period` until `shutdown` fires or `step` returns false.
///
/// Each step runs on the blocking pool since pump steps block on the link.
/// Application steps only take the ring lock, which a pump never holds
/// across a physical operation.
fn spawn_periodic<F>(
    name: &'static str,
    period: Duration,
    shutdown: CancellationToken,
    mut step: F,
) -> JoinHandle<()>
where
    F: FnMut() -> bool + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::task::spawn_blocking(move || {
                let keep_going = step();
                (step, keep_going)
            })
            .await;

            match outcome {
                Ok((returned, true)) => step = returned,
                Ok((_, false)) => {
                    debug!("{} stopped", name);
                    break;
                }
                Err(e) => {
                    error!("{} stopped: {}", name, e);
                    break;
                }
            }
        }
        debug!("{} finished", name);
    })
}
