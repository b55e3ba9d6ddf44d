use log::{info, warn};
use std::env;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Instant;
use vsock::{VsockAddr, VsockListener, VMADDR_CID_ANY};

const DEFAULT_LISTEN: &str = "tcp:127.0.0.1:4000";
const CHUNK_SIZE: usize = 256;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // tcp:<host>:<port> or vsock:<port>
    let listen = env::var("NODEBUS_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN.to_string());

    match listen.split_once(':') {
        Some(("tcp", addr)) => {
            let listener = TcpListener::bind(addr).expect("Failed to bind to tcp");
            info!("Peer listening on {}", listen);
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let who = stream
                            .peer_addr()
                            .map(|a| a.to_string())
                            .unwrap_or_else(|_| "tcp peer".to_string());
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set nodelay for {}: {}", who, e);
                        }
                        thread::spawn(move || echo(who, stream));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                }
            }
        }
        Some(("vsock", port)) => {
            let port: u32 = port.parse().expect("Invalid vsock port");
            let addr = VsockAddr::new(VMADDR_CID_ANY, port);
            let listener = VsockListener::bind(&addr).expect("Failed to bind to vsock");
            info!("Peer listening on {:?}", addr);
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let who = stream
                            .peer_addr()
                            .map(|a| format!("{:?}", a))
                            .unwrap_or_else(|_| "vsock peer".to_string());
                        thread::spawn(move || echo(who, stream));
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                }
            }
        }
        _ => panic!("Unsupported NODEBUS_LISTEN address: {}", listen),
    }
}

/// Logs and sends back every chunk until the node hangs up.
fn echo<S: Read + Write>(who: String, mut stream: S) {
    info!("{} connected", who);
    let start = Instant::now();
    let mut buf = [0u8; CHUNK_SIZE];
    let mut total = 0usize;

    loop {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                info!("{} sent {} bytes: {:02x?}", who, n, &buf[..n]);
                if let Err(e) = stream.write_all(&buf[..n]) {
                    warn!("{} echo failed: {}", who, e);
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("{} read failed: {}", who, e);
                break;
            }
        }
    }

    info!(
        "{} disconnected: {} bytes echoed in {:.2} seconds",
        who,
        total,
        start.elapsed().as_secs_f64()
    );
}
