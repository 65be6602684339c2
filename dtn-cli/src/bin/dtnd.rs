//! dtnd - DTN node daemon
//!
//! Loads the node config, starts the worker pool, optionally listens for
//! inbound frames over UDP, and forwards resolved payloads over the
//! transport each route names.

use std::io::Write;
use std::net::{TcpStream, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use dtn_cli::args::Args;
use dtn_node::routing::{RouteInfo, TransportKind};
use dtn_node::{DtnNode, Forwarder, NodeConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends a payload to the route's socket over its configured transport.
struct SocketForwarder;

impl Forwarder for SocketForwarder {
    fn forward(&self, info: &RouteInfo, payload: &[u8]) -> bool {
        let addr = format!("{}:{}", info.target.socket.host, info.target.socket.port);
        let result = match info.target.socket.kind {
            TransportKind::Udp => UdpSocket::bind("0.0.0.0:0")
                .and_then(|s| s.send_to(payload, addr.as_str()))
                .map(|_| ()),
            TransportKind::Tcp => addr
                .parse()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
                .and_then(|sockaddr| TcpStream::connect_timeout(&sockaddr, CONNECT_TIMEOUT))
                .and_then(|mut stream| stream.write_all(payload)),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Forward to {} ({}) failed: {}", addr, info.target.socket.kind, e);
                false
            }
        }
    }
}

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("dtnd: {}", e);
            eprintln!("Try 'dtnd --help'");
            std::process::exit(2);
        }
    };

    if args.has("version") {
        println!("dtnd {}", VERSION);
        return;
    }

    if args.has("help") || args.has("h") {
        print_usage();
        return;
    }

    env_logger::Builder::new()
        .filter_level(dtn_cli::log_level(args.verbosity, args.quiet))
        .format_timestamp_secs()
        .init();

    let config = match args.config_path() {
        Some(path) => match NodeConfig::load(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Could not load config '{}': {}", path, e);
                std::process::exit(1);
            }
        },
        None => NodeConfig::default(),
    };

    log::info!("Starting dtnd {} as '{}'", VERSION, config.name);

    let mut node = DtnNode::new(&config, Arc::new(SocketForwarder));
    if let Err(e) = node.start() {
        log::error!("Failed to start: {}", e);
        std::process::exit(1);
    }

    // Handle SIGTERM/SIGINT
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as *const () as libc::sighandler_t);
    }
    STOP_TX.lock().unwrap().replace(stop_tx);

    let listener = match config.listen.as_deref() {
        Some(addr) => match spawn_listener(addr, &node) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Could not listen on {}: {}", addr, e);
                std::process::exit(1);
            }
        },
        None => {
            log::warn!("No listen address configured, daemon has no network ingress");
            None
        }
    };

    log::info!("dtnd started");

    // Block until signal
    loop {
        match stop_rx.recv_timeout(Duration::from_secs(1)) {
            Ok(()) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(_) => break,
        }
    }

    log::info!("Shutting down...");
    LISTENER_STOP.store(true, Ordering::Release);
    if let Some(handle) = listener {
        let _ = handle.join();
    }
    if let Err(e) = node.stop() {
        log::error!("Stop failed: {}", e);
    }
    let stats = node.statistics();
    log::info!(
        "dtnd stopped (received {}, processed {}, lost {})",
        stats.received,
        stats.processed,
        stats.lost
    );
}

static LISTENER_STOP: AtomicBool = AtomicBool::new(false);

/// Read frames off a UDP socket and feed them to the node. One datagram
/// is one frame.
fn spawn_listener(
    addr: &str,
    node: &DtnNode,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_read_timeout(Some(Duration::from_secs(1)))?;
    log::info!("Listening on udp://{}", addr);

    // The node outlives the listener thread; share its queue handle only.
    let submit = node.submit_handle();
    std::thread::Builder::new()
        .name("dtnd-listener".into())
        .spawn(move || {
            let mut buf = vec![0u8; 64 * 1024];
            while !LISTENER_STOP.load(Ordering::Acquire) {
                match socket.recv_from(&mut buf) {
                    Ok((len, peer)) => {
                        log::debug!("Received {} bytes from {}", len, peer);
                        if let Err(e) = submit.push(buf[..len].to_vec()) {
                            log::warn!("Inbound frame dropped: {}", e);
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        log::error!("Listener socket error: {}", e);
                        break;
                    }
                }
            }
        })
}

static STOP_TX: std::sync::Mutex<Option<mpsc::Sender<()>>> = std::sync::Mutex::new(None);

extern "C" fn signal_handler(_sig: libc::c_int) {
    if let Ok(guard) = STOP_TX.lock() {
        if let Some(ref tx) = *guard {
            let _ = tx.send(());
        }
    }
}

fn print_usage() {
    println!("Usage: dtnd [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config PATH, -c PATH  Path to node config file (JSON)");
    println!("  -v                      Increase verbosity (can repeat)");
    println!("  -q                      Decrease verbosity (can repeat)");
    println!("  --version               Print version and exit");
    println!("  --help, -h              Print this help");
}
