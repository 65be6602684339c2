//! dtnroute - inspect a route directory offline
//!
//! `dtnroute --routes DIR --dump` prints the merged route document.
//! `dtnroute --routes DIR dtn://name/demux` resolves a URI against it.

use std::path::PathBuf;
use std::time::Duration;

use dtn_cli::args::Args;
use dtn_core::DtnUri;
use dtn_node::routing::{RoutingConfig, RoutingTable};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("dtnroute: {}", e);
            eprintln!("Try 'dtnroute --help'");
            std::process::exit(2);
        }
    };

    if args.has("version") {
        println!("dtnroute {}", VERSION);
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

    let mut config = RoutingConfig::default();
    if let Some(path) = args.routes_path() {
        config.path = PathBuf::from(path);
    }
    config.lock_timeout = Duration::from_millis(500);

    let table = RoutingTable::create(config);
    match table.len() {
        Ok(0) => log::warn!("No routes loaded"),
        Ok(n) => log::debug!("{} destination entries loaded", n),
        Err(e) => {
            eprintln!("dtnroute: {}", e);
            std::process::exit(1);
        }
    }

    if args.has("dump") || args.has("d") || args.positional.is_empty() {
        let mut stdout = std::io::stdout();
        if let Err(e) = table.dump(&mut stdout) {
            eprintln!("dtnroute: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let mut failed = false;
    for raw in &args.positional {
        let uri = match DtnUri::decode(raw) {
            Ok(uri) => uri,
            Err(e) => {
                eprintln!("dtnroute: '{}': {}", raw, e);
                failed = true;
                continue;
            }
        };
        match table.get_info_for_uri(&uri) {
            Ok(results) if results.is_empty() => {
                println!("{}: no route", raw);
            }
            Ok(results) => {
                for info in results {
                    let interface = info
                        .target
                        .interface
                        .as_deref()
                        .map(|i| format!(" via {}", i))
                        .unwrap_or_default();
                    println!(
                        "{}: {} '{}' -> {}://{}:{}{} ({})",
                        raw,
                        info.class,
                        info.key,
                        info.target.socket.kind,
                        info.target.socket.host,
                        info.target.socket.port,
                        interface,
                        info.destination
                    );
                }
            }
            Err(e) => {
                eprintln!("dtnroute: '{}': {}", raw, e);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: dtnroute [OPTIONS] [URI...]");
    println!();
    println!("With no URI, prints the route document as JSON.");
    println!();
    println!("Options:");
    println!("  --routes DIR, -r DIR    Route directory (default /etc/opendtn/dtn_router/routes)");
    println!("  --dump, -d              Print the route document and exit");
    println!("  -v / -q                 More / less logging");
    println!("  --version               Print version and exit");
    println!("  --help, -h              Print this help");
}
