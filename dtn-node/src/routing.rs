//! Reloadable routing table.
//!
//! Routes live on disk as one `<name>.route` JSON file per destination
//! name, e.g.:
//!
//! ```text
//! { "relay-a": { "uris": {
//!     "alice":        { "socket": { "host": "10.0.0.5", "port": 4556, "type": "tcp" } },
//!     "alice/inbox":  { "socket": { "host": "10.0.0.6", "port": 4556, "type": "udp" },
//!                       "interface": "eth1" } } } }
//! ```
//!
//! A `uris` key holding just a name matches any URI with that registered
//! name (REGNAME class); a `name/demux` key matches only that exact
//! endpoint (DIRECT class). Both classes are checked independently, so a
//! single destination entry can contribute up to two results for one URI.
//!
//! `load` parses the whole directory before swapping the in-memory set, so
//! a malformed file never clobbers the routes already being served.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use dtn_core::DtnUri;
use serde::{Deserialize, Serialize};

use crate::lock::{ThreadLock, DEFAULT_TIMEOUT};

/// Extension of on-disk route documents.
const ROUTE_FILE_EXT: &str = "route";

/// Transport used to reach a route target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Udp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Udp => write!(f, "udp"),
        }
    }
}

/// Network endpoint of a route target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketConfig {
    pub host: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub kind: TransportKind,
}

/// Where matching traffic is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub socket: SocketConfig,
    /// Optional egress interface hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

/// One destination's routes, keyed by `name` or `name/demux`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub uris: BTreeMap<String, RouteTarget>,
}

/// Which kind of `uris` key produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Matched the registered name alone.
    Regname,
    /// Matched the exact `name/demux` endpoint.
    Direct,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteClass::Regname => write!(f, "REGNAME"),
            RouteClass::Direct => write!(f, "DIRECT"),
        }
    }
}

/// One lookup result.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    /// Destination entry (route file name) the match came from.
    pub destination: String,
    pub class: RouteClass,
    /// The `uris` key that matched.
    pub key: String,
    pub target: RouteTarget,
}

/// Routing table error.
#[derive(Debug)]
pub enum RoutingError {
    Io(io::Error),
    /// A route file did not parse; names the offending file.
    Parse { file: PathBuf, message: String },
    /// Table lock not acquired within its timeout.
    LockTimeout,
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::Io(e) => write!(f, "Routing I/O error: {}", e),
            RoutingError::Parse { file, message } => {
                write!(f, "Route file '{}': {}", file.display(), message)
            }
            RoutingError::LockTimeout => write!(f, "Routing table lock timed out"),
        }
    }
}

impl std::error::Error for RoutingError {}

impl From<io::Error> for RoutingError {
    fn from(e: io::Error) -> Self {
        RoutingError::Io(e)
    }
}

/// Routing table configuration.
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Directory holding the `.route` files.
    pub path: PathBuf,
    /// Name of this table, used in logs.
    pub name: String,
    pub lock_timeout: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        RoutingConfig {
            path: PathBuf::from("/etc/opendtn/dtn_router/routes"),
            name: "router".into(),
            lock_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Ordered route document: destination entries in load order (sorted file
/// names, then in-file key order).
type RouteSet = Vec<(String, RouteEntry)>;

/// Concurrently-accessed, reloadable routing table.
pub struct RoutingTable {
    config: RoutingConfig,
    routes: ThreadLock<RouteSet>,
}

impl RoutingTable {
    /// Build the table and attempt an initial load from the configured
    /// directory. A failed initial load leaves the table empty and
    /// usable; the failure is logged.
    pub fn create(config: RoutingConfig) -> Self {
        let table = RoutingTable {
            routes: ThreadLock::new(Vec::new(), config.lock_timeout),
            config,
        };
        if let Err(e) = table.load(None) {
            log::warn!(
                "Routing table '{}': initial load failed: {}",
                table.config.name,
                e
            );
        }
        table
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Reload routes from `path` (or the configured directory). The whole
    /// directory is parsed before anything is swapped in, so on error the
    /// previous routes stay in place. Returns the number of destination
    /// entries loaded.
    pub fn load(&self, path: Option<&Path>) -> Result<usize, RoutingError> {
        let dir = path.unwrap_or(&self.config.path);
        let parsed = read_route_dir(dir)?;
        let count = parsed.len();

        let mut routes = self.routes.try_lock().ok_or(RoutingError::LockTimeout)?;
        *routes = parsed;
        drop(routes);

        log::debug!(
            "Routing table '{}': loaded {} entries from {}",
            self.config.name,
            count,
            dir.display()
        );
        Ok(count)
    }

    /// Write the current routes to `path` (or the configured directory),
    /// one `<name>.route` file per destination entry. An explicit override
    /// path is created if missing. The first write failure aborts; files
    /// already written in this pass remain on disk.
    pub fn save(&self, path: Option<&Path>) -> Result<(), RoutingError> {
        let routes = self.routes.try_lock().ok_or(RoutingError::LockTimeout)?;

        let dir = match path {
            Some(p) => {
                fs::create_dir_all(p)?;
                p
            }
            None => self.config.path.as_path(),
        };

        for (name, entry) in routes.iter() {
            let file = dir.join(format!("{}.{}", name, ROUTE_FILE_EXT));
            let mut doc = serde_json::Map::new();
            doc.insert(
                name.clone(),
                serde_json::to_value(entry).map_err(|e| RoutingError::Parse {
                    file: file.clone(),
                    message: e.to_string(),
                })?,
            );
            let text = serde_json::to_string_pretty(&doc).map_err(|e| RoutingError::Parse {
                file: file.clone(),
                message: e.to_string(),
            })?;
            fs::write(&file, text)?;
        }
        Ok(())
    }

    /// Resolve a URI against the table. Each destination entry is checked
    /// for a registered-name match and an exact endpoint match
    /// independently; results come back REGNAME before DIRECT, entries in
    /// document order. No match is an empty vec, not an error.
    pub fn get_info_for_uri(&self, uri: &DtnUri) -> Result<Vec<RouteInfo>, RoutingError> {
        let name = match uri.name.as_deref() {
            Some(n) => n,
            None => return Ok(Vec::new()),
        };
        let direct_key = uri.demux.as_deref().map(|d| format!("{}/{}", name, d));

        let routes = self.routes.try_lock().ok_or(RoutingError::LockTimeout)?;
        let mut results = Vec::new();
        for (destination, entry) in routes.iter() {
            if let Some(target) = entry.uris.get(name) {
                results.push(RouteInfo {
                    destination: destination.clone(),
                    class: RouteClass::Regname,
                    key: name.to_string(),
                    target: target.clone(),
                });
            }
            if let Some(key) = direct_key.as_deref() {
                if let Some(target) = entry.uris.get(key) {
                    results.push(RouteInfo {
                        destination: destination.clone(),
                        class: RouteClass::Direct,
                        key: key.to_string(),
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(results)
    }

    /// Write the current document as JSON text.
    pub fn dump(&self, writer: &mut dyn Write) -> Result<(), RoutingError> {
        let routes = self.routes.try_lock().ok_or(RoutingError::LockTimeout)?;
        let mut doc = serde_json::Map::new();
        for (name, entry) in routes.iter() {
            let value = serde_json::to_value(entry).map_err(|e| RoutingError::Parse {
                file: self.config.path.clone(),
                message: e.to_string(),
            })?;
            doc.insert(name.clone(), value);
        }
        drop(routes);
        let text = serde_json::to_string_pretty(&doc).map_err(|e| RoutingError::Parse {
            file: self.config.path.clone(),
            message: e.to_string(),
        })?;
        writer.write_all(text.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Number of destination entries currently loaded.
    pub fn len(&self) -> Result<usize, RoutingError> {
        let routes = self.routes.try_lock().ok_or(RoutingError::LockTimeout)?;
        Ok(routes.len())
    }

    pub fn is_empty(&self) -> Result<bool, RoutingError> {
        Ok(self.len()? == 0)
    }
}

/// Parse every `.route` file under `dir`, sorted by file name. In-file
/// top-level key order is preserved.
fn read_route_dir(dir: &Path) -> Result<RouteSet, RoutingError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ROUTE_FILE_EXT) {
            files.push(path);
        }
    }
    files.sort();

    let mut set: RouteSet = Vec::new();
    for file in files {
        let text = fs::read_to_string(&file)?;
        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&text).map_err(|e| RoutingError::Parse {
                file: file.clone(),
                message: e.to_string(),
            })?;
        for (name, value) in doc {
            let entry: RouteEntry =
                serde_json::from_value(value).map_err(|e| RoutingError::Parse {
                    file: file.clone(),
                    message: e.to_string(),
                })?;
            set.push((name, entry));
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};
    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "dtn-routing-test-{}-{}",
            std::process::id(),
            id
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_route(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(format!("{}.route", name)), body).unwrap();
    }

    fn table_for(dir: &Path) -> RoutingTable {
        RoutingTable::create(RoutingConfig {
            path: dir.to_path_buf(),
            name: "test".into(),
            lock_timeout: Duration::from_millis(200),
        })
    }

    const RELAY_A: &str = r#"{
        "relay-a": { "uris": {
            "alice": { "socket": { "host": "10.0.0.5", "port": 4556, "type": "tcp" } },
            "alice/inbox": { "socket": { "host": "10.0.0.6", "port": 4557, "type": "udp" },
                             "interface": "eth1" }
        } }
    }"#;

    #[test]
    fn test_load_and_lookup_both_classes() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);
        assert_eq!(table.len().unwrap(), 1);

        let uri = DtnUri::decode("dtn://alice/inbox").unwrap();
        let results = table.get_info_for_uri(&uri).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].class, RouteClass::Regname);
        assert_eq!(results[0].key, "alice");
        assert_eq!(results[0].target.socket.host, "10.0.0.5");
        assert_eq!(results[1].class, RouteClass::Direct);
        assert_eq!(results[1].key, "alice/inbox");
        assert_eq!(results[1].target.interface.as_deref(), Some("eth1"));
    }

    #[test]
    fn test_lookup_regname_only() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);

        let uri = DtnUri::decode("dtn://alice/outbox").unwrap();
        let results = table.get_info_for_uri(&uri).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].class, RouteClass::Regname);
    }

    #[test]
    fn test_lookup_no_match_is_empty() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);

        let uri = DtnUri::decode("dtn://carol/inbox").unwrap();
        assert!(table.get_info_for_uri(&uri).unwrap().is_empty());
    }

    #[test]
    fn test_entries_in_file_name_order() {
        let dir = temp_dir();
        let target = r#"{ "socket": { "host": "h", "port": 1, "type": "tcp" } }"#;
        write_route(
            &dir,
            "b-relay",
            &format!(r#"{{ "b-relay": {{ "uris": {{ "alice": {} }} }} }}"#, target),
        );
        write_route(
            &dir,
            "a-relay",
            &format!(r#"{{ "a-relay": {{ "uris": {{ "alice": {} }} }} }}"#, target),
        );
        let table = table_for(&dir);

        let uri = DtnUri::decode("dtn://alice/x").unwrap();
        let results = table.get_info_for_uri(&uri).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].destination, "a-relay");
        assert_eq!(results[1].destination, "b-relay");
    }

    #[test]
    fn test_failed_reload_keeps_old_routes() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);
        assert_eq!(table.len().unwrap(), 1);

        let bad_dir = temp_dir();
        write_route(&bad_dir, "broken", "{ not json");
        assert!(table.load(Some(&bad_dir)).is_err());

        // Old document still answers lookups.
        let uri = DtnUri::decode("dtn://alice/inbox").unwrap();
        assert_eq!(table.get_info_for_uri(&uri).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_dir_create_still_usable() {
        let dir = temp_dir();
        let missing = dir.join("nope");
        let table = table_for(&missing);
        // Initial load failed but the table serves empty results.
        let uri = DtnUri::decode("dtn://alice/inbox").unwrap();
        assert!(table.get_info_for_uri(&uri).unwrap().is_empty());
    }

    #[test]
    fn test_save_roundtrip_to_override_path() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);

        let out = temp_dir().join("nested").join("routes");
        table.save(Some(&out)).unwrap();
        assert!(out.join("relay-a.route").is_file());

        let reloaded = table_for(&out);
        let uri = DtnUri::decode("dtn://alice/inbox").unwrap();
        assert_eq!(reloaded.get_info_for_uri(&uri).unwrap().len(), 2);
    }

    #[test]
    fn test_non_route_files_ignored() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        fs::write(dir.join("README.txt"), "not a route").unwrap();
        let table = table_for(&dir);
        assert_eq!(table.len().unwrap(), 1);
    }

    #[test]
    fn test_dump_is_valid_json() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);

        let mut out = Vec::new();
        table.dump(&mut out).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(doc.get("relay-a").is_some());
    }

    #[test]
    fn test_none_uri_resolves_to_nothing_routable() {
        let dir = temp_dir();
        write_route(&dir, "relay-a", RELAY_A);
        let table = table_for(&dir);

        // "none" is a name like any other; it simply has no routes here.
        let uri = DtnUri::decode("dtn:none").unwrap();
        assert!(table.get_info_for_uri(&uri).unwrap().is_empty());
    }
}
