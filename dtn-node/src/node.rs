//! Node assembly.
//!
//! `DtnNode` wires the routing table, key store, and worker pool together.
//! Inbound frame bytes enter through `submit`; a pool worker decodes the
//! frame, parses the destination URI, resolves it against the routing
//! table, and hands each match to the `Forwarder`. Frames that cannot be
//! decoded or routed are logged and dropped without failing the worker.

use std::sync::Arc;

use dtn_core::{frame, DtnUri};

use crate::config::NodeConfig;
use crate::key_store::KeyStore;
use crate::pool::{PoolConfig, PoolError, PoolStatistics, ProcessFn, PushError, ThreadPool, ThreadQueue};
use crate::routing::{RouteInfo, RoutingTable};

/// Delivers a payload toward one resolved route. Returns false if the
/// payload could not be handed off.
pub trait Forwarder: Send + Sync + 'static {
    fn forward(&self, info: &RouteInfo, payload: &[u8]) -> bool;
}

impl<F> Forwarder for F
where
    F: Fn(&RouteInfo, &[u8]) -> bool + Send + Sync + 'static,
{
    fn forward(&self, info: &RouteInfo, payload: &[u8]) -> bool {
        self(info, payload)
    }
}

/// A running DTN node.
pub struct DtnNode {
    routing: Arc<RoutingTable>,
    keys: Arc<KeyStore>,
    queue: ThreadQueue<Vec<u8>>,
    pool: ThreadPool<Vec<u8>>,
}

impl DtnNode {
    pub fn new(config: &NodeConfig, forwarder: Arc<dyn Forwarder>) -> Self {
        let routing = Arc::new(RoutingTable::create(config.routing_config()));
        let keys = Arc::new(KeyStore::create(config.key_store_config()));
        let queue = ThreadQueue::new(config.queue_capacity, config.lock_timeout());

        let process: ProcessFn<Vec<u8>> = {
            let routing = Arc::clone(&routing);
            Arc::new(move |bytes: Vec<u8>| process_frame(&routing, forwarder.as_ref(), &bytes))
        };
        let pool = ThreadPool::new(
            queue.clone(),
            process,
            PoolConfig {
                num_threads: config.workers,
            },
        );

        DtnNode {
            routing,
            keys,
            queue,
            pool,
        }
    }

    pub fn start(&mut self) -> Result<(), PoolError> {
        self.pool.start()
    }

    pub fn stop(&mut self) -> Result<(), PoolError> {
        self.pool.stop()
    }

    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Enqueue raw frame bytes for processing. Hands the bytes back if
    /// the queue is full or its lock contended past the timeout.
    pub fn submit(&self, frame_bytes: Vec<u8>) -> Result<(), PushError<Vec<u8>>> {
        self.queue.push(frame_bytes)
    }

    /// Clone of the inbound queue handle, for producers that outlive a
    /// borrow of the node (listener threads).
    pub fn submit_handle(&self) -> ThreadQueue<Vec<u8>> {
        self.queue.clone()
    }

    pub fn routing(&self) -> &Arc<RoutingTable> {
        &self.routing
    }

    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    pub fn statistics(&self) -> PoolStatistics {
        self.pool.statistics()
    }
}

/// One worker pass over a submitted frame. Returns false only when a
/// resolved route's forward fails; malformed or unroutable frames count
/// as handled.
fn process_frame(routing: &RoutingTable, forwarder: &dyn Forwarder, bytes: &[u8]) -> bool {
    let (uri_str, payload, consumed) = match frame::decode(bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            log::warn!("Dropping undecodable frame ({} bytes): {}", bytes.len(), e);
            return true;
        }
    };
    if consumed < bytes.len() {
        log::debug!("Frame carried {} trailing bytes, ignored", bytes.len() - consumed);
    }

    let uri = match DtnUri::decode(&uri_str) {
        Ok(uri) => uri,
        Err(e) => {
            log::warn!("Dropping frame for malformed URI '{}': {}", uri_str, e);
            return true;
        }
    };

    let routes = match routing.get_info_for_uri(&uri) {
        Ok(routes) => routes,
        Err(e) => {
            log::error!("Route lookup failed for '{}': {}", uri_str, e);
            return false;
        }
    };
    if routes.is_empty() {
        log::debug!("No route for '{}', dropping frame", uri_str);
        return true;
    }

    let mut all_forwarded = true;
    for info in &routes {
        if forwarder.forward(info, &payload) {
            log::debug!(
                "Forwarded {} bytes for '{}' via {} route '{}'",
                payload.len(),
                uri_str,
                info.class,
                info.destination
            );
        } else {
            log::warn!(
                "Forward failed for '{}' via route '{}'",
                uri_str,
                info.destination
            );
            all_forwarded = false;
        }
    }
    all_forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{RouteClass, RoutingConfig};
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;

    fn table_with_route(dir: &Path) -> RoutingTable {
        std::fs::write(
            dir.join("relay.route"),
            r#"{ "relay": { "uris": {
                "alice": { "socket": { "host": "h1", "port": 1, "type": "tcp" } },
                "alice/inbox": { "socket": { "host": "h2", "port": 2, "type": "udp" } }
            } } }"#,
        )
        .unwrap();
        RoutingTable::create(RoutingConfig {
            path: dir.to_path_buf(),
            name: "test".into(),
            lock_timeout: Duration::from_millis(200),
        })
    }

    use std::sync::atomic::{AtomicU64, Ordering};
    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> std::path::PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "dtn-node-test-{}-{}",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    struct Recording {
        seen: Mutex<Vec<(String, RouteClass, Vec<u8>)>>,
    }

    impl Forwarder for Recording {
        fn forward(&self, info: &RouteInfo, payload: &[u8]) -> bool {
            self.seen
                .lock()
                .unwrap()
                .push((info.key.clone(), info.class, payload.to_vec()));
            true
        }
    }

    #[test]
    fn test_process_frame_forwards_both_matches() {
        let dir = temp_dir();
        let routing = table_with_route(&dir);
        let recorder = Recording {
            seen: Mutex::new(Vec::new()),
        };

        let bytes = frame::encode("dtn://alice/inbox", b"payload");
        assert!(process_frame(&routing, &recorder, &bytes));

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "alice");
        assert_eq!(seen[0].1, RouteClass::Regname);
        assert_eq!(seen[1].0, "alice/inbox");
        assert_eq!(seen[1].1, RouteClass::Direct);
        assert_eq!(seen[0].2, b"payload");
    }

    #[test]
    fn test_malformed_frame_dropped_as_handled() {
        let dir = temp_dir();
        let routing = table_with_route(&dir);
        let recorder = Recording {
            seen: Mutex::new(Vec::new()),
        };

        assert!(process_frame(&routing, &recorder, &[0x85]));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_bad_uri_dropped_as_handled() {
        let dir = temp_dir();
        let routing = table_with_route(&dir);
        let recorder = Recording {
            seen: Mutex::new(Vec::new()),
        };

        let bytes = frame::encode("no-colon-here", b"x");
        assert!(process_frame(&routing, &recorder, &bytes));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unroutable_dropped_as_handled() {
        let dir = temp_dir();
        let routing = table_with_route(&dir);
        let recorder = Recording {
            seen: Mutex::new(Vec::new()),
        };

        let bytes = frame::encode("dtn://nobody/here", b"x");
        assert!(process_frame(&routing, &recorder, &bytes));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_forward_failure_reported() {
        let dir = temp_dir();
        let routing = table_with_route(&dir);
        let rejecting = |_: &RouteInfo, _: &[u8]| false;

        let bytes = frame::encode("dtn://alice/inbox", b"x");
        assert!(!process_frame(&routing, &rejecting, &bytes));
    }
}
