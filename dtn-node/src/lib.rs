//! dtn-node: store-and-forward services for a DTN node.
//!
//! Builds the routing table, key store, and worker pool on top of the
//! dtn-core codecs. All shared state lives behind `lock::ThreadLock`,
//! a timeout-bounded mutex: contention shows up as a recoverable error,
//! never as an indefinite block.

pub mod config;
pub mod key_store;
pub mod lock;
pub mod node;
pub mod pool;
pub mod routing;

pub use config::NodeConfig;
pub use key_store::{KeyStore, KeyStoreConfig};
pub use node::{DtnNode, Forwarder};
pub use routing::{RouteClass, RouteInfo, RoutingConfig, RoutingTable};
