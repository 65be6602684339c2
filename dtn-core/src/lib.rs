//! dtn-core: wire-format codecs for DTN nodes.
//!
//! Pure, allocation-light codecs with no I/O and no dependencies:
//! - `sdnv`: RFC 5050 Self-Delimiting Numeric Values
//! - `uri`: the DTN addressing scheme `scheme://name[/demux]`
//! - `frame`: SDNV-delimited (destination, payload) frames

pub mod frame;
pub mod sdnv;
pub mod uri;

pub use uri::DtnUri;
