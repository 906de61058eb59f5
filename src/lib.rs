//! PeerDAS core: the data-availability kernel a blockchain node uses to
//! prove blob retrievability without downloading every blob, and to
//! custody, sample, reconstruct and gossip erasure-coded blob columns.
//!
//! This crate re-exports every workspace member's public surface, the way
//! the donor workspace's root crate re-exports `ethereum-core`,
//! `ethereum-network`, etc. It is a pure library: no CLI, no wire
//! transport, no persistent storage.

pub use das_types as types;

pub use das_codec as codec;
pub use das_columns as columns;
pub use das_crypto as crypto;
pub use das_custody as custody;
pub use das_field as field;
pub use das_forwardcast as forwardcast;
pub use das_gossip as gossip;
pub use das_pool as pool;
pub use das_reconstruct as reconstruct;
pub use das_sampler as sampler;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
