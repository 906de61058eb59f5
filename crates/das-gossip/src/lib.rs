//! Gossip scorer and reconstruction trigger (C9).

pub mod scorer;
pub mod trigger;

pub use scorer::{GossipScorer, PeerSubnetEntry, ScorerConfig};
pub use trigger::ReconstructionTrigger;
