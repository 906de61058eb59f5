//! Per-peer, per-subnet gossip score accounting with decay.

use std::collections::HashMap;

use das_types::Hash32;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorerConfig {
    pub min_score: f64,
    pub max_score: f64,
    pub valid_reward: f64,
    pub invalid_penalty: f64,
    pub late_penalty: f64,
    pub decay_factor: f64,
    pub decay_interval_ticks: u64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            min_score: -100.0,
            max_score: 100.0,
            valid_reward: 1.0,
            invalid_penalty: 10.0,
            late_penalty: 2.0,
            decay_factor: 0.9,
            decay_interval_ticks: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeerSubnetEntry {
    pub score: f64,
    pub valid_count: u64,
    pub invalid_count: u64,
    pub late_count: u64,
    pub last_message_tick: u64,
    pub last_decay_tick: u64,
}

struct State {
    entries: HashMap<(Hash32, u64), PeerSubnetEntry>,
}

/// One scorer per node; peers are identified by opaque 32-byte id.
pub struct GossipScorer {
    config: ScorerConfig,
    state: RwLock<State>,
}

impl GossipScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State {
                entries: HashMap::new(),
            }),
        }
    }

    fn clamp(&self, score: f64) -> f64 {
        score.clamp(self.config.min_score, self.config.max_score)
    }

    fn bump(&self, peer: Hash32, subnet: u64, tick: u64, delta: f64, f: impl FnOnce(&mut PeerSubnetEntry)) {
        let mut state = self.state.write();
        let entry = state.entries.entry((peer, subnet)).or_default();
        entry.score = self.clamp(entry.score + delta);
        entry.last_message_tick = tick;
        f(entry);
    }

    pub fn record_valid(&self, peer: Hash32, subnet: u64, tick: u64) {
        let reward = self.config.valid_reward;
        self.bump(peer, subnet, tick, reward, |e| e.valid_count += 1);
    }

    pub fn record_invalid(&self, peer: Hash32, subnet: u64, tick: u64) {
        let penalty = -self.config.invalid_penalty;
        self.bump(peer, subnet, tick, penalty, |e| e.invalid_count += 1);
        tracing::warn!(subnet, "peer sent invalid column, score penalized");
    }

    pub fn record_late(&self, peer: Hash32, subnet: u64, tick: u64) {
        let penalty = -self.config.late_penalty;
        self.bump(peer, subnet, tick, penalty, |e| e.late_count += 1);
    }

    pub fn peer_subnet_score(&self, peer: Hash32, subnet: u64) -> f64 {
        self.state
            .read()
            .entries
            .get(&(peer, subnet))
            .map(|e| e.score)
            .unwrap_or(0.0)
    }

    pub fn peer_aggregate_score(&self, peer: Hash32) -> f64 {
        self.state
            .read()
            .entries
            .iter()
            .filter(|((p, _), _)| *p == peer)
            .map(|(_, e)| e.score)
            .sum()
    }

    pub fn is_below_threshold(&self, peer: Hash32) -> bool {
        self.peer_aggregate_score(peer) < self.config.min_score
    }

    /// Descending by score for `subnet`.
    pub fn rank_peers_for_subnet(&self, subnet: u64) -> Vec<(Hash32, f64)> {
        let state = self.state.read();
        let mut ranked: Vec<(Hash32, f64)> = state
            .entries
            .iter()
            .filter(|((_, s), _)| *s == subnet)
            .map(|((p, _), e)| (*p, e.score))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    /// Multiplies every score by `decay_factor` for each elapsed
    /// `decay_interval_ticks` since the entry's last decay.
    pub fn decay_scores(&self, now: u64) {
        let mut state = self.state.write();
        let interval = self.config.decay_interval_ticks.max(1);
        tracing::debug!(entries = state.entries.len(), now, "decaying gossip scores");
        for entry in state.entries.values_mut() {
            let elapsed = now.saturating_sub(entry.last_decay_tick);
            let periods = elapsed / interval;
            if periods > 0 {
                entry.score *= self.config.decay_factor.powi(periods as i32);
                entry.score = entry.score.clamp(self.config.min_score, self.config.max_score);
                entry.last_decay_tick = now;
            }
        }
    }

    pub fn entry(&self, peer: Hash32, subnet: u64) -> PeerSubnetEntry {
        self.state
            .read()
            .entries
            .get(&(peer, subnet))
            .copied()
            .unwrap_or_default()
    }
}
