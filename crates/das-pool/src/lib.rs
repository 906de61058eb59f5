//! Sparse blob pool (C7): a deterministic hash-prefix filter keeps roughly
//! `1/sparsity` of observed blobs, with slot-based pruning and monotonic
//! counters.

use std::collections::HashMap;

use das_types::Hash32;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("sparsity must be nonzero")]
    ZeroSparsity,
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    slot: u64,
    added_at: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PoolCounters {
    pub total_added: u64,
    pub rejected: u64,
    pub pruned: u64,
    pub stored: u64,
}

/// `big_endian_u64(hash[0..8]) mod sparsity == 0` — bit-exact per §6.
pub fn passes_sparsity_filter(hash: &Hash32, sparsity: u64) -> bool {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_be_bytes(buf) % sparsity == 0
}

struct State {
    entries: HashMap<Hash32, Entry>,
    counters: PoolCounters,
}

/// Monotonic logical clock substitute for `now()`: callers pass the current
/// slot/tick explicitly since this crate has no I/O or wall-clock access.
pub struct SparseBlobPool {
    sparsity: u64,
    state: RwLock<State>,
}

impl SparseBlobPool {
    pub fn new(sparsity: u64) -> Result<Self> {
        if sparsity == 0 {
            return Err(PoolError::ZeroSparsity);
        }
        Ok(Self {
            sparsity,
            state: RwLock::new(State {
                entries: HashMap::new(),
                counters: PoolCounters::default(),
            }),
        })
    }

    pub fn sparsity(&self) -> u64 {
        self.sparsity
    }

    /// Adds `data` for `hash` at `slot`, stamping `added_at = now`. Returns
    /// `false` (and bumps `rejected`) if the hash fails the sparsity filter.
    /// Re-adding an already-stored hash is a no-op that returns `true`.
    pub fn add_blob(&self, hash: Hash32, data: Vec<u8>, slot: u64, now: u64) -> bool {
        if !passes_sparsity_filter(&hash, self.sparsity) {
            self.state.write().counters.rejected += 1;
            return false;
        }
        let mut state = self.state.write();
        if state.entries.contains_key(&hash) {
            return true;
        }
        state.entries.insert(
            hash,
            Entry {
                data,
                slot,
                added_at: now,
            },
        );
        state.counters.total_added += 1;
        state.counters.stored += 1;
        debug!(slot, "stored blob in sparse pool");
        true
    }

    /// Defensive copy of the stored blob, if present.
    pub fn get_blob(&self, hash: &Hash32) -> Option<Vec<u8>> {
        self.state.read().entries.get(hash).map(|e| e.data.clone())
    }

    /// Removes entries with `slot < cutoff_slot`.
    pub fn prune_expired(&self, cutoff_slot: u64) -> usize {
        let mut state = self.state.write();
        let expired: Vec<Hash32> = state
            .entries
            .iter()
            .filter(|(_, e)| e.slot < cutoff_slot)
            .map(|(h, _)| *h)
            .collect();
        for hash in &expired {
            state.entries.remove(hash);
        }
        let count = expired.len() as u64;
        state.counters.pruned += count;
        state.counters.stored = state.counters.stored.saturating_sub(count);
        count as usize
    }

    pub fn counters(&self) -> PoolCounters {
        self.state.read().counters
    }

    pub fn reset(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.counters = PoolCounters::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with_prefix(prefix: u64) -> Hash32 {
        let mut bytes = [0u8; 32];
        bytes[0..8].copy_from_slice(&prefix.to_be_bytes());
        Hash32::from(bytes)
    }

    #[test]
    fn zero_sparsity_is_rejected_at_construction() {
        assert_eq!(SparseBlobPool::new(0), Err(PoolError::ZeroSparsity));
    }

    #[test]
    fn sparsity_one_keeps_everything() {
        let pool = SparseBlobPool::new(1).unwrap();
        for prefix in 0..8u64 {
            assert!(pool.add_blob(hash_with_prefix(prefix), vec![1], 0, 0));
        }
        assert_eq!(pool.counters().stored, 8);
    }

    #[test]
    fn sparsity_four_keeps_exactly_the_literal_scenario() {
        let pool = SparseBlobPool::new(4).unwrap();
        for prefix in 0..8u64 {
            pool.add_blob(hash_with_prefix(prefix), vec![1], 0, 0);
        }
        let counters = pool.counters();
        assert_eq!(counters.stored, 2); // prefixes 0 and 4
        assert_eq!(counters.rejected, 6);
    }

    #[test]
    fn defensive_copy_law_mutating_input_does_not_alter_stored() {
        let pool = SparseBlobPool::new(1).unwrap();
        let hash = hash_with_prefix(0);
        let mut data = vec![1u8, 2, 3];
        pool.add_blob(hash, data.clone(), 0, 0);
        data[0] = 99;
        assert_eq!(pool.get_blob(&hash).unwrap(), vec![1u8, 2, 3]);
    }

    #[test]
    fn duplicate_add_does_not_overwrite_or_increment_counters() {
        let pool = SparseBlobPool::new(1).unwrap();
        let hash = hash_with_prefix(0);
        assert!(pool.add_blob(hash, vec![1], 0, 0));
        assert!(pool.add_blob(hash, vec![2], 0, 10));
        assert_eq!(pool.get_blob(&hash).unwrap(), vec![1]);
        assert_eq!(pool.counters().total_added, 1);
    }

    #[test]
    fn prune_expired_removes_exactly_the_stale_entries() {
        let pool = SparseBlobPool::new(1).unwrap();
        pool.add_blob(hash_with_prefix(0), vec![1], 5, 0);
        pool.add_blob(hash_with_prefix(1), vec![2], 15, 0);
        let pruned = pool.prune_expired(10);
        assert_eq!(pruned, 1);
        assert!(pool.get_blob(&hash_with_prefix(0)).is_none());
        assert!(pool.get_blob(&hash_with_prefix(1)).is_some());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Over a large stream of distinct random hashes, the stored fraction
        /// should sit within a sensible margin of `1/sparsity`.
        #[test]
        fn stored_fraction_tracks_one_over_sparsity(sparsity in 2u64..16, seed in any::<u64>()) {
            let pool = SparseBlobPool::new(sparsity).unwrap();
            const N: u64 = 20_000;
            for i in 0..N {
                let mut bytes = [0u8; 32];
                let prefix = i.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(seed);
                bytes[0..8].copy_from_slice(&prefix.to_be_bytes());
                pool.add_blob(Hash32::from(bytes), vec![0], 0, 0);
            }
            let observed = pool.counters().stored as f64 / N as f64;
            let expected = 1.0 / sparsity as f64;
            prop_assert!((observed - expected).abs() < 0.05, "observed {observed} vs expected {expected}");
        }
    }
}
