//! Reconstruction trigger: per-blob tally of observed column indices that
//! fires exactly once when a blob newly crosses `RECONSTRUCTION_THRESHOLD`.

use std::collections::{HashMap, HashSet};

use das_types::RECONSTRUCTION_THRESHOLD;
use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct BlobState {
    columns: HashSet<u64>,
    reconstructed: bool,
}

#[derive(Default)]
struct State {
    blobs: HashMap<u64, BlobState>,
}

pub struct ReconstructionTrigger {
    threshold: usize,
    state: RwLock<State>,
}

impl ReconstructionTrigger {
    pub fn new() -> Self {
        Self::with_threshold(RECONSTRUCTION_THRESHOLD)
    }

    pub fn with_threshold(threshold: usize) -> Self {
        Self {
            threshold,
            state: RwLock::new(State::default()),
        }
    }

    /// Returns `true` exactly when `blob_index` newly crosses the threshold
    /// and has not already been marked reconstructed.
    pub fn record_column(&self, blob_index: u64, column_index: u64) -> bool {
        let mut state = self.state.write();
        let entry = state.blobs.entry(blob_index).or_default();
        if entry.reconstructed {
            entry.columns.insert(column_index);
            return false;
        }
        let was_below = entry.columns.len() < self.threshold;
        entry.columns.insert(column_index);
        let now_at_or_above = entry.columns.len() >= self.threshold;
        let fired = was_below && now_at_or_above;
        if fired {
            tracing::info!(blob_index, threshold = self.threshold, "blob crossed reconstruction threshold");
        }
        fired
    }

    pub fn mark_reconstructed(&self, blob_index: u64) {
        let mut state = self.state.write();
        state.blobs.entry(blob_index).or_default().reconstructed = true;
    }

    /// Blob indices that have crossed the threshold, sorted ascending.
    pub fn ready_blobs(&self) -> Vec<u64> {
        let state = self.state.read();
        let mut ready: Vec<u64> = state
            .blobs
            .iter()
            .filter(|(_, b)| b.columns.len() >= self.threshold && !b.reconstructed)
            .map(|(idx, _)| *idx)
            .collect();
        ready.sort_unstable();
        ready
    }

    pub fn column_count(&self, blob_index: u64) -> usize {
        self.state
            .read()
            .blobs
            .get(&blob_index)
            .map(|b| b.columns.len())
            .unwrap_or(0)
    }

    pub fn reset(&self) {
        self.state.write().blobs.clear();
    }
}

impl Default for ReconstructionTrigger {
    fn default() -> Self {
        Self::new()
    }
}
