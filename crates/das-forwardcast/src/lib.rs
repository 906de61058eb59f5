//! Forward-cast announcement register (C8): pre-commits to future blobs by
//! `(slot, blob_index)`, fulfills them against a keccak256 commitment, and
//! prunes expired announcements.

use std::collections::HashMap;

use das_crypto::forward_cast_commitment;
use das_types::Hash32;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ForwardCastError {
    #[error("commitment must be nonzero")]
    ZeroCommitment,
    #[error("slot {slot} is not after current slot {current_slot}")]
    SlotNotInFuture { slot: u64, current_slot: u64 },
    #[error("slot {0} is beyond the maximum lead window")]
    TooFarAhead(u64),
    #[error("slot {0} already has the maximum number of announcements")]
    SlotFull(u64),
    #[error("announcement is already fulfilled")]
    AlreadyFulfilled,
    #[error("announcement has expired")]
    Expired,
    #[error("blob data exceeds the maximum size")]
    TooLarge,
    #[error("blob data does not match the announced commitment")]
    CommitmentMismatch,
    #[error("no announcement for (slot {0}, blob_index {1})")]
    NotFound(u64, u64),
}

pub type Result<T> = std::result::Result<T, ForwardCastError>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForwardCastConfig {
    pub max_lead_slots: u64,
    pub max_announcements_per_slot: usize,
    pub max_blob_data_size: usize,
}

impl Default for ForwardCastConfig {
    fn default() -> Self {
        Self {
            max_lead_slots: 32,
            max_announcements_per_slot: das_types::MAX_BLOB_COMMITMENTS_PER_BLOCK,
            max_blob_data_size: das_types::DEFAULT_BLOB_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub slot: u64,
    pub blob_index: u64,
    pub commitment: Hash32,
    pub expiry: u64,
    pub announcer: Hash32,
    pub fulfilled: bool,
    pub blob_data: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FulfillmentReport {
    pub total: usize,
    pub fulfilled: usize,
    pub missing: usize,
    pub missing_blob_indices: Vec<u64>,
}

struct State {
    announcements: HashMap<(u64, u64), Announcement>,
    by_slot: HashMap<u64, Vec<u64>>,
    current_slot: u64,
}

/// One register per node; `current_slot` advances via [`ForwardCastRegister::advance_to`].
pub struct ForwardCastRegister {
    config: ForwardCastConfig,
    state: RwLock<State>,
}

impl ForwardCastRegister {
    pub fn new(config: ForwardCastConfig, current_slot: u64) -> Self {
        Self {
            config,
            state: RwLock::new(State {
                announcements: HashMap::new(),
                by_slot: HashMap::new(),
                current_slot,
            }),
        }
    }

    pub fn advance_to(&self, slot: u64) {
        self.state.write().current_slot = slot;
    }

    pub fn current_slot(&self) -> u64 {
        self.state.read().current_slot
    }

    /// A repeated `(slot, blob_index)` replaces the previous announcement
    /// and clears any prior fulfillment, per the `[SUPPLEMENT]` rule that
    /// re-announcing does not count against the per-slot cap.
    pub fn announce_blob(
        &self,
        slot: u64,
        blob_index: u64,
        commitment: Hash32,
        announcer: Hash32,
    ) -> Result<()> {
        if commitment == Hash32::zero() {
            return Err(ForwardCastError::ZeroCommitment);
        }
        let mut state = self.state.write();
        if slot <= state.current_slot {
            return Err(ForwardCastError::SlotNotInFuture {
                slot,
                current_slot: state.current_slot,
            });
        }
        if slot > state.current_slot + self.config.max_lead_slots {
            return Err(ForwardCastError::TooFarAhead(slot));
        }

        let key = (slot, blob_index);
        let is_replacement = state.announcements.contains_key(&key);
        if !is_replacement {
            let count = state.by_slot.get(&slot).map(Vec::len).unwrap_or(0);
            if count >= self.config.max_announcements_per_slot {
                return Err(ForwardCastError::SlotFull(slot));
            }
        }

        let expiry = slot + self.config.max_lead_slots;
        state.announcements.insert(
            key,
            Announcement {
                slot,
                blob_index,
                commitment,
                expiry,
                announcer,
                fulfilled: false,
                blob_data: None,
            },
        );
        if !is_replacement {
            state.by_slot.entry(slot).or_default().push(blob_index);
        }
        debug!(slot, blob_index, "blob announced");
        Ok(())
    }

    /// Fulfills the `(slot, blob_index)` announcement with `blob_data`.
    pub fn fulfill(&self, slot: u64, blob_index: u64, blob_data: Vec<u8>) -> Result<()> {
        let mut state = self.state.write();
        let current_slot = state.current_slot;
        let max_size = self.config.max_blob_data_size;
        let announcement = state
            .announcements
            .get_mut(&(slot, blob_index))
            .ok_or(ForwardCastError::NotFound(slot, blob_index))?;

        if announcement.fulfilled {
            return Err(ForwardCastError::AlreadyFulfilled);
        }
        if announcement.expiry <= current_slot {
            return Err(ForwardCastError::Expired);
        }
        if blob_data.len() > max_size {
            return Err(ForwardCastError::TooLarge);
        }
        if forward_cast_commitment(&blob_data) != announcement.commitment {
            return Err(ForwardCastError::CommitmentMismatch);
        }

        announcement.blob_data = Some(blob_data);
        announcement.fulfilled = true;
        Ok(())
    }

    pub fn get(&self, slot: u64, blob_index: u64) -> Option<Announcement> {
        self.state.read().announcements.get(&(slot, blob_index)).cloned()
    }

    /// `{total, fulfilled, missing, missing_blob_indices}` for `slot`.
    pub fn check_fulfillment(&self, slot: u64) -> FulfillmentReport {
        let state = self.state.read();
        let indices = state.by_slot.get(&slot).cloned().unwrap_or_default();
        let mut report = FulfillmentReport {
            total: indices.len(),
            ..Default::default()
        };
        for idx in indices {
            match state.announcements.get(&(slot, idx)) {
                Some(a) if a.fulfilled => report.fulfilled += 1,
                _ => {
                    report.missing += 1;
                    report.missing_blob_indices.push(idx);
                }
            }
        }
        report.missing_blob_indices.sort_unstable();
        report
    }

    /// Deletes announcements with `expiry <= current_slot`.
    pub fn prune_expired(&self) -> usize {
        let mut state = self.state.write();
        let current_slot = state.current_slot;
        let expired: Vec<(u64, u64)> = state
            .announcements
            .iter()
            .filter(|(_, a)| a.expiry <= current_slot)
            .map(|(k, _)| *k)
            .collect();
        for key in &expired {
            state.announcements.remove(key);
            if let Some(list) = state.by_slot.get_mut(&key.0) {
                list.retain(|idx| *idx != key.1);
            }
        }
        expired.len()
    }
}
