//! Custody manager (C5): deterministic per-epoch column assignment and
//! rotation, plus a bounded record of which `(epoch, slot, column)` data the
//! node has stored for the columns it currently custodies.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use das_crypto::{custody_group_digest, u64_le_mod};
use das_types::NUMBER_OF_CUSTODY_GROUPS;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("epoch must be >= 1")]
    EpochZero,
    #[error("custody manager is closed")]
    Closed,
    #[error("data already stored for (epoch {epoch}, slot {slot}, column {column})")]
    AlreadyStored { epoch: u64, slot: u64, column: u64 },
    #[error("column {0} is not in the current custody set")]
    ColumnNotInCustody(u64),
    #[error("manager has not been initialized")]
    Uninitialized,
}

pub type Result<T> = std::result::Result<T, CustodyError>;

/// `get_custody_columns(node_id, custody_requirement)` — bit-exact per §6.
///
/// Hashes `node_id || LE_u64(i)` for `i = 0, 1, ...`, reduces the first 8
/// bytes mod `NUMBER_OF_CUSTODY_GROUPS` to propose a group, and accumulates
/// distinct groups (one column per group at default parameters) until
/// `custody_requirement` columns have been collected. An oversized
/// `custody_requirement` is clamped to `NUMBER_OF_CUSTODY_GROUPS` rather than
/// rejected (open question resolved in favor of clamp-and-return, per
/// spec.md §9).
pub fn get_custody_columns(node_id: &[u8], custody_requirement: usize) -> Vec<u64> {
    let requirement = custody_requirement.min(NUMBER_OF_CUSTODY_GROUPS as usize);
    let mut columns: BTreeSet<u64> = BTreeSet::new();
    let mut groups_seen: HashSet<u64> = HashSet::new();
    let mut i = 0u64;
    while columns.len() < requirement {
        let digest = custody_group_digest(node_id, i);
        let group = u64_le_mod(&digest, NUMBER_OF_CUSTODY_GROUPS);
        if groups_seen.insert(group) {
            columns.insert(group);
        }
        i += 1;
        debug_assert!(
            i < NUMBER_OF_CUSTODY_GROUPS * 1_000,
            "custody group search did not converge"
        );
    }
    columns.into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyConfig {
    pub custody_requirement: usize,
    pub retention_epochs: u64,
    pub max_tracked_slots: usize,
    pub max_rotation_history: usize,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            custody_requirement: das_types::CUSTODY_REQUIREMENT,
            retention_epochs: 4,
            max_tracked_slots: 4096,
            max_rotation_history: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Uninitialized,
    Active,
    Closed,
}

/// `{complete, missing_columns}` for [`CustodyManager::check_slot_completeness`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessReport {
    pub complete: bool,
    pub missing_columns: Vec<u64>,
}

/// One rotation transition: `{from, to, added, dropped}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationEvent {
    pub from: u64,
    pub to: u64,
    pub added: Vec<u64>,
    pub dropped: Vec<u64>,
}

pub struct CustodyProofRequest {
    pub node_id: Vec<u8>,
    pub epoch: u64,
    pub column: u64,
    pub slot: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequestValidation {
    pub valid: bool,
    pub reason: Option<String>,
}

struct Inner {
    status: Status,
    current_epoch: u64,
    columns: Vec<u64>,
    groups: Vec<u64>,
    stored: HashMap<(u64, u64, u64), Vec<u8>>,
    tracked_slots: VecDeque<(u64, u64, u64)>,
    rotation_history: VecDeque<RotationEvent>,
}

/// One manager per node: `uninitialized -> active -> closed`.
pub struct CustodyManager {
    node_id: Vec<u8>,
    config: CustodyConfig,
    state: RwLock<Inner>,
}

impl CustodyManager {
    pub fn new(node_id: Vec<u8>, config: CustodyConfig) -> Self {
        Self {
            node_id,
            config,
            state: RwLock::new(Inner {
                status: Status::Uninitialized,
                current_epoch: 0,
                columns: Vec::new(),
                groups: Vec::new(),
                stored: HashMap::new(),
                tracked_slots: VecDeque::new(),
                rotation_history: VecDeque::new(),
            }),
        }
    }

    fn assignment_for(&self, epoch: u64) -> Vec<u64> {
        // Groups are keyed off (node_id, epoch) so assignment rotates with
        // the epoch rather than staying fixed for the node's lifetime.
        let mut keyed = self.node_id.clone();
        keyed.extend_from_slice(&epoch.to_le_bytes());
        get_custody_columns(&keyed, self.config.custody_requirement)
    }

    /// Transitions to `active`, computing the column/group assignment for
    /// `epoch`. Rejects `epoch == 0`.
    pub fn initialize(&self, epoch: u64) -> Result<()> {
        if epoch == 0 {
            return Err(CustodyError::EpochZero);
        }
        let columns = self.assignment_for(epoch);
        let groups = columns.clone(); // one column per group at defaults
        let mut state = self.state.write();
        state.status = Status::Active;
        state.current_epoch = epoch;
        state.columns = columns;
        state.groups = groups;
        info!(epoch, columns = state.columns.len(), "custody manager initialized");
        Ok(())
    }

    /// Computes the new assignment, records the diff against the current
    /// one, and evicts stored data older than `retention_epochs`.
    pub fn rotate_epoch(&self, new_epoch: u64) -> Result<RotationEvent> {
        if new_epoch == 0 {
            return Err(CustodyError::EpochZero);
        }
        let mut state = self.state.write();
        if state.status == Status::Closed {
            return Err(CustodyError::Closed);
        }
        if state.status == Status::Uninitialized {
            return Err(CustodyError::Uninitialized);
        }

        let old_epoch = state.current_epoch;
        let old_columns: BTreeSet<u64> = state.columns.iter().copied().collect();
        let new_columns_vec = self.assignment_for(new_epoch);
        let new_columns: BTreeSet<u64> = new_columns_vec.iter().copied().collect();

        let added: Vec<u64> = new_columns.difference(&old_columns).copied().collect();
        let dropped: Vec<u64> = old_columns.difference(&new_columns).copied().collect();

        let event = RotationEvent {
            from: old_epoch,
            to: new_epoch,
            added,
            dropped,
        };

        state.rotation_history.push_back(event.clone());
        while state.rotation_history.len() > self.config.max_rotation_history {
            state.rotation_history.pop_front();
        }

        state.current_epoch = new_epoch;
        state.columns = new_columns_vec;
        state.groups = state.columns.clone();

        let cutoff = new_epoch.saturating_sub(self.config.retention_epochs);
        state.stored.retain(|(epoch, _, _), _| *epoch >= cutoff);
        state.tracked_slots.retain(|(epoch, _, _)| *epoch >= cutoff);

        debug!(from = event.from, to = event.to, "custody epoch rotated");
        Ok(event)
    }

    /// Stores `data` for `(epoch, slot, column)` iff `column` is in the
    /// current custody set and no data is already stored for that key.
    pub fn record_column(&self, epoch: u64, slot: u64, column: u64, data: Vec<u8>) -> Result<()> {
        let mut state = self.state.write();
        match state.status {
            Status::Closed => return Err(CustodyError::Closed),
            Status::Uninitialized => return Err(CustodyError::Uninitialized),
            Status::Active => {}
        }
        if !state.columns.binary_search(&column).is_ok() {
            return Err(CustodyError::ColumnNotInCustody(column));
        }
        let key = (epoch, slot, column);
        if state.stored.contains_key(&key) {
            return Err(CustodyError::AlreadyStored { epoch, slot, column });
        }
        state.stored.insert(key, data);
        state.tracked_slots.push_back(key);
        if state.tracked_slots.len() > self.config.max_tracked_slots {
            if let Some(evicted) = state.tracked_slots.pop_front() {
                state.stored.remove(&evicted);
            }
        }
        Ok(())
    }

    /// `{complete, missing_columns}`: complete iff every current custody
    /// column has a stored entry at `slot` in the current epoch.
    pub fn check_slot_completeness(&self, slot: u64) -> CompletenessReport {
        let state = self.state.read();
        let epoch = state.current_epoch;
        let missing: Vec<u64> = state
            .columns
            .iter()
            .copied()
            .filter(|&c| !state.stored.contains_key(&(epoch, slot, c)))
            .collect();
        CompletenessReport {
            complete: missing.is_empty(),
            missing_columns: missing,
        }
    }

    /// Validates a proof request against this node's stored data.
    pub fn validate_custody_proof_request(
        &self,
        request: &CustodyProofRequest,
    ) -> ProofRequestValidation {
        if request.epoch == 0 {
            return ProofRequestValidation {
                valid: false,
                reason: Some("epoch-zero".to_string()),
            };
        }
        let state = self.state.read();
        if state.status == Status::Closed {
            return ProofRequestValidation {
                valid: false,
                reason: Some("closed".to_string()),
            };
        }
        let key = (request.epoch, request.slot, request.column);
        if state.stored.contains_key(&key) {
            ProofRequestValidation {
                valid: true,
                reason: None,
            }
        } else {
            ProofRequestValidation {
                valid: false,
                reason: Some("missing data".to_string()),
            }
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.state.read().current_epoch
    }

    pub fn columns(&self) -> Vec<u64> {
        self.state.read().columns.clone()
    }

    pub fn groups(&self) -> Vec<u64> {
        self.state.read().groups.clone()
    }

    pub fn rotation_history(&self) -> Vec<RotationEvent> {
        self.state.read().rotation_history.iter().cloned().collect()
    }

    pub fn close(&self) {
        let mut state = self.state.write();
        state.status = Status::Closed;
        info!("custody manager closed");
    }
}
