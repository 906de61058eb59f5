//! Sampling scheduler (C6): one `SamplingRound` per slot, deterministic
//! target selection, quota accounting, and the adaptive-rate controller.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use das_crypto::{scheduler_candidate, scheduler_seed, u64_le_mod};
use das_types::NUMBER_OF_COLUMNS;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("slot must be >= 1")]
    SlotZero,
    #[error("scheduler is closed")]
    Closed,
    #[error("no active round for slot {0}")]
    NoActiveRound(u64),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingMode {
    Regular,
    Extended,
}

/// Deterministic target selection, bit-exact per spec.md §6: hash
/// `(node_id, slot, "das/scheduler")` to a seed, then hash `seed || counter`
/// for `counter = 0, 1, ...`, reducing mod `NUMBER_OF_COLUMNS` and skipping
/// duplicates, until `count` distinct columns are collected.
pub fn select_targets(node_id: &[u8], slot: u64, count: usize) -> Vec<u64> {
    let target = count.min(NUMBER_OF_COLUMNS as usize);
    let seed = scheduler_seed(node_id, slot);
    let mut chosen: Vec<u64> = Vec::with_capacity(target);
    let mut seen: HashSet<u64> = HashSet::with_capacity(target);
    let mut counter = 0u64;
    while chosen.len() < target {
        let digest = scheduler_candidate(&seed, counter);
        let column = u64_le_mod(&digest, NUMBER_OF_COLUMNS);
        if seen.insert(column) {
            chosen.push(column);
        }
        counter += 1;
    }
    chosen.sort_unstable();
    chosen
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub base_samples: usize,
    pub max_concurrent_slots: usize,
    pub adaptive_min_rate: f64,
    pub adaptive_max_rate: f64,
    pub success_rate_threshold: f64,
    pub high_success_threshold: f64,
    pub max_completed_history: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_samples: das_types::SAMPLES_PER_SLOT,
            max_concurrent_slots: 32,
            adaptive_min_rate: 0.5,
            adaptive_max_rate: 4.0,
            success_rate_threshold: 0.5,
            high_success_threshold: 0.9,
            max_completed_history: 64,
        }
    }
}

/// Per-slot sampling attempt. Invariant: `success ∪ failed ⊆ sampled ⊆
/// target_columns` and `success ∩ failed = ∅`.
#[derive(Debug, Clone)]
pub struct SamplingRound {
    pub slot: u64,
    pub mode: SamplingMode,
    pub target_columns: Vec<u64>,
    pub sampled: HashSet<u64>,
    pub success: HashSet<u64>,
    pub failed: HashSet<u64>,
    pub quota: usize,
    pub complete: bool,
    pub started_at: Instant,
    pub completed_at: Option<Instant>,
}

impl SamplingRound {
    pub fn success_rate(&self) -> f64 {
        if self.sampled.is_empty() {
            return 0.0;
        }
        self.success.len() as f64 / self.sampled.len() as f64
    }

    pub fn unsampled_columns(&self) -> Vec<u64> {
        self.target_columns
            .iter()
            .copied()
            .filter(|c| !self.sampled.contains(c))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerStats {
    pub active_rounds: usize,
    pub completed_rounds: usize,
    pub overall_success_rate: f64,
    pub adaptive_rate: f64,
}

struct State {
    rounds: HashMap<u64, SamplingRound>,
    insertion_order: VecDeque<u64>,
    completed_history: VecDeque<(u64, f64)>,
    adaptive_rate: f64,
    closed: bool,
}

/// One scheduler per node.
pub struct SamplingScheduler {
    node_id: Vec<u8>,
    config: SchedulerConfig,
    state: RwLock<State>,
}

impl SamplingScheduler {
    pub fn new(node_id: Vec<u8>, config: SchedulerConfig) -> Self {
        let rate = 1.0f64.clamp(config.adaptive_min_rate, config.adaptive_max_rate);
        Self {
            node_id,
            config,
            state: RwLock::new(State {
                rounds: HashMap::new(),
                insertion_order: VecDeque::new(),
                completed_history: VecDeque::new(),
                adaptive_rate: rate,
                closed: false,
            }),
        }
    }

    fn target_count(&self, mode: SamplingMode, rate: f64) -> usize {
        let raw = match mode {
            SamplingMode::Regular => self.config.base_samples as f64 * rate,
            SamplingMode::Extended => 2.0 * self.config.base_samples as f64 * rate,
        };
        (raw.round() as i64).clamp(1, NUMBER_OF_COLUMNS as i64) as usize
    }

    /// Creates (or returns the existing) round for `slot`, evicting the
    /// oldest round if more than `max_concurrent_slots` are tracked.
    pub fn start_round(&self, slot: u64, mode: SamplingMode) -> Result<SamplingRound> {
        if slot == 0 {
            return Err(SchedulerError::SlotZero);
        }
        let mut state = self.state.write();
        if state.closed {
            return Err(SchedulerError::Closed);
        }
        if let Some(existing) = state.rounds.get(&slot) {
            return Ok(existing.clone());
        }

        let count = self.target_count(mode, state.adaptive_rate);
        let target_columns = select_targets(&self.node_id, slot, count);
        let round = SamplingRound {
            slot,
            mode,
            quota: target_columns.len(),
            target_columns,
            sampled: HashSet::new(),
            success: HashSet::new(),
            failed: HashSet::new(),
            complete: false,
            started_at: Instant::now(),
            completed_at: None,
        };
        state.rounds.insert(slot, round.clone());
        state.insertion_order.push_back(slot);
        while state.insertion_order.len() > self.config.max_concurrent_slots {
            if let Some(oldest) = state.insertion_order.pop_front() {
                state.rounds.remove(&oldest);
            }
        }
        debug!(slot, quota = round.quota, "sampling round started");
        Ok(round)
    }

    /// Records the outcome of sampling `column` in `slot`'s round.
    pub fn record_sample(&self, slot: u64, column: u64, success: bool) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(SchedulerError::Closed);
        }
        let became_complete = {
            let round = state
                .rounds
                .get_mut(&slot)
                .ok_or(SchedulerError::NoActiveRound(slot))?;
            if !round.complete {
                round.sampled.insert(column);
                if success {
                    round.success.insert(column);
                } else {
                    round.failed.insert(column);
                }
                round.quota = round.quota.saturating_sub(1);
                if round
                    .target_columns
                    .iter()
                    .all(|c| round.sampled.contains(c))
                {
                    round.complete = true;
                    round.completed_at = Some(Instant::now());
                }
            }
            round.complete
        };
        if became_complete {
            self.on_round_completed(&mut state, slot);
        }
        Ok(())
    }

    /// Forces `slot`'s round to complete, whatever its current sample count.
    pub fn complete_round(&self, slot: u64) -> Result<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(SchedulerError::Closed);
        }
        {
            let round = state
                .rounds
                .get_mut(&slot)
                .ok_or(SchedulerError::NoActiveRound(slot))?;
            if round.complete {
                return Ok(());
            }
            round.complete = true;
            round.completed_at = Some(Instant::now());
        }
        self.on_round_completed(&mut state, slot);
        Ok(())
    }

    fn on_round_completed(&self, state: &mut State, slot: u64) {
        let rate = state.rounds.get(&slot).map(|r| r.success_rate());
        if let Some(rate) = rate {
            state.completed_history.push_back((slot, rate));
            while state.completed_history.len() > self.config.max_completed_history {
                state.completed_history.pop_front();
            }
        }
        self.run_adaptive_controller(state);
    }

    fn run_adaptive_controller(&self, state: &mut State) {
        if state.completed_history.is_empty() {
            return;
        }
        let overall: f64 = state.completed_history.iter().map(|(_, r)| r).sum::<f64>()
            / state.completed_history.len() as f64;
        let mut rate = state.adaptive_rate;
        if overall < self.config.success_rate_threshold {
            rate *= 1.2;
        } else if overall > self.config.high_success_threshold {
            rate *= 0.9;
        }
        state.adaptive_rate = rate.clamp(self.config.adaptive_min_rate, self.config.adaptive_max_rate);
        info!(overall_success_rate = overall, new_rate = state.adaptive_rate, "adaptive rate updated");
    }

    pub fn set_adaptive_rate(&self, rate: f64) {
        let mut state = self.state.write();
        state.adaptive_rate = rate.clamp(self.config.adaptive_min_rate, self.config.adaptive_max_rate);
    }

    pub fn adaptive_rate(&self) -> f64 {
        self.state.read().adaptive_rate
    }

    pub fn remaining_quota(&self, slot: u64) -> Result<usize> {
        self.state
            .read()
            .rounds
            .get(&slot)
            .map(|r| r.quota)
            .ok_or(SchedulerError::NoActiveRound(slot))
    }

    pub fn round_success_rate(&self, slot: u64) -> Result<f64> {
        self.state
            .read()
            .rounds
            .get(&slot)
            .map(|r| r.success_rate())
            .ok_or(SchedulerError::NoActiveRound(slot))
    }

    pub fn unsampled_columns(&self, slot: u64) -> Result<Vec<u64>> {
        self.state
            .read()
            .rounds
            .get(&slot)
            .map(|r| r.unsampled_columns())
            .ok_or(SchedulerError::NoActiveRound(slot))
    }

    pub fn get_round(&self, slot: u64) -> Option<SamplingRound> {
        self.state.read().rounds.get(&slot).cloned()
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let state = self.state.read();
        let completed = state.rounds.values().filter(|r| r.complete).count();
        let overall = if state.completed_history.is_empty() {
            0.0
        } else {
            state.completed_history.iter().map(|(_, r)| r).sum::<f64>()
                / state.completed_history.len() as f64
        };
        SchedulerStats {
            active_rounds: state.rounds.len() - completed,
            completed_rounds: completed,
            overall_success_rate: overall,
            adaptive_rate: state.adaptive_rate,
        }
    }

    pub fn prune_completed(&self) {
        let mut state = self.state.write();
        let completed_slots: Vec<u64> = state
            .rounds
            .iter()
            .filter(|(_, r)| r.complete)
            .map(|(s, _)| *s)
            .collect();
        for slot in completed_slots {
            state.rounds.remove(&slot);
            state.insertion_order.retain(|s| *s != slot);
        }
    }

    pub fn close(&self) {
        self.state.write().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_selection_is_deterministic_across_schedulers() {
        let node_id = vec![0x18u8; 32];
        let a = select_targets(&node_id, 100, 8);
        let b = select_targets(&node_id, 100, 8);
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn start_round_rejects_slot_zero() {
        let scheduler = SamplingScheduler::new(vec![1u8; 32], SchedulerConfig::default());
        assert_eq!(
            scheduler.start_round(0, SamplingMode::Regular),
            Err(SchedulerError::SlotZero)
        );
    }

    #[test]
    fn start_round_is_idempotent() {
        let scheduler = SamplingScheduler::new(vec![1u8; 32], SchedulerConfig::default());
        let r1 = scheduler.start_round(5, SamplingMode::Regular).unwrap();
        let r2 = scheduler.start_round(5, SamplingMode::Regular).unwrap();
        assert_eq!(r1.target_columns, r2.target_columns);
    }

    #[test]
    fn recording_all_targets_completes_the_round() {
        let scheduler = SamplingScheduler::new(vec![2u8; 32], SchedulerConfig::default());
        let round = scheduler.start_round(10, SamplingMode::Regular).unwrap();
        for &column in &round.target_columns {
            scheduler.record_sample(10, column, true).unwrap();
        }
        assert!(scheduler.get_round(10).unwrap().complete);
    }

    #[test]
    fn low_success_rate_raises_adaptive_rate() {
        let scheduler = SamplingScheduler::new(vec![3u8; 32], SchedulerConfig::default());
        let before = scheduler.adaptive_rate();
        let round = scheduler.start_round(1, SamplingMode::Regular).unwrap();
        for &column in &round.target_columns {
            scheduler.record_sample(1, column, false).unwrap();
        }
        assert!(scheduler.adaptive_rate() >= before);
    }

    #[test]
    fn two_schedulers_with_same_config_agree_on_targets() {
        let node_id = vec![9u8; 32];
        let s1 = SamplingScheduler::new(node_id.clone(), SchedulerConfig::default());
        let s2 = SamplingScheduler::new(node_id, SchedulerConfig::default());
        let r1 = s1.start_round(42, SamplingMode::Regular).unwrap();
        let r2 = s2.start_round(42, SamplingMode::Regular).unwrap();
        assert_eq!(r1.target_columns, r2.target_columns);
    }
}
