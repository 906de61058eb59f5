//! Sample-size optimizer (C10): confidence math and adaptive sizing used by
//! the scheduler and its callers.

use das_types::NUMBER_OF_COLUMNS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub min_samples: usize,
    pub max_samples: usize,
    pub security_margin: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            min_samples: 1,
            max_samples: NUMBER_OF_COLUMNS as usize,
            security_margin: 2,
        }
    }
}

fn clamp(value: usize, min: usize, max: usize) -> usize {
    value.clamp(min, max)
}

/// Confidence that at least one of `k` independently sampled columns out of
/// `n` would have caught unavailability: `1 - ((n-1)/n)^k`.
pub fn confidence(n: u64, k: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let base = (n as f64 - 1.0) / n as f64;
    1.0 - base.powi(k as i32)
}

/// Minimum sample count `k` to reach `security_bits` of confidence against
/// `n` columns: `ceil(s * ln2 / ln(n/(n-1))) + security_margin`, clamped.
pub fn min_samples_for_security(n: u64, security_bits: f64, config: &OptimizerConfig) -> usize {
    if n <= 1 {
        return clamp(config.min_samples, config.min_samples, config.max_samples);
    }
    let ratio = n as f64 / (n as f64 - 1.0);
    let raw = (security_bits * std::f64::consts::LN_2 / ratio.ln()).ceil() as i64;
    let with_margin = raw.max(0) as usize + config.security_margin;
    clamp(with_margin, config.min_samples, config.max_samples)
}

/// Scales the base minimum sample count by `2 - network_health`: lower
/// health implies a larger sample size is needed for the same confidence.
/// `blob_count` is carried for callers' logging/accounting; the per-blob
/// sample size itself does not grow with it.
pub fn adaptive_sampling(
    blob_count: u64,
    network_health: f64,
    security_bits: f64,
    config: &OptimizerConfig,
) -> usize {
    let health = network_health.clamp(0.0, 1.0);
    let base = min_samples_for_security(NUMBER_OF_COLUMNS, security_bits, config);
    let scaled = (base as f64 * (2.0 - health)).ceil() as usize;
    tracing::debug!(blob_count, health, scaled, "adaptive sample size computed");
    clamp(scaled, config.min_samples, config.max_samples)
}

/// Hysteresis-based adjustment: grows when `failure_rate > 0.2`, shrinks
/// when `failure_rate < 0.05`, otherwise unchanged.
pub fn adjust_sample_size(current: usize, failure_rate: f64, config: &OptimizerConfig) -> usize {
    let adjusted = if failure_rate > 0.2 {
        (current as f64 * (1.0 + failure_rate)).ceil() as usize
    } else if failure_rate < 0.05 {
        (current as f64 * 0.9).floor() as usize
    } else {
        current
    };
    clamp(adjusted, config.min_samples, config.max_samples)
}

/// Estimated bytes of network load to serve `blobs` at `samples_per_blob`
/// each, accounting for cell payload plus a fixed per-sample proof overhead.
pub fn estimate_network_load(blobs: u64, samples_per_blob: u64) -> u64 {
    const PROOF_OVERHEAD_BYTES: u64 = 48;
    blobs * samples_per_blob * (das_types::CELL_BYTES as u64 + PROOF_OVERHEAD_BYTES)
}
