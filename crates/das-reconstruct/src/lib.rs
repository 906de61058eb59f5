//! Blob reconstructor (C4): ingests per-cell samples, detects quorum, and
//! delegates to the GF(2^16) field (C1) and Reed-Solomon codec (C2) to
//! rebuild an extended blob from any `RECONSTRUCTION_THRESHOLD` of its
//! cells.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use das_codec::ReedSolomon;
use das_columns::Sample;
use das_types::{CELLS_PER_EXT_BLOB, RECONSTRUCTION_THRESHOLD};
use parking_lot::RwLock;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconstructError {
    #[error("blob index {0} is out of range")]
    BlobIndexOutOfRange(u64),
    #[error("cell index {index} is out of range for {total_cells} total cells")]
    CellIndexOutOfRange { index: u64, total_cells: usize },
    #[error("need at least {required} unique cells, got {got}")]
    InsufficientCells { required: usize, got: usize },
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<das_codec::CodecError> for ReconstructError {
    fn from(e: das_codec::CodecError) -> Self {
        ReconstructError::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconstructError>;

/// Running counters, reset only by [`BlobReconstructor::reset`].
#[derive(Debug, Default)]
pub struct ReconstructMetrics {
    pub success: AtomicU64,
    pub failure: AtomicU64,
    pub insufficient: AtomicU64,
    pub total_latency_micros: AtomicU64,
    pub last_latency_micros: AtomicU64,
    pub blobs_reconstructed: AtomicU64,
}

impl ReconstructMetrics {
    fn record(&self, elapsed_micros: u64, ok: bool, insufficient: bool) {
        if insufficient {
            self.insufficient.fetch_add(1, Ordering::Relaxed);
        } else if ok {
            self.success.fetch_add(1, Ordering::Relaxed);
            self.blobs_reconstructed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_micros
            .fetch_add(elapsed_micros, Ordering::Relaxed);
        self.last_latency_micros
            .store(elapsed_micros, Ordering::Relaxed);
    }
}

/// Validates that `samples` carries at least `RECONSTRUCTION_THRESHOLD`
/// distinct cell indices.
pub fn validate_reconstruction_input(samples: &[Sample]) -> Result<()> {
    let unique: std::collections::HashSet<u64> = samples.iter().map(|s| s.cell_index).collect();
    if unique.len() < RECONSTRUCTION_THRESHOLD {
        return Err(ReconstructError::InsufficientCells {
            required: RECONSTRUCTION_THRESHOLD,
            got: unique.len(),
        });
    }
    Ok(())
}

fn dedup_by_cell_index(samples: &[Sample]) -> Vec<(usize, Vec<u8>)> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for s in samples {
        if seen.insert(s.cell_index) {
            out.push((s.cell_index as usize, s.data.as_slice().to_vec()));
        }
    }
    out
}

/// Reconstructs the full extended blob (`total_cells` cells, concatenated)
/// from any `>= RECONSTRUCTION_THRESHOLD` distinct-index samples, via
/// Lagrange interpolation at evaluation points `g^{cell_index}` (C1) framed
/// as a Reed-Solomon recovery with `k = RECONSTRUCTION_THRESHOLD` (C2).
pub fn reconstruct(samples: &[Sample], total_cells: usize) -> Result<Vec<u8>> {
    for sample in samples {
        if sample.cell_index as usize >= total_cells {
            return Err(ReconstructError::CellIndexOutOfRange {
                index: sample.cell_index,
                total_cells,
            });
        }
    }
    let deduped = dedup_by_cell_index(samples);
    if deduped.len() < RECONSTRUCTION_THRESHOLD {
        return Err(ReconstructError::InsufficientCells {
            required: RECONSTRUCTION_THRESHOLD,
            got: deduped.len(),
        });
    }
    let parity = total_cells.saturating_sub(RECONSTRUCTION_THRESHOLD);
    let codec = ReedSolomon::new(RECONSTRUCTION_THRESHOLD, parity)?;
    let recovered = codec.recover(&deduped)?;
    Ok(recovered.into_iter().flatten().collect())
}

/// In-memory map `blob_index -> samples`, with ingestion, quorum detection,
/// and parallel per-blob reconstruction.
pub struct BlobReconstructor {
    max_blobs: u64,
    pending: RwLock<HashMap<u64, Vec<Sample>>>,
    pub metrics: ReconstructMetrics,
}

impl BlobReconstructor {
    pub fn new(max_blobs: u64) -> Self {
        Self {
            max_blobs,
            pending: RwLock::new(HashMap::new()),
            metrics: ReconstructMetrics::default(),
        }
    }

    /// Adds a sample, deduplicating by `cell_index` within the blob (first
    /// wins; later duplicates are silently dropped).
    pub fn add_sample(&self, sample: Sample) -> Result<()> {
        if sample.blob_index >= self.max_blobs {
            return Err(ReconstructError::BlobIndexOutOfRange(sample.blob_index));
        }
        if sample.cell_index as usize >= CELLS_PER_EXT_BLOB {
            return Err(ReconstructError::CellIndexOutOfRange {
                index: sample.cell_index,
                total_cells: CELLS_PER_EXT_BLOB,
            });
        }
        let mut pending = self.pending.write();
        let entry = pending.entry(sample.blob_index).or_default();
        if entry.iter().any(|s| s.cell_index == sample.cell_index) {
            debug!(
                blob_index = sample.blob_index,
                cell_index = sample.cell_index,
                "dropping duplicate sample"
            );
            return Ok(());
        }
        entry.push(sample);
        Ok(())
    }

    pub fn pending_count(&self, blob_index: u64) -> usize {
        self.pending
            .read()
            .get(&blob_index)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Reconstructs `blob_index` from its currently pending samples.
    pub fn reconstruct_one(&self, blob_index: u64, total_cells: usize) -> Result<Vec<u8>> {
        let samples = self
            .pending
            .read()
            .get(&blob_index)
            .cloned()
            .unwrap_or_default();
        let start = Instant::now();
        let result = reconstruct(&samples, total_cells);
        let elapsed = start.elapsed().as_micros() as u64;
        match &result {
            Ok(_) => self.metrics.record(elapsed, true, false),
            Err(ReconstructError::InsufficientCells { .. }) => {
                self.metrics.record(elapsed, false, true);
                warn!(blob_index, "insufficient cells for reconstruction");
            }
            Err(_) => self.metrics.record(elapsed, false, false),
        }
        result
    }

    /// Snapshots pending samples and reconstructs every blob (up to
    /// `blob_count`) whose samples meet the threshold, in parallel. Returns
    /// the successful reconstructions and the first error encountered, if
    /// any.
    pub fn reconstruct_blobs(
        &self,
        blob_count: u64,
        total_cells: usize,
    ) -> (HashMap<u64, Vec<u8>>, Option<ReconstructError>) {
        let snapshot: Vec<(u64, Vec<Sample>)> = {
            let pending = self.pending.read();
            (0..blob_count)
                .filter_map(|idx| pending.get(&idx).map(|s| (idx, s.clone())))
                .collect()
        };

        let results: Vec<(u64, Result<Vec<u8>>)> = snapshot
            .into_par_iter()
            .map(|(idx, samples)| {
                let start = Instant::now();
                let result = reconstruct(&samples, total_cells);
                let elapsed = start.elapsed().as_micros() as u64;
                match &result {
                    Ok(_) => self.metrics.record(elapsed, true, false),
                    Err(ReconstructError::InsufficientCells { .. }) => {
                        self.metrics.record(elapsed, false, true)
                    }
                    Err(_) => self.metrics.record(elapsed, false, false),
                }
                (idx, result)
            })
            .collect();

        let mut ok = HashMap::new();
        let mut first_err = None;
        for (idx, result) in results {
            match result {
                Ok(bytes) => {
                    ok.insert(idx, bytes);
                }
                Err(e) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
            }
        }
        info!(reconstructed = ok.len(), "reconstruct_blobs complete");
        (ok, first_err)
    }

    /// Clears pending samples for blobs present in `reconstructed`.
    pub fn reconstruct_pending(&self, reconstructed: &HashMap<u64, Vec<u8>>) {
        let mut pending = self.pending.write();
        for idx in reconstructed.keys() {
            pending.remove(idx);
        }
    }

    pub fn reset(&self) {
        self.pending.write().clear();
    }
}

impl Default for BlobReconstructor {
    fn default() -> Self {
        Self::new(das_types::MAX_BLOB_COMMITMENTS_PER_BLOCK as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use das_columns::Cell;
    use das_field::gf;
    use das_types::CELL_BYTES;

    /// Builds `total_cells` ground-truth cells by evaluating a random-ish
    /// degree-<threshold polynomial (one per symbol column) at `g^i`.
    fn ground_truth_blob(total_cells: usize) -> Vec<Vec<u8>> {
        let symbol_count = CELL_BYTES / 2;
        let mut cells = vec![vec![0u8; CELL_BYTES]; total_cells];
        for sym in 0..symbol_count {
            let coeffs: Vec<u16> = (0..RECONSTRUCTION_THRESHOLD)
                .map(|c| ((sym * 7 + c * 13 + 1) % 65535) as u16)
                .collect();
            for i in 0..total_cells {
                let x = gf::pow(2, i as i64);
                let y = gf::poly::eval(&coeffs, x);
                let bytes = y.to_be_bytes();
                cells[i][sym * 2] = bytes[0];
                cells[i][sym * 2 + 1] = bytes[1];
            }
        }
        cells
    }

    fn samples_from(cells: &[Vec<u8>], blob_index: u64, indices: &[usize]) -> Vec<Sample> {
        indices
            .iter()
            .map(|&i| Sample {
                blob_index,
                cell_index: i as u64,
                data: Cell::new(cells[i].clone()).unwrap(),
            })
            .collect()
    }

    #[test]
    fn reconstructs_from_exactly_threshold_samples() {
        let cells = ground_truth_blob(CELLS_PER_EXT_BLOB);
        let indices: Vec<usize> = (0..RECONSTRUCTION_THRESHOLD).collect();
        let samples = samples_from(&cells, 0, &indices);
        let reconstructed = reconstruct(&samples, CELLS_PER_EXT_BLOB).unwrap();
        let expected: Vec<u8> = cells.into_iter().flatten().collect();
        assert_eq!(reconstructed, expected);
    }

    #[test]
    fn reconstructs_from_an_arbitrary_threshold_subset() {
        let cells = ground_truth_blob(CELLS_PER_EXT_BLOB);
        let indices: Vec<usize> = (0..CELLS_PER_EXT_BLOB).step_by(2).collect();
        assert!(indices.len() >= RECONSTRUCTION_THRESHOLD);
        let samples = samples_from(&cells, 0, &indices[..RECONSTRUCTION_THRESHOLD]);
        let reconstructed = reconstruct(&samples, CELLS_PER_EXT_BLOB).unwrap();
        let expected: Vec<u8> = cells.into_iter().flatten().collect();
        assert_eq!(reconstructed, expected);
    }

    #[test]
    fn fewer_than_threshold_samples_fails_insufficient() {
        let cells = ground_truth_blob(CELLS_PER_EXT_BLOB);
        let indices: Vec<usize> = (0..RECONSTRUCTION_THRESHOLD - 1).collect();
        let samples = samples_from(&cells, 0, &indices);
        assert!(matches!(
            reconstruct(&samples, CELLS_PER_EXT_BLOB),
            Err(ReconstructError::InsufficientCells { .. })
        ));
    }

    #[test]
    fn add_sample_dedups_by_cell_index_first_wins() {
        let reconstructor = BlobReconstructor::new(9);
        let first = Cell::new(vec![1u8; CELL_BYTES]).unwrap();
        let second = Cell::new(vec![2u8; CELL_BYTES]).unwrap();
        reconstructor
            .add_sample(Sample {
                blob_index: 0,
                cell_index: 3,
                data: first.clone(),
            })
            .unwrap();
        reconstructor
            .add_sample(Sample {
                blob_index: 0,
                cell_index: 3,
                data: second,
            })
            .unwrap();
        assert_eq!(reconstructor.pending_count(0), 1);
    }

    #[test]
    fn add_sample_rejects_out_of_range_blob_index() {
        let reconstructor = BlobReconstructor::new(2);
        let cell = Cell::new(vec![1u8; CELL_BYTES]).unwrap();
        let err = reconstructor.add_sample(Sample {
            blob_index: 5,
            cell_index: 0,
            data: cell,
        });
        assert_eq!(err, Err(ReconstructError::BlobIndexOutOfRange(5)));
    }

    #[test]
    fn add_sample_rejects_out_of_range_cell_index() {
        let reconstructor = BlobReconstructor::new(2);
        let cell = Cell::new(vec![1u8; CELL_BYTES]).unwrap();
        let err = reconstructor.add_sample(Sample {
            blob_index: 0,
            cell_index: 9999,
            data: cell,
        });
        assert_eq!(
            err,
            Err(ReconstructError::CellIndexOutOfRange {
                index: 9999,
                total_cells: CELLS_PER_EXT_BLOB,
            })
        );
    }

    #[test]
    fn reconstruct_rejects_out_of_range_cell_index_instead_of_panicking() {
        let cells = ground_truth_blob(CELLS_PER_EXT_BLOB);
        let mut samples = samples_from(&cells, 0, &(0..RECONSTRUCTION_THRESHOLD - 1).collect::<Vec<_>>());
        samples.push(Sample {
            blob_index: 0,
            cell_index: 9999,
            data: Cell::new(cells[0].clone()).unwrap(),
        });
        assert_eq!(
            reconstruct(&samples, CELLS_PER_EXT_BLOB),
            Err(ReconstructError::CellIndexOutOfRange {
                index: 9999,
                total_cells: CELLS_PER_EXT_BLOB,
            })
        );
    }

    #[test]
    fn reconstruct_blobs_collects_successes_and_reports_metrics() {
        let reconstructor = BlobReconstructor::new(2);
        let cells = ground_truth_blob(CELLS_PER_EXT_BLOB);
        for i in 0..RECONSTRUCTION_THRESHOLD {
            reconstructor
                .add_sample(Sample {
                    blob_index: 0,
                    cell_index: i as u64,
                    data: Cell::new(cells[i].clone()).unwrap(),
                })
                .unwrap();
        }
        let (ok, err) = reconstructor.reconstruct_blobs(2, CELLS_PER_EXT_BLOB);
        assert!(err.is_none());
        assert_eq!(ok.len(), 1);
        assert_eq!(
            reconstructor.metrics.success.load(Ordering::Relaxed),
            1
        );
        reconstructor.reconstruct_pending(&ok);
        assert_eq!(reconstructor.pending_count(0), 0);
    }
}
