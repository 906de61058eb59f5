use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use tracing::debug;

use crate::cell::{validate_cell, DataCell};
use crate::{ColumnError, Result};

/// Result of validating a batch of cells: per-index errors, rest implicitly
/// valid.
#[derive(Debug, Clone, Default)]
pub struct BatchValidationReport {
    pub valid_count: usize,
    pub invalid_count: usize,
    pub errors: BTreeMap<usize, ColumnError>,
}

/// Validates every cell in `cells`. Duplicate `(column_index, row_index)`
/// pairs are invalid. When `parallel` is set, validation is distributed
/// over rayon's pool; error ordering by input index is preserved either way.
pub fn validate_batch(cells: &[DataCell], parallel: bool) -> Result<BatchValidationReport> {
    if cells.is_empty() {
        return Err(ColumnError::EmptyBatch);
    }

    let mut seen = HashSet::with_capacity(cells.len());
    let mut duplicate_at: HashSet<usize> = HashSet::new();
    for (i, cell) in cells.iter().enumerate() {
        if !seen.insert((cell.column_index, cell.row_index)) {
            duplicate_at.insert(i);
        }
    }

    let validate_one = |i: usize, cell: &DataCell| -> (usize, Option<ColumnError>) {
        if duplicate_at.contains(&i) {
            return (i, Some(ColumnError::DuplicateCell));
        }
        match validate_cell(cell) {
            Ok(()) => (i, None),
            Err(e) => (i, Some(e)),
        }
    };

    let results: Vec<(usize, Option<ColumnError>)> = if parallel {
        cells
            .par_iter()
            .enumerate()
            .map(|(i, c)| validate_one(i, c))
            .collect()
    } else {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| validate_one(i, c))
            .collect()
    };

    let mut report = BatchValidationReport::default();
    for (i, err) in results {
        match err {
            Some(e) => {
                report.invalid_count += 1;
                report.errors.insert(i, e);
            }
            None => report.valid_count += 1,
        }
    }
    debug!(
        valid = report.valid_count,
        invalid = report.invalid_count,
        "batch validation complete"
    );
    Ok(report)
}
