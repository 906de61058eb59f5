use das_crypto::cell_proof;
use das_types::{Hash32, CELL_BYTES, MAX_BLOB_COMMITMENTS_PER_BLOCK, NUMBER_OF_COLUMNS};
use serde::{Deserialize, Serialize};

use crate::{ColumnError, Result};

/// A fixed-size byte chunk of an extended blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell(Vec<u8>);

impl Cell {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() != CELL_BYTES {
            return Err(ColumnError::InvalidCellSize {
                expected: CELL_BYTES,
                actual: data.len(),
            });
        }
        Ok(Self(data))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }
}

/// A cell plus its location and (opaque, hash-based) proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCell {
    pub data: Cell,
    pub proof: Hash32,
    pub column_index: u64,
    pub row_index: u64,
}

impl DataCell {
    /// Builds a cell and derives its proof, matching the invariant the
    /// validator checks: `proof = H(column_index || row_index || data)`.
    pub fn new(column_index: u64, row_index: u64, data: Vec<u8>) -> Result<Self> {
        let cell = Cell::new(data)?;
        let proof = cell_proof(column_index, row_index, cell.as_slice());
        Ok(Self {
            data: cell,
            proof,
            column_index,
            row_index,
        })
    }

    fn recomputed_proof(&self) -> Hash32 {
        cell_proof(self.column_index, self.row_index, self.data.as_slice())
    }
}

/// Checks column/row range, rejects all-zero sentinel data, and verifies the
/// proof invariant.
pub fn validate_cell(cell: &DataCell) -> Result<()> {
    if cell.column_index >= NUMBER_OF_COLUMNS {
        return Err(ColumnError::ColumnOutOfRange(cell.column_index));
    }
    if cell.row_index >= MAX_BLOB_COMMITMENTS_PER_BLOCK as u64 {
        return Err(ColumnError::RowOutOfRange(cell.row_index));
    }
    if cell.data.is_all_zero() {
        return Err(ColumnError::AllZeroData);
    }
    if cell.recomputed_proof() != cell.proof {
        return Err(ColumnError::ProofMismatch);
    }
    Ok(())
}

/// A single sample fed to the reconstructor.
#[derive(Debug, Clone)]
pub struct Sample {
    pub blob_index: u64,
    pub cell_index: u64,
    pub data: Cell,
}
