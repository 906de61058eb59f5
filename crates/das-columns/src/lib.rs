//! Cell/column data model (C3): cell proof derivation, per-cell and batch
//! validation, and `DataColumnSidecar` assembly with inclusion proofs.

pub mod cell;
pub mod sidecar;
pub mod validate;

pub use cell::{validate_cell, Cell, DataCell, Sample};
pub use sidecar::{build_sidecar, verify_gossip_column, DataColumnSidecar};
pub use validate::{validate_batch, BatchValidationReport};

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnError {
    #[error("cell data must be exactly {expected} bytes, got {actual}")]
    InvalidCellSize { expected: usize, actual: usize },
    #[error("column index {0} out of range")]
    ColumnOutOfRange(u64),
    #[error("row index {0} out of range")]
    RowOutOfRange(u64),
    #[error("cell data is the all-zero sentinel")]
    AllZeroData,
    #[error("cell proof does not match recomputed digest")]
    ProofMismatch,
    #[error("duplicate (column_index, row_index) pair in batch")]
    DuplicateCell,
    #[error("batch must not be empty")]
    EmptyBatch,
    #[error("sidecar lengths mismatch: {cells} cells, {commitments} commitments, {proofs} proofs")]
    LengthMismatch {
        cells: usize,
        commitments: usize,
        proofs: usize,
    },
    #[error("column {0} is not in the node's custody set")]
    NotInCustodySet(u64),
}

pub type Result<T> = std::result::Result<T, ColumnError>;
