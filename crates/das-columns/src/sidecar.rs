use das_crypto::{hash_pair, keccak256};
use das_types::{column_subnet, should_custody_column, Hash32};

use crate::cell::{validate_cell, Cell, DataCell};
use crate::validate::validate_batch;
use crate::{ColumnError, Result};

/// The gossip-level unit carrying one column across the wire, with the
/// per-blob commitments/proofs for the block and an inclusion proof tying
/// the commitments to the rest of the block.
#[derive(Debug, Clone)]
pub struct DataColumnSidecar {
    pub index: u64,
    pub column: Vec<Cell>,
    pub kzg_commitments: Vec<Hash32>,
    pub kzg_proofs: Vec<Hash32>,
    pub inclusion_proof: Vec<Hash32>,
}

fn leaf_hash(commitment: &Hash32, column_index: u64) -> Hash32 {
    let mut buf = Vec::with_capacity(40);
    buf.extend_from_slice(commitment.as_bytes());
    buf.extend_from_slice(&column_index.to_le_bytes());
    Hash32::from(keccak256(&buf))
}

/// Builds the sibling path for `target_index`, padding odd levels by
/// duplicating the last element and hashing pairs with the keccak-256
/// variant used throughout the system.
fn merkle_path(mut level: Vec<Hash32>, mut index: usize) -> Vec<Hash32> {
    let mut path = Vec::new();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().expect("level is non-empty");
            level.push(last);
        }
        let sibling = if index % 2 == 0 { index + 1 } else { index - 1 };
        path.push(level[sibling]);

        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            next.push(hash_pair(&pair[0], &pair[1]));
        }
        level = next;
        index /= 2;
    }
    path
}

/// Builds a sidecar for `column_index` from one cell/commitment/proof per
/// blob in the block. The inclusion proof authenticates the first
/// commitment's leaf against the tree formed from every commitment in this
/// column, each tagged with the column index.
pub fn build_sidecar(
    column_index: u64,
    cells: Vec<Cell>,
    commitments: Vec<Hash32>,
    proofs: Vec<Hash32>,
) -> Result<DataColumnSidecar> {
    if cells.len() != commitments.len() || cells.len() != proofs.len() {
        return Err(ColumnError::LengthMismatch {
            cells: cells.len(),
            commitments: commitments.len(),
            proofs: proofs.len(),
        });
    }
    if cells.is_empty() {
        return Err(ColumnError::EmptyBatch);
    }

    let leaves: Vec<Hash32> = commitments
        .iter()
        .map(|c| leaf_hash(c, column_index))
        .collect();
    let inclusion_proof = merkle_path(leaves, 0);

    Ok(DataColumnSidecar {
        index: column_index,
        column: cells,
        kzg_commitments: commitments,
        kzg_proofs: proofs,
        inclusion_proof,
    })
}

/// Re-runs structural validation on a gossiped column's cells, checks
/// custody-set membership (when a custody set is supplied) and returns the
/// column's subnet id.
pub fn verify_gossip_column(
    cells: &[DataCell],
    column_index: u64,
    custody_columns: Option<&[u64]>,
) -> Result<u64> {
    for cell in cells {
        validate_cell(cell)?;
    }
    validate_batch(cells, false)?;

    if let Some(custody) = custody_columns {
        if !should_custody_column(column_index, custody) {
            return Err(ColumnError::NotInCustodySet(column_index));
        }
    }

    Ok(column_subnet(column_index))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use das_types::CELL_BYTES;
    use proptest::prelude::*;

    fn manual_root(commitments: &[Hash32], column_index: u64) -> Hash32 {
        let mut level: Vec<Hash32> = commitments
            .iter()
            .map(|c| leaf_hash(c, column_index))
            .collect();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                let last = *level.last().unwrap();
                level.push(last);
            }
            level = level
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], &pair[1]))
                .collect();
        }
        level[0]
    }

    proptest! {
        #[test]
        fn inclusion_proof_folds_up_to_the_manually_computed_root(
            seeds in proptest::collection::vec(any::<u8>(), 1..24),
            column_index in 0u64..128,
        ) {
            let n = seeds.len();
            let cells: Vec<Cell> = seeds.iter().map(|&s| Cell::new(vec![s; CELL_BYTES]).unwrap()).collect();
            let commitments: Vec<Hash32> = seeds.iter().map(|&s| Hash32::from(keccak256(&[s]))).collect();
            let proofs = commitments.clone();

            let sidecar = build_sidecar(column_index, cells, commitments.clone(), proofs).unwrap();

            let mut acc = leaf_hash(&commitments[0], column_index);
            let mut index = 0usize;
            for sibling in &sidecar.inclusion_proof {
                acc = if index % 2 == 0 {
                    hash_pair(&acc, sibling)
                } else {
                    hash_pair(sibling, &acc)
                };
                index /= 2;
            }
            prop_assert_eq!(acc, manual_root(&commitments, column_index));
            prop_assert_eq!(n, commitments.len());
        }
    }
}
