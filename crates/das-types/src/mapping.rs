//! Cross-cutting mappings (C11) shared by the sampler, gossip scorer and
//! custody manager: which subnet a column lives on, and whether a given
//! custody set covers a column.

use crate::constants::DATA_COLUMN_SIDECAR_SUBNET_COUNT;

/// `column_subnet(column) = column mod DATA_COLUMN_SIDECAR_SUBNET_COUNT`.
pub fn column_subnet(column: u64) -> u64 {
    column % DATA_COLUMN_SIDECAR_SUBNET_COUNT
}

/// Whether `column` is covered by a node's custody set.
pub fn should_custody_column(column: u64, custody_columns: &[u64]) -> bool {
    custody_columns.binary_search(&column).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subnet_wraps_at_column_count() {
        assert_eq!(column_subnet(0), 0);
        assert_eq!(column_subnet(127), 127);
        assert_eq!(column_subnet(128), 0);
        assert_eq!(column_subnet(255), 127);
    }

    #[test]
    fn custody_lookup_requires_sorted_input() {
        let columns = vec![2, 5, 9, 40];
        assert!(should_custody_column(9, &columns));
        assert!(!should_custody_column(10, &columns));
    }
}
