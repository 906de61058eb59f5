//! Compatibility surface shared by every PeerDAS crate.
//!
//! These values are bit-exact: changing any one of them changes the wire
//! format or the deterministic outputs other nodes must reproduce.

/// Size in bytes of a single cell of an extended blob.
pub const CELL_BYTES: usize = 2048;

/// Number of cells an extended blob is split into.
pub const CELLS_PER_EXT_BLOB: usize = 128;

/// Number of data columns (and, by `[SUPPLEMENT]`, gossip subnets).
pub const NUMBER_OF_COLUMNS: u64 = 128;

/// Number of custody groups columns are bucketed into.
pub const NUMBER_OF_CUSTODY_GROUPS: u64 = 128;

/// Minimum number of distinct columns a node must custody.
pub const CUSTODY_REQUIREMENT: usize = 4;

/// Default number of columns sampled per slot.
pub const SAMPLES_PER_SLOT: usize = 8;

/// Minimum number of distinct cells needed to reconstruct a blob.
pub const RECONSTRUCTION_THRESHOLD: usize = 64;

/// Maximum number of blob commitments carried by a single block.
pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: usize = 9;

/// Default size, in bytes, of an unextended blob.
pub const DEFAULT_BLOB_SIZE: usize = 131_072;

/// Order of the GF(2^16) multiplicative group (`2^16 - 1`).
pub const GF_ORDER: u32 = 65535;

/// Irreducible reduction polynomial for GF(2^16): `x^16 + x^12 + x^3 + x + 1`.
pub const GF_REDUCTION_POLY: u32 = 0x1_100B;

/// Multiplicative generator of GF(2^16).
pub const GF_GENERATOR: u16 = 2;

/// BLS12-381 scalar field modulus `r`, big-endian hex.
pub const BLS12_381_SCALAR_MODULUS_HEX: &str =
    "73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001";

/// Number of data-column gossip subnets. Equal to `NUMBER_OF_COLUMNS` per the
/// bit-exact `column_subnet(column) = column mod DATA_COLUMN_SIDECAR_SUBNET_COUNT`
/// mapping (see `mapping::column_subnet`).
pub const DATA_COLUMN_SIDECAR_SUBNET_COUNT: u64 = NUMBER_OF_COLUMNS;
