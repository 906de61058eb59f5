pub mod address;
pub mod bytes;
pub mod constants;
pub mod hash;
pub mod mapping;

pub use address::Address;
pub use bytes::Bytes;
pub use constants::*;
pub use hash::{Hash32, HashExt, H160, H256};
pub use mapping::{column_subnet, should_custody_column};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Overflow in arithmetic operation")]
    Overflow,
}

pub type Result<T> = std::result::Result<T, TypesError>;
