//! Reed-Solomon erasure codec over GF(2^16). Data shards are treated as the
//! evaluations of a degree-`<k` polynomial at `g^0, g^1, ..., g^{k-1}`;
//! parity shards are the same polynomial evaluated further out at
//! `g^k, ..., g^{n-1}`. Recovery re-interpolates from any `k` known shards.

use das_field::gf;
use das_types::GF_GENERATOR;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("data shard count must be nonzero")]
    ZeroDataShards,
    #[error("requested {requested} shards but the field only supports {max}")]
    TooManyShards { requested: usize, max: usize },
    #[error("expected {expected} data shards, got {actual}")]
    ShardCountMismatch { expected: usize, actual: usize },
    #[error("all shards must be the same length")]
    SizeMismatch,
    #[error("need at least {required} shards to recover, got {supplied}")]
    TooFewShards { required: usize, supplied: usize },
    #[error("field error: {0}")]
    Field(#[from] das_field::FieldError),
}

pub type Result<T> = std::result::Result<T, CodecError>;

fn be_u16(shard: &[u8], symbol: usize) -> u16 {
    u16::from_be_bytes([shard[symbol * 2], shard[symbol * 2 + 1]])
}

fn write_be_u16(shard: &mut [u8], symbol: usize, value: u16) {
    let bytes = value.to_be_bytes();
    shard[symbol * 2] = bytes[0];
    shard[symbol * 2 + 1] = bytes[1];
}

fn pad_even(shard: &[u8]) -> Vec<u8> {
    let mut v = shard.to_vec();
    if v.len() % 2 != 0 {
        v.push(0);
    }
    v
}

fn uniform_shard_len(shards: &[Vec<u8>]) -> Result<usize> {
    let len = shards.first().map(|s| s.len()).unwrap_or(0);
    if shards.iter().any(|s| s.len() != len) {
        return Err(CodecError::SizeMismatch);
    }
    Ok(len)
}

/// A `(k, m)` Reed-Solomon codec over GF(2^16): `k` data shards, `m` parity
/// shards, `n = k + m` evaluation points `g^0, ..., g^{n-1}`.
#[derive(Debug, Clone)]
pub struct ReedSolomon {
    data_shards: usize,
    parity_shards: usize,
    points: Vec<u16>,
}

impl ReedSolomon {
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self> {
        if data_shards == 0 {
            return Err(CodecError::ZeroDataShards);
        }
        let n = data_shards + parity_shards;
        if n as u32 > das_types::GF_ORDER {
            return Err(CodecError::TooManyShards {
                requested: n,
                max: das_types::GF_ORDER as usize,
            });
        }
        let points = (0..n).map(|i| gf::pow(GF_GENERATOR, i as i64)).collect();
        Ok(Self {
            data_shards,
            parity_shards,
            points,
        })
    }

    pub fn data_shards(&self) -> usize {
        self.data_shards
    }

    pub fn parity_shards(&self) -> usize {
        self.parity_shards
    }

    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Encodes `data_shards` into `total_shards()` shards; the first `k`
    /// shards of the result are identical to the input (by construction of
    /// the interpolating polynomial), the rest are parity.
    pub fn encode(&self, data_shards: &[Vec<u8>]) -> Result<Vec<Vec<u8>>> {
        if data_shards.len() != self.data_shards {
            return Err(CodecError::ShardCountMismatch {
                expected: self.data_shards,
                actual: data_shards.len(),
            });
        }
        let padded: Vec<Vec<u8>> = data_shards.iter().map(|s| pad_even(s)).collect();
        let shard_len = uniform_shard_len(&padded)?;
        let symbol_count = shard_len / 2;
        let mut output = vec![vec![0u8; shard_len]; self.total_shards()];
        let xs = &self.points[..self.data_shards];

        for sym in 0..symbol_count {
            let ys: Vec<u16> = padded.iter().map(|s| be_u16(s, sym)).collect();
            let coeffs = gf::poly::interpolate(xs, &ys)?;
            for (i, &x) in self.points.iter().enumerate() {
                write_be_u16(&mut output[i], sym, gf::poly::eval(&coeffs, x));
            }
        }
        debug!(symbol_count, shards = output.len(), "encoded blob shards");
        Ok(output)
    }

    /// Re-interpolates from the first `k` shards and compares against the
    /// parity shards, returning `false` on the first mismatch.
    pub fn verify_parity(&self, shards: &[Vec<u8>]) -> Result<bool> {
        if shards.len() != self.total_shards() {
            return Err(CodecError::ShardCountMismatch {
                expected: self.total_shards(),
                actual: shards.len(),
            });
        }
        let shard_len = uniform_shard_len(shards)?;
        let symbol_count = shard_len / 2;
        let xs = &self.points[..self.data_shards];

        for sym in 0..symbol_count {
            let ys: Vec<u16> = shards[..self.data_shards]
                .iter()
                .map(|s| be_u16(s, sym))
                .collect();
            let coeffs = gf::poly::interpolate(xs, &ys)?;
            for i in self.data_shards..self.total_shards() {
                let expected = gf::poly::eval(&coeffs, self.points[i]);
                if be_u16(&shards[i], sym) != expected {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Recovers all `n` shards from any `k` distinctly-indexed shards.
    pub fn recover(&self, shards: &[(usize, Vec<u8>)]) -> Result<Vec<Vec<u8>>> {
        let mut sorted: Vec<(usize, Vec<u8>)> = shards.to_vec();
        sorted.sort_by_key(|(i, _)| *i);
        sorted.dedup_by_key(|(i, _)| *i);

        if sorted.len() < self.data_shards {
            return Err(CodecError::TooFewShards {
                required: self.data_shards,
                supplied: sorted.len(),
            });
        }

        let lens: Vec<Vec<u8>> = sorted.iter().map(|(_, s)| s.clone()).collect();
        let shard_len = uniform_shard_len(&lens)?;
        let symbol_count = shard_len / 2;
        let chosen = &sorted[..self.data_shards];
        let xs: Vec<u16> = chosen.iter().map(|(i, _)| self.points[*i]).collect();
        let mut output = vec![vec![0u8; shard_len]; self.total_shards()];

        for sym in 0..symbol_count {
            let ys: Vec<u16> = chosen.iter().map(|(_, s)| be_u16(s, sym)).collect();
            let coeffs = gf::poly::interpolate(&xs, &ys)?;
            for (i, &x) in self.points.iter().enumerate() {
                write_be_u16(&mut output[i], sym, gf::poly::eval(&coeffs, x));
            }
        }
        debug!(supplied = shards.len(), "recovered shards");
        Ok(output)
    }

    /// `g(x) = ∏_{i=0}^{m-1}(x + g^{k+i})`, exposed for classical syndrome
    /// decoding; the codec itself always recovers via interpolation.
    pub fn generator_polynomial(&self) -> Vec<u16> {
        let roots = &self.points[self.data_shards..self.total_shards()];
        gf::poly::from_roots(roots)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    proptest! {
        #[test]
        fn recover_from_any_k_subset_matches_the_full_encoding(
            k in 2usize..8,
            m in 2usize..8,
            shard_len in 2usize..32,
            seed in any::<u64>(),
        ) {
            let shard_len = shard_len * 2; // even length per the symbol-alignment rule
            let rs = ReedSolomon::new(k, m).unwrap();
            let data: Vec<Vec<u8>> = (0..k)
                .map(|i| (0..shard_len).map(|b| ((i + b) % 251) as u8).collect())
                .collect();
            let encoded = rs.encode(&data).unwrap();

            let mut indices: Vec<usize> = (0..(k + m)).collect();
            indices.shuffle(&mut StdRng::seed_from_u64(seed));
            let subset: Vec<(usize, Vec<u8>)> = indices[..k]
                .iter()
                .map(|&i| (i, encoded[i].clone()))
                .collect();

            let recovered = rs.recover(&subset).unwrap();
            prop_assert_eq!(recovered, encoded);
        }

        #[test]
        fn verify_parity_rejects_any_single_byte_flip(
            k in 2usize..6,
            m in 2usize..6,
            shard_len in 2usize..16,
            flip_shard in any::<u8>(),
            flip_byte in any::<u8>(),
        ) {
            let shard_len = shard_len * 2;
            let rs = ReedSolomon::new(k, m).unwrap();
            let data: Vec<Vec<u8>> = (0..k)
                .map(|i| (0..shard_len).map(|b| ((i + b) % 251) as u8).collect())
                .collect();
            let mut encoded = rs.encode(&data).unwrap();
            prop_assert!(rs.verify_parity(&encoded).unwrap());

            let shard_idx = flip_shard as usize % encoded.len();
            let byte_idx = flip_byte as usize % encoded[shard_idx].len();
            encoded[shard_idx][byte_idx] ^= 0xff;
            prop_assert!(!rs.verify_parity(&encoded).unwrap());
        }
    }
}
