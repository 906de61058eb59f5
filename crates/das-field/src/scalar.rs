//! BLS12-381 scalar field arithmetic and the power-of-two FFT built on top
//! of it. `r - 1 = 2^32 * t` gives the field a `2^32` multiplicative
//! subgroup; every root of unity used by the codec's blob-sized transforms
//! is derived from the primitive `2^32`-th root `5^t mod r`.

use bls12_381::Scalar;
use ff::Field;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScalarFieldError {
    #[error("transform length {0} is not a power of two")]
    NotPowerOfTwo(usize),
    #[error("transform length {0} exceeds the 2^32 subgroup order")]
    OrderTooLarge(usize),
}

pub type Result<T> = std::result::Result<T, ScalarFieldError>;

/// `(r - 1) / 2^32` — the odd cofactor, as little-endian 64-bit limbs.
const COFACTOR: [u64; 4] = [
    0xfffe_5bfe_ffff_ffff,
    0x09a1_d805_53bd_a402,
    0x299d_7d48_3339_d808,
    0x0000_0000_73ed_a753,
];

fn primitive_root_2_32() -> Scalar {
    Scalar::from(5u64).pow_vartime(&COFACTOR)
}

static ROOT_2_32: OnceLock<Scalar> = OnceLock::new();

/// Primitive `n`-th root of unity for `n = 2^log_n`, `log_n <= 32`.
pub fn root_of_unity(log_n: u32) -> Scalar {
    assert!(log_n <= 32, "no subgroup of that order in the scalar field");
    let root = *ROOT_2_32.get_or_init(primitive_root_2_32);
    let mut r = root;
    for _ in 0..(32 - log_n) {
        r = r.square();
    }
    r
}

fn bit_reverse_copy(input: &[Scalar]) -> Vec<Scalar> {
    let n = input.len();
    let bits = n.trailing_zeros();
    let mut out = input.to_vec();
    for i in 0..n {
        let j = (i as u32).reverse_bits() >> (32 - bits);
        if (j as usize) > i {
            out.swap(i, j as usize);
        }
    }
    out
}

fn cooley_tukey(a: &mut [Scalar], root: Scalar) {
    let n = a.len();
    let mut len = 2usize;
    while len <= n {
        let w_len = root.pow_vartime(&[(n / len) as u64]);
        let mut i = 0;
        while i < n {
            let mut w = Scalar::one();
            for j in 0..len / 2 {
                let u = a[i + j];
                let v = a[i + j + len / 2] * w;
                a[i + j] = u + v;
                a[i + j + len / 2] = u - v;
                w *= w_len;
            }
            i += len;
        }
        len <<= 1;
    }
}

fn check_len(n: usize) -> Result<u32> {
    if n == 0 || !n.is_power_of_two() {
        return Err(ScalarFieldError::NotPowerOfTwo(n));
    }
    let log_n = n.trailing_zeros();
    if log_n > 32 {
        return Err(ScalarFieldError::OrderTooLarge(n));
    }
    Ok(log_n)
}

/// Forward Cooley-Tukey FFT. `input.len()` must be a power of two.
pub fn fft(input: &[Scalar]) -> Result<Vec<Scalar>> {
    let log_n = check_len(input.len())?;
    let root = root_of_unity(log_n);
    let mut a = bit_reverse_copy(input);
    cooley_tukey(&mut a, root);
    Ok(a)
}

/// Inverse FFT: conjugate root, then scale by `n^-1`.
pub fn ifft(input: &[Scalar]) -> Result<Vec<Scalar>> {
    let log_n = check_len(input.len())?;
    let root = root_of_unity(log_n).invert().unwrap();
    let mut a = bit_reverse_copy(input);
    cooley_tukey(&mut a, root);
    let n_inv = Scalar::from(input.len() as u64).invert().unwrap();
    for x in a.iter_mut() {
        *x *= n_inv;
    }
    Ok(a)
}
