//! GF(2^16) field arithmetic and polynomials over it. Addition is XOR;
//! multiplication and division go through precomputed log/exp tables built
//! once against the irreducible polynomial `0x1100B` with generator `2`.

use das_types::{GF_GENERATOR, GF_ORDER, GF_REDUCTION_POLY};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FieldError {
    #[error("duplicate evaluation point in interpolation input")]
    DuplicateEvaluationPoint,
    #[error("mismatched lengths: {xs} evaluation points, {ys} values")]
    MismatchedLengths { xs: usize, ys: usize },
}

pub type Result<T> = std::result::Result<T, FieldError>;

struct Tables {
    exp: Vec<u16>,
    log: Vec<u16>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

fn tables() -> &'static Tables {
    TABLES.get_or_init(build_tables)
}

fn build_tables() -> Tables {
    debug_assert_eq!(GF_GENERATOR, 2, "table construction assumes generator 2");
    let order = GF_ORDER as usize;
    let mut exp = vec![0u16; 2 * order];
    let mut log = vec![0u16; order + 1];

    let mut x: u32 = 1;
    for i in 0..order {
        exp[i] = x as u16;
        log[x as usize] = i as u16;
        x <<= 1;
        if x & 0x1_0000 != 0 {
            x ^= GF_REDUCTION_POLY;
        }
    }
    for i in order..2 * order {
        exp[i] = exp[i - order];
    }
    Tables { exp, log }
}

/// `a + b` and `a - b`: both are XOR in characteristic 2.
pub fn add(a: u16, b: u16) -> u16 {
    a ^ b
}

/// Alias for [`add`] — subtraction equals addition in GF(2^16).
pub fn sub(a: u16, b: u16) -> u16 {
    add(a, b)
}

pub fn mul(a: u16, b: u16) -> u16 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    let la = t.log[a as usize] as u32;
    let lb = t.log[b as usize] as u32;
    t.exp[(la + lb) as usize]
}

/// Divides `a` by `b`. Division by zero is a programmer error: it panics.
pub fn div(a: u16, b: u16) -> u16 {
    assert!(b != 0, "GF(2^16) division by zero");
    if a == 0 {
        return 0;
    }
    let t = tables();
    let order = GF_ORDER as i64;
    let la = t.log[a as usize] as i64;
    let lb = t.log[b as usize] as i64;
    let diff = ((la - lb) % order + order) % order;
    t.exp[diff as usize]
}

/// Multiplicative inverse. Zero has no inverse: this is a programmer error.
pub fn inv(a: u16) -> u16 {
    assert!(a != 0, "GF(2^16) inverse of zero");
    let t = tables();
    let la = t.log[a as usize] as u32;
    t.exp[(GF_ORDER - la) as usize]
}

/// `a^n` for signed `n`. `a^0 = 1` for all `a` including zero; `0^n = 0` for
/// `n > 0`; negative exponents delegate to [`inv`].
pub fn pow(a: u16, n: i64) -> u16 {
    if n == 0 {
        return 1;
    }
    if a == 0 {
        assert!(n > 0, "GF(2^16): 0 raised to a negative power");
        return 0;
    }
    if n < 0 {
        return pow(inv(a), -n);
    }
    let t = tables();
    let order = GF_ORDER as i64;
    let la = t.log[a as usize] as i64;
    let exponent = ((la * n) % order + order) % order;
    t.exp[exponent as usize]
}

pub mod poly {
    use super::*;
    use std::collections::HashSet;

    /// Horner evaluation. `coeffs[0]` is the constant term.
    pub fn eval(coeffs: &[u16], x: u16) -> u16 {
        let mut acc = 0u16;
        for &c in coeffs.iter().rev() {
            acc = add(mul(acc, x), c);
        }
        acc
    }

    /// Coefficient-wise sum, padding the shorter operand with zeros.
    pub fn add_poly(a: &[u16], b: &[u16]) -> Vec<u16> {
        let len = a.len().max(b.len());
        (0..len)
            .map(|i| add(a.get(i).copied().unwrap_or(0), b.get(i).copied().unwrap_or(0)))
            .collect()
    }

    pub fn scale(a: &[u16], s: u16) -> Vec<u16> {
        a.iter().map(|&c| mul(c, s)).collect()
    }

    /// Schoolbook polynomial multiplication.
    pub fn mul_poly(a: &[u16], b: &[u16]) -> Vec<u16> {
        if a.is_empty() || b.is_empty() {
            return Vec::new();
        }
        let mut out = vec![0u16; a.len() + b.len() - 1];
        for (i, &ai) in a.iter().enumerate() {
            if ai == 0 {
                continue;
            }
            for (j, &bj) in b.iter().enumerate() {
                out[i + j] = add(out[i + j], mul(ai, bj));
            }
        }
        out
    }

    /// Monic polynomial `∏(x + r_i)` with the given roots.
    pub fn from_roots(roots: &[u16]) -> Vec<u16> {
        let mut out = vec![1u16];
        for &r in roots {
            out = mul_poly(&out, &[r, 1]);
        }
        out
    }

    /// `[1, x, x^2, ..., x^{n-1}]`.
    pub fn vandermonde_row(x: u16, n: usize) -> Vec<u16> {
        let mut row = Vec::with_capacity(n);
        let mut p = 1u16;
        for _ in 0..n {
            row.push(p);
            p = mul(p, x);
        }
        row
    }

    /// Lagrange interpolation. `xs` must be distinct.
    pub fn interpolate(xs: &[u16], ys: &[u16]) -> Result<Vec<u16>> {
        if xs.len() != ys.len() {
            return Err(FieldError::MismatchedLengths {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        let mut seen = HashSet::with_capacity(xs.len());
        for &x in xs {
            if !seen.insert(x) {
                return Err(FieldError::DuplicateEvaluationPoint);
            }
        }

        let n = xs.len();
        let mut result = vec![0u16; n.max(1)];
        for i in 0..n {
            let mut basis = vec![1u16];
            let mut denom = 1u16;
            for j in 0..n {
                if j == i {
                    continue;
                }
                basis = mul_poly(&basis, &[xs[j], 1]);
                denom = mul(denom, add(xs[i], xs[j]));
            }
            let factor = div(ys[i], denom);
            let scaled = scale(&basis, factor);
            result = add_poly(&result, &scaled);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_is_involutive() {
        for a in [0u16, 1, 2, 300, 65535] {
            assert_eq!(add(a, a), 0);
            assert_eq!(add(a, 0), a);
        }
    }

    #[test]
    fn multiplicative_identity_and_zero() {
        assert_eq!(mul(7, 1), 7);
        assert_eq!(mul(7, 0), 0);
        assert_eq!(mul(0, 7), 0);
    }

    #[test]
    fn inverse_round_trips() {
        for a in [1u16, 2, 300, 12345, 65535] {
            let inverse = inv(a);
            assert_eq!(mul(a, inverse), 1);
        }
    }

    #[test]
    fn fermat_identity_holds() {
        for a in [1u16, 2, 300, 65535] {
            assert_eq!(pow(a, GF_ORDER as i64), 1);
        }
    }

    #[test]
    #[should_panic]
    fn division_by_zero_panics() {
        div(1, 0);
    }

    #[test]
    fn interpolate_then_eval_recovers_samples() {
        let xs = [1u16, 2, 3, 4];
        let ys = [10u16, 23, 7, 91];
        let coeffs = poly::interpolate(&xs, &ys).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert_eq!(poly::eval(&coeffs, *x), *y);
        }
    }

    #[test]
    fn interpolate_rejects_duplicate_points() {
        let xs = [1u16, 1];
        let ys = [2u16, 3];
        assert!(matches!(
            poly::interpolate(&xs, &ys),
            Err(FieldError::DuplicateEvaluationPoint)
        ));
    }

    #[test]
    fn from_roots_vanishes_at_each_root() {
        let roots = [5u16, 9, 200];
        let coeffs = poly::from_roots(&roots);
        for r in roots {
            assert_eq!(poly::eval(&coeffs, r), 0);
        }
    }
}
