//! CPU reference implementation matching the device kernel behavior.
//!
//! Correctness over speed: this is the ground truth the device result is
//! checked against. The triple loop covers the logical (unpadded) region
//! only, addressing the operands through their padded leading dimensions,
//! and accumulates in `f64` for both element widths.

use tilemul_core::DimensionSpec;

use crate::element::ClElement;
use crate::error::{OpenClError, Result};

/// Matrix multiplication: C = A * B over the logical region of padded,
/// row-major operands. A is (m × n), B is (n × p), C is (m × p); all
/// slices hold the full padded extents.
pub fn ref_matmul<T: ClElement>(spec: &DimensionSpec, a: &[T], b: &[T], c: &mut [T]) {
    assert_eq!(a.len(), spec.padded_m() * spec.padded_n(), "A extent mismatch");
    assert_eq!(b.len(), spec.padded_n() * spec.padded_p(), "B extent mismatch");
    assert_eq!(c.len(), spec.padded_m() * spec.padded_p(), "C extent mismatch");

    let lda = spec.padded_n();
    let ldb = spec.padded_p();
    let ldc = spec.padded_p();

    for i in 0..spec.m() {
        for j in 0..spec.p() {
            let mut sum = 0.0f64;
            for k in 0..spec.n() {
                sum += a[i * lda + k].to_f64() * b[k * ldb + j].to_f64();
            }
            c[i * ldc + j] = T::from_f64(sum);
        }
    }
}

/// Compare a device result against the reference over the logical region.
///
/// The tolerance grows with the reduction depth: each of the `n`
/// accumulation steps is granted one unit of the element's rounding step,
/// scaled by the magnitude of the expected value. The worst offender is
/// the one reported.
pub fn verify<T: ClElement>(spec: &DimensionSpec, got: &[T], want: &[T]) -> Result<()> {
    assert_eq!(got.len(), want.len(), "result extent mismatch");

    let ldc = spec.padded_p();
    let depth = spec.n().max(1) as f64;
    let mut worst: Option<(usize, f64, f64, f64)> = None;

    for i in 0..spec.m() {
        for j in 0..spec.p() {
            let index = i * ldc + j;
            let got_v = got[index].to_f64();
            let want_v = want[index].to_f64();
            let allowed = T::STEP_TOLERANCE * depth * want_v.abs().max(1.0);
            let excess = (got_v - want_v).abs() - allowed;
            if excess > 0.0 && worst.map_or(true, |(_, _, _, w)| excess > w) {
                worst = Some((index, got_v, want_v, excess));
            }
        }
    }

    match worst {
        Some((index, got, want, _)) => Err(OpenClError::ResultMismatch { index, got, want }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemul_core::SizeTriple;

    fn spec(m: usize, n: usize, p: usize, block_size: usize) -> DimensionSpec {
        DimensionSpec::plan(SizeTriple::new(m, n, p), block_size).unwrap()
    }

    #[test]
    fn known_product_with_padded_strides() {
        // (2x3) * (3x2) with block size 2 pads n to 4 and leaves m, p alone.
        let spec = spec(2, 3, 2, 2);
        assert_eq!(spec.padded_n(), 4);

        let a = {
            let mut a = vec![0.0f32; spec.padded_m() * spec.padded_n()];
            for (i, v) in [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0].iter().enumerate() {
                a[i] = *v;
            }
            a
        };
        let b = {
            let mut b = vec![0.0f32; spec.padded_n() * spec.padded_p()];
            for (i, v) in [7.0, 8.0, 9.0, 10.0, 11.0, 12.0].iter().enumerate() {
                b[i] = *v;
            }
            b
        };
        let mut c = vec![0.0f32; spec.padded_m() * spec.padded_p()];

        ref_matmul(&spec, &a, &b, &mut c);
        assert_eq!(c, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn identity_leaves_the_operand_unchanged() {
        let spec = spec(4, 4, 4, 2);
        let mut a = vec![0.0f64; 16];
        for i in 0..4 {
            a[i * 4 + i] = 1.0;
        }
        let b: Vec<f64> = (0..16).map(f64::from).collect();
        let mut c = vec![0.0f64; 16];

        ref_matmul(&spec, &a, &b, &mut c);
        assert_eq!(c, b);
    }

    #[test]
    fn verify_accepts_the_reference_against_itself() {
        let spec = spec(3, 5, 2, 2);
        let a = vec![0.5f32; spec.padded_m() * spec.padded_n()];
        let b = vec![0.25f32; spec.padded_n() * spec.padded_p()];
        let mut c = vec![0.0f32; spec.padded_m() * spec.padded_p()];
        ref_matmul(&spec, &a, &b, &mut c);
        assert!(verify(&spec, &c, &c).is_ok());
    }

    #[test]
    fn verify_reports_the_corrupted_index() {
        let spec = spec(2, 2, 2, 2);
        let want = vec![1.0f32, 2.0, 3.0, 4.0];
        let mut got = want.clone();
        got[2] = 30.0;

        match verify(&spec, &got, &want) {
            Err(OpenClError::ResultMismatch { index, got, want }) => {
                assert_eq!(index, 2);
                assert_eq!(got, 30.0);
                assert_eq!(want, 3.0);
            }
            other => panic!("expected ResultMismatch, got {other:?}"),
        }
    }

    #[test]
    fn verify_tolerates_rounding_noise() {
        let spec = spec(1, 100, 1, 2);
        let want = vec![100.0f32];
        // One rounding step per accumulation is within tolerance.
        let got = vec![100.0f32 + 100.0 * f32::EPSILON * 50.0];
        assert!(verify(&spec, &got, &want).is_ok());
    }

    #[test]
    fn verify_ignores_the_padding_region() {
        let spec = spec(1, 2, 1, 2);
        assert_eq!(spec.padded_p(), 2);
        let want = vec![5.0f32, 0.0];
        // Junk in the padding column must not fail the check.
        let got = vec![5.0f32, 999.0];
        assert!(verify(&spec, &got, &want).is_ok());
    }
}
