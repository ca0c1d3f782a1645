//! Matrix-level operations.
//!
//! These check shapes, resolve aliasing between the output and the inputs,
//! take the buffer locks and hand flat slices to a [`ComputeBackend`].
//!
//! Elementwise operations accept an output that shares a buffer with an
//! input. Matmul does as well, but computes into scratch storage first and
//! copies the finished product into `result`.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::backend::ComputeBackend;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::storage::try_zeroed;

/// result = a + b
pub fn add(
    backend: &dyn ComputeBackend,
    result: &Matrix,
    a: &Matrix,
    b: &Matrix,
) -> Result<()> {
    binary("add", result, a, b, |x, y, out| backend.add(x, y, out))
}

/// result = a - b
pub fn sub(
    backend: &dyn ComputeBackend,
    result: &Matrix,
    a: &Matrix,
    b: &Matrix,
) -> Result<()> {
    binary("sub", result, a, b, |x, y, out| backend.sub(x, y, out))
}

/// result = -mat
pub fn neg(backend: &dyn ComputeBackend, result: &Matrix, mat: &Matrix) -> Result<()> {
    unary("neg", result, mat, |x, out| backend.neg(x, out))
}

/// result = |mat|, entrywise
pub fn abs(backend: &dyn ComputeBackend, result: &Matrix, mat: &Matrix) -> Result<()> {
    unary("abs", result, mat, |x, out| backend.abs(x, out))
}

fn binary<F>(op: &'static str, result: &Matrix, a: &Matrix, b: &Matrix, kernel: F) -> Result<()>
where
    F: FnOnce(&[f64], &[f64], &mut [f64]) -> Result<()>,
{
    a.shape().expect_eq(&b.shape(), op)?;
    a.shape().expect_eq(&result.shape(), op)?;

    let x = a.operand_for(result);
    let y = b.operand_for(result);
    debug!(
        op,
        shape = %result.shape(),
        aliased = x.is_snapshot() || y.is_snapshot(),
        "elementwise"
    );
    result.with_slice_mut(|out| kernel(x.as_slice(), y.as_slice(), out))
}

fn unary<F>(op: &'static str, result: &Matrix, mat: &Matrix, kernel: F) -> Result<()>
where
    F: FnOnce(&[f64], &mut [f64]) -> Result<()>,
{
    result.shape().expect_eq(&mat.shape(), op)?;

    let x = mat.operand_for(result);
    debug!(op, shape = %result.shape(), aliased = x.is_snapshot(), "elementwise");
    result.with_slice_mut(|out| kernel(x.as_slice(), out))
}

/// result = a @ b
///
/// # Errors
/// `DimensionMismatch` if `a.cols() != b.rows()` or `result` is not
/// `a.rows() x b.cols()`; `result` is left untouched in that case.
pub fn matmul(
    backend: &dyn ComputeBackend,
    result: &Matrix,
    a: &Matrix,
    b: &Matrix,
) -> Result<()> {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    if b.rows() != k {
        return Err(MatrixError::DimensionMismatch {
            op: "matmul",
            expected: (k, n),
            got: b.shape().dims(),
        });
    }
    if result.shape().dims() != (m, n) {
        return Err(MatrixError::DimensionMismatch {
            op: "matmul",
            expected: (m, n),
            got: result.shape().dims(),
        });
    }

    let aliased = result.shares_storage(a) || result.shares_storage(b);
    debug!(m, k, n, aliased, backend = backend.name(), "matmul");

    if aliased {
        let mut scratch = try_zeroed(m * n)?;
        {
            let x = a.read_operand();
            let y = b.read_operand();
            backend.matmul(x.as_slice(), y.as_slice(), &mut scratch, m, k, n)?;
        }
        result.with_slice_mut(|out| out.copy_from_slice(&scratch));
        return Ok(());
    }

    let x = a.operand_for(result);
    let y = b.operand_for(result);
    result.with_slice_mut(|out| backend.matmul(x.as_slice(), y.as_slice(), out, m, k, n))
}

/// Fill `mat` with independent samples uniform over `[low, high)`, drawn in
/// row-major order from a generator seeded with `seed`.
///
/// The same seed always yields the same entries. An empty range
/// (`low == high`) fills every entry with `low`.
///
/// # Errors
/// `InvalidArgument` if either bound is not finite, `low > high`, or the
/// width `high - low` overflows.
pub fn randomize(mat: &Matrix, seed: u64, low: f64, high: f64) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(seed);
    randomize_with(mat, &mut rng, low, high)
}

/// Like [`randomize`], drawing from a caller-supplied generator.
pub fn randomize_with<R: Rng + ?Sized>(
    mat: &Matrix,
    rng: &mut R,
    low: f64,
    high: f64,
) -> Result<()> {
    if !(low.is_finite() && high.is_finite() && low <= high && (high - low).is_finite()) {
        return Err(MatrixError::InvalidArgument(format!(
            "randomize: need finite low <= high with a finite width, got [{}, {})",
            low, high
        )));
    }
    if low == high {
        mat.fill(low);
        return Ok(());
    }
    let dist = Uniform::new(low, high);
    mat.with_slice_mut(|data| {
        for v in data.iter_mut() {
            *v = dist.sample(rng);
        }
    });
    Ok(())
}
