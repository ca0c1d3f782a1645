use tracing::debug;

use crate::backend::ComputeBackend;
use crate::error::{MatrixError, Result};
use crate::matrix::Matrix;
use crate::ops;

/// result = mat ^ exponent, by repeated squaring.
///
/// Uses O(log exponent) matrix products. `result` may share a buffer with
/// `mat`; the base is copied before `result` is first written.
///
/// # Errors
/// `InvalidArgument` if `mat` is not square or `exponent` is negative,
/// `DimensionMismatch` if `result` does not have `mat`'s shape.
pub fn pow(
    backend: &dyn ComputeBackend,
    result: &Matrix,
    mat: &Matrix,
    exponent: i64,
) -> Result<()> {
    if !mat.shape().is_square() {
        return Err(MatrixError::InvalidArgument(format!(
            "pow requires a square matrix, got {}",
            mat.shape()
        )));
    }
    if exponent < 0 {
        return Err(MatrixError::InvalidArgument(format!(
            "pow requires a non-negative exponent, got {}",
            exponent
        )));
    }
    mat.shape().expect_eq(&result.shape(), "pow")?;

    let n = mat.rows();
    // Scratch roots; dropped (and their buffers freed) on every return path.
    let mut base = mat.duplicate()?;
    let mut tmp = Matrix::create(n, n)?;

    result.set_identity();
    let mut e = exponent;
    let mut products = 0usize;
    while e > 0 {
        if e % 2 == 0 {
            ops::matmul(backend, &tmp, &base, &base)?;
            std::mem::swap(&mut base, &mut tmp);
            e /= 2;
        } else {
            tmp.copy_from(result)?;
            ops::matmul(backend, result, &tmp, &base)?;
            e -= 1;
        }
        products += 1;
    }

    debug!(n, exponent, products, "pow");
    Ok(())
}
