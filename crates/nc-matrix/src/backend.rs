use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// Kernels operate on flat row-major `f64` slices and write into a
/// caller-provided output slice. Shape checking and buffer aliasing are
/// resolved by the matrix-level operations in [`crate::ops`] before a kernel
/// is called, so `out` never overlaps an input here.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Element-wise addition: out[i] = a[i] + b[i].
    fn add(&self, a: &[f64], b: &[f64], out: &mut [f64]) -> Result<()>;

    /// Element-wise subtraction: out[i] = a[i] - b[i].
    fn sub(&self, a: &[f64], b: &[f64], out: &mut [f64]) -> Result<()>;

    /// Element-wise negation: out[i] = -a[i].
    fn neg(&self, a: &[f64], out: &mut [f64]) -> Result<()>;

    /// Element-wise absolute value: out[i] = |a[i]|.
    fn abs(&self, a: &[f64], out: &mut [f64]) -> Result<()>;

    /// Matrix multiplication: out = a @ b.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - `out`: row-major data of shape [m, n], fully overwritten
    fn matmul(
        &self,
        a: &[f64],
        b: &[f64],
        out: &mut [f64],
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<()>;
}
