use crate::error::{MatrixError, Result};
use std::fmt;

/// A two-dimensional matrix shape.
///
/// Both dimensions are at least 1 and `rows * cols` fits in a `usize`;
/// construction through [`Shape::new`] enforces this, so [`Shape::numel`]
/// never overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    rows: usize,
    cols: usize,
}

impl Shape {
    /// Create a validated shape.
    ///
    /// # Errors
    /// Returns `InvalidDimension` if either dimension is zero or the element
    /// count `rows * cols` is not representable.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        if rows < 1 || cols < 1 || rows.checked_mul(cols).is_none() {
            return Err(MatrixError::InvalidDimension { rows, cols });
        }
        Ok(Shape { rows, cols })
    }

    /// Create a square `n x n` shape.
    pub fn square(n: usize) -> Result<Self> {
        Shape::new(n, n)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// The shape as a `(rows, cols)` pair, as carried in error reports.
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flat row-major index of `(row, col)` relative to the start of the
    /// matrix.
    #[inline]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Checks that `other` equals this shape, reporting a mismatch for `op`.
    pub(crate) fn expect_eq(&self, other: &Shape, op: &'static str) -> Result<()> {
        if self != other {
            return Err(MatrixError::DimensionMismatch {
                op,
                expected: self.dims(),
                got: other.dims(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} x {}]", self.rows, self.cols)
    }
}

impl TryFrom<(usize, usize)> for Shape {
    type Error = MatrixError;

    fn try_from((rows, cols): (usize, usize)) -> Result<Self> {
        Shape::new(rows, cols)
    }
}
