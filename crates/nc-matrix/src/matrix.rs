use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLockReadGuard;
use tracing::trace;

use crate::backend::ComputeBackend;
use crate::error::{MatrixError, Result};
use crate::ops;
use crate::shape::Shape;
use crate::storage::Storage;

/// A dense, row-major `f64` matrix handle.
///
/// A handle is either a *root*, created by [`Matrix::create`] with a fresh
/// buffer, or a *view*, created by [`Matrix::create_view`], which addresses a
/// contiguous run of another matrix's buffer. Every handle holds one strong
/// reference to the shared [`Storage`]; the buffer is freed exactly once, when
/// the last root or view addressing it is dropped, in whatever order that
/// happens.
///
/// All access goes through the storage lock, so operations take `&self` even
/// when they write. Writes through one handle are visible through every other
/// handle sharing the buffer.
pub struct Matrix {
    storage: Arc<Storage>,
    offset: usize,
    shape: Shape,
    view: bool,
}

impl Matrix {
    /// Allocate a zero-filled root matrix.
    ///
    /// # Errors
    /// `InvalidDimension` if `rows` or `cols` is zero or `rows * cols`
    /// overflows, `OutOfMemory` if the buffer cannot be allocated.
    pub fn create(rows: usize, cols: usize) -> Result<Self> {
        let shape = Shape::new(rows, cols)?;
        let storage = Storage::zeros(shape.numel())?;
        trace!(rows, cols, "allocated root matrix");
        Ok(Matrix {
            storage: Arc::new(storage),
            offset: 0,
            shape,
            view: false,
        })
    }

    /// Build a root matrix from row-major data.
    ///
    /// # Errors
    /// `InvalidDimension` for a zero dimension, `InvalidArgument` if
    /// `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        let shape = Shape::new(rows, cols)?;
        if data.len() != shape.numel() {
            return Err(MatrixError::InvalidArgument(format!(
                "data length {} does not match shape {} (numel={})",
                data.len(),
                shape,
                shape.numel()
            )));
        }
        Ok(Matrix {
            storage: Arc::new(Storage::from_vec(data)),
            offset: 0,
            shape,
            view: false,
        })
    }

    /// Build a root matrix from a slice of equally long rows.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(MatrixError::InvalidArgument(format!(
                "ragged rows: expected {} columns, found a row of {}",
                cols,
                bad.len()
            )));
        }
        Matrix::from_vec(rows.len(), cols, rows.concat())
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Result<Self> {
        let m = Matrix::create(n, n)?;
        m.set_identity();
        Ok(m)
    }

    /// Create a view of `rows x cols` elements starting `offset` elements
    /// into this matrix.
    ///
    /// Element `[r][c]` of the view aliases element `offset + r * cols + c`
    /// of this matrix in flat row-major order. Views of views compose their
    /// offsets and all share the root's buffer.
    ///
    /// # Errors
    /// `InvalidDimension` for a zero dimension, `ViewOutOfBounds` if the
    /// requested range runs past the end of this matrix.
    pub fn create_view(&self, offset: usize, rows: usize, cols: usize) -> Result<Matrix> {
        let shape = Shape::new(rows, cols)?;
        let capacity = self.shape.numel();
        let end = offset.checked_add(shape.numel());
        if end.map_or(true, |end| end > capacity) {
            return Err(MatrixError::ViewOutOfBounds {
                offset,
                len: shape.numel(),
                capacity,
            });
        }
        let view = Matrix {
            storage: Arc::clone(&self.storage),
            offset: self.offset + offset,
            shape,
            view: true,
        };
        trace!(
            offset = view.offset,
            rows,
            cols,
            refs = view.ref_count(),
            "created view"
        );
        Ok(view)
    }

    /// Release this handle.
    ///
    /// Equivalent to dropping it: the shared buffer survives while any other
    /// root or view still addresses it.
    pub fn release(self) {
        drop(self);
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Flat element offset of this matrix within the root buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if this handle aliases a buffer it did not allocate.
    pub fn is_view(&self) -> bool {
        self.view
    }

    /// Number of live handles (root and views) addressing this buffer.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Returns true if both handles address the same buffer.
    pub fn shares_storage(&self, other: &Matrix) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Read the entry at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position falls outside the underlying buffer.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row < self.rows() && col < self.cols());
        self.storage.read()[self.offset + self.shape.index(row, col)]
    }

    /// Write the entry at `(row, col)`.
    ///
    /// # Panics
    /// Panics if the position falls outside the underlying buffer.
    pub fn set(&self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.rows() && col < self.cols());
        let idx = self.offset + self.shape.index(row, col);
        self.storage.write()[idx] = value;
    }

    /// Set every entry to `value`.
    pub fn fill(&self, value: f64) {
        self.with_slice_mut(|data| data.fill(value));
    }

    /// Overwrite with the identity pattern: ones on the main diagonal, zeros
    /// elsewhere.
    pub fn set_identity(&self) {
        let cols = self.cols();
        let diag = self.rows().min(cols);
        self.with_slice_mut(|data| {
            data.fill(0.0);
            for i in 0..diag {
                data[i * cols + i] = 1.0;
            }
        });
    }

    /// Copy the entries out in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.storage.read()[self.range()].to_vec()
    }

    /// Copy every entry of `src` into this matrix.
    ///
    /// # Errors
    /// `DimensionMismatch` if the shapes differ.
    pub fn copy_from(&self, src: &Matrix) -> Result<()> {
        self.shape.expect_eq(&src.shape, "copy_from")?;
        let src = src.operand_for(self);
        self.with_slice_mut(|dst| dst.copy_from_slice(src.as_slice()));
        Ok(())
    }

    /// Allocate a new root matrix holding a copy of this one's entries.
    pub fn duplicate(&self) -> Result<Matrix> {
        let copy = Matrix::create(self.rows(), self.cols())?;
        copy.copy_from(self)?;
        Ok(copy)
    }

    /// Matrix product `self * other` into a freshly allocated matrix.
    pub fn matmul(&self, other: &Matrix, backend: &dyn ComputeBackend) -> Result<Matrix> {
        let result = Matrix::create(self.rows(), other.cols())?;
        ops::matmul(backend, &result, self, other)?;
        Ok(result)
    }

    /// Flat range of the root buffer this matrix covers.
    pub(crate) fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.shape.numel()
    }

    /// Run `f` on this matrix's entries with exclusive access.
    pub(crate) fn with_slice_mut<R>(&self, f: impl FnOnce(&mut [f64]) -> R) -> R {
        let range = self.range();
        let mut data = self.storage.write();
        f(&mut data[range])
    }

    /// Borrow this matrix as a read operand of a kernel writing `dst`.
    ///
    /// When both share a buffer the entries are snapshotted, so the write
    /// lock on `dst` can be taken without invalidating the read.
    pub(crate) fn operand_for(&self, dst: &Matrix) -> Operand<'_> {
        if self.shares_storage(dst) {
            Operand::Snapshot(self.to_vec())
        } else {
            self.read_operand()
        }
    }

    /// Borrow this matrix as a read operand under a shared lock.
    pub(crate) fn read_operand(&self) -> Operand<'_> {
        Operand::Locked(self.storage.read(), self.range())
    }
}

/// A kernel input, either read under the owning buffer's lock or copied out
/// because the output aliases it.
pub(crate) enum Operand<'a> {
    Locked(RwLockReadGuard<'a, Vec<f64>>, Range<usize>),
    Snapshot(Vec<f64>),
}

impl Operand<'_> {
    pub(crate) fn as_slice(&self) -> &[f64] {
        match self {
            Operand::Locked(guard, range) => &guard[range.clone()],
            Operand::Snapshot(data) => data,
        }
    }

    pub(crate) fn is_snapshot(&self) -> bool {
        matches!(self, Operand::Snapshot(_))
    }
}

impl Drop for Matrix {
    fn drop(&mut self) {
        trace!(
            view = self.view,
            remaining = Arc::strong_count(&self.storage) - 1,
            "released matrix handle"
        );
    }
}

impl PartialEq for Matrix {
    /// Two matrices are equal when their shapes and entries match, regardless
    /// of which buffers back them.
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape {
            return false;
        }
        let a = self.storage.read();
        let b = other.storage.read();
        a[self.range()] == b[other.range()]
    }
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matrix")
            .field("shape", &self.shape)
            .field("offset", &self.offset)
            .field("view", &self.view)
            .field("data", &self.to_vec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Weak;

    #[test]
    fn test_create_is_zeroed_root() {
        let m = Matrix::create(2, 3).unwrap();
        assert_eq!(m.rows(), 2);
        assert_eq!(m.cols(), 3);
        assert!(!m.is_view());
        assert_eq!(m.ref_count(), 1);
        assert_eq!(m.to_vec(), vec![0.0; 6]);
    }

    #[test]
    fn test_create_invalid_dimension() {
        assert_eq!(
            Matrix::create(0, 3).unwrap_err(),
            MatrixError::InvalidDimension { rows: 0, cols: 3 }
        );
        assert!(Matrix::create(3, 0).is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_create_overflowing_dimensions() {
        assert_eq!(
            Matrix::create(1 << 32, 1 << 32).unwrap_err(),
            MatrixError::InvalidDimension {
                rows: 1 << 32,
                cols: 1 << 32
            }
        );
        // Representable but far too large to allocate.
        assert_eq!(
            Matrix::create(1 << 31, 1 << 31).unwrap_err(),
            MatrixError::OutOfMemory { elements: 1 << 62 }
        );
    }

    #[test]
    fn test_fill_and_get() {
        let m = Matrix::create(2, 3).unwrap();
        m.fill(5.0);
        assert_eq!(m.get(0, 0), 5.0);
        assert_eq!(m.get(1, 2), 5.0);
    }

    #[test]
    fn test_set_get() {
        let m = Matrix::create(2, 2).unwrap();
        m.set(1, 0, -3.5);
        assert_eq!(m.get(1, 0), -3.5);
        assert_eq!(m.to_vec(), vec![0.0, 0.0, -3.5, 0.0]);
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        assert!(matches!(
            Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0]),
            Err(MatrixError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_from_rows() {
        let m = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]).unwrap();
        assert_eq!(m.get(1, 0), 3.0);
        assert!(Matrix::from_rows(&[&[1.0, 2.0], &[3.0]]).is_err());
        assert!(Matrix::from_rows(&[]).is_err());
    }

    #[test]
    fn test_identity() {
        let m = Matrix::identity(3).unwrap();
        assert_eq!(
            m.to_vec(),
            vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_view_of_second_row() {
        let parent = Matrix::from_vec(4, 4, (0..16).map(f64::from).collect()).unwrap();
        let row = parent.create_view(4, 1, 4).unwrap();
        assert!(row.is_view());
        assert_eq!(row.to_vec(), vec![4.0, 5.0, 6.0, 7.0]);

        row.set(0, 2, 99.0);
        assert_eq!(parent.get(1, 2), 99.0);

        parent.set(1, 0, -1.0);
        assert_eq!(row.get(0, 0), -1.0);
    }

    #[test]
    fn test_view_reshapes_flat_range() {
        let parent = Matrix::from_vec(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let view = parent.create_view(1, 2, 2).unwrap();
        assert_eq!(view.get(0, 0), 2.0);
        assert_eq!(view.get(1, 1), 5.0);
    }

    #[test]
    fn test_view_of_view_composes_offsets() {
        let root = Matrix::from_vec(3, 4, (0..12).map(f64::from).collect()).unwrap();
        let outer = root.create_view(2, 2, 4).unwrap();
        let inner = outer.create_view(3, 1, 2).unwrap();
        assert_eq!(inner.offset(), 5);
        assert_eq!(inner.to_vec(), vec![5.0, 6.0]);
        assert_eq!(root.ref_count(), 3);
    }

    #[test]
    fn test_view_out_of_bounds() {
        let m = Matrix::create(2, 2).unwrap();
        assert_eq!(
            m.create_view(2, 1, 3).unwrap_err(),
            MatrixError::ViewOutOfBounds {
                offset: 2,
                len: 3,
                capacity: 4
            }
        );
        assert!(m.create_view(usize::MAX, 1, 1).is_err());
        assert!(m.create_view(0, 0, 1).is_err());

        let v = m.create_view(1, 1, 2).unwrap();
        assert!(v.create_view(1, 1, 2).is_err());

        assert_eq!(
            m.create_view(0, usize::MAX, 2).unwrap_err(),
            MatrixError::InvalidDimension {
                rows: usize::MAX,
                cols: 2
            }
        );
    }

    #[test]
    fn test_refcount_any_release_order() {
        let root = Matrix::create(4, 4).unwrap();
        let weak: Weak<Storage> = Arc::downgrade(&root.storage);

        let views: Vec<Matrix> = (0..4).map(|i| root.create_view(i * 4, 1, 4).unwrap()).collect();
        assert_eq!(root.ref_count(), 5);

        root.release();
        assert!(weak.upgrade().is_some());

        let mut views = views;
        let last = views.remove(2);
        for v in views {
            v.release();
            assert!(weak.upgrade().is_some());
        }
        last.release();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_nested_views_outlive_root() {
        let root = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let weak = Arc::downgrade(&root.storage);
        let outer = root.create_view(0, 1, 4).unwrap();
        let inner = outer.create_view(2, 1, 2).unwrap();
        drop(root);
        drop(outer);
        assert_eq!(inner.to_vec(), vec![3.0, 4.0]);
        assert_eq!(inner.ref_count(), 1);
        drop(inner);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_copy_from_and_duplicate() {
        let a = Matrix::from_vec(1, 3, vec![1.0, 2.0, 3.0]).unwrap();
        let b = Matrix::create(1, 3).unwrap();
        b.copy_from(&a).unwrap();
        assert_eq!(a, b);

        let d = a.duplicate().unwrap();
        assert!(!d.shares_storage(&a));
        d.set(0, 0, 10.0);
        assert_eq!(a.get(0, 0), 1.0);

        let wrong = Matrix::create(3, 1).unwrap();
        assert!(wrong.copy_from(&a).is_err());
    }

    #[test]
    fn test_copy_between_overlapping_views() {
        let root = Matrix::from_vec(1, 6, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let left = root.create_view(0, 1, 4).unwrap();
        let right = root.create_view(2, 1, 4).unwrap();
        right.copy_from(&left).unwrap();
        assert_eq!(root.to_vec(), vec![1.0, 2.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_equality_ignores_backing() {
        let a = Matrix::from_vec(1, 2, vec![3.0, 4.0]).unwrap();
        let parent = Matrix::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let view = parent.create_view(2, 1, 2).unwrap();
        assert_eq!(a, view);
        assert_ne!(a, Matrix::from_vec(2, 1, vec![3.0, 4.0]).unwrap());
    }
}
