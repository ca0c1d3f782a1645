use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{MatrixError, Result};

/// Heap-allocated element buffer shared by a root matrix and all of its views.
///
/// Storage is always held behind an `Arc`; the strong count is the number of
/// live matrix handles addressing it, and the buffer is freed when the last
/// one drops. The lock only makes shared mutation sound; callers that write
/// the same buffer from several threads still have to order those writes
/// themselves.
#[derive(Debug)]
pub struct Storage {
    data: RwLock<Vec<f64>>,
}

impl Storage {
    /// Allocate `n` zero-initialised elements.
    ///
    /// # Errors
    /// Returns `OutOfMemory` if the allocator refuses the request.
    pub fn zeros(n: usize) -> Result<Self> {
        Ok(Storage {
            data: RwLock::new(try_zeroed(n)?),
        })
    }

    /// Wrap an existing vector.
    pub fn from_vec(data: Vec<f64>) -> Self {
        Storage {
            data: RwLock::new(data),
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared read access. Recursive, so a thread may hold several read
    /// guards on one buffer (e.g. both operands of `a * a`).
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f64>> {
        self.data.read_recursive()
    }

    /// Exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<f64>> {
        self.data.write()
    }
}

/// Allocate a zero-filled vector, reporting allocator failure instead of
/// aborting.
pub(crate) fn try_zeroed(n: usize) -> Result<Vec<f64>> {
    let mut data = Vec::new();
    data.try_reserve_exact(n)
        .map_err(|_| MatrixError::OutOfMemory { elements: n })?;
    data.resize(n, 0.0);
    Ok(data)
}
