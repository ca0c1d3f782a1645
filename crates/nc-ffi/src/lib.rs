mod context;
mod error;
mod types;

pub use context::*;
pub use error::*;
pub use types::*;

use std::ffi::CString;
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;

use nc_matrix::{ops, KernelConfig, Matrix, Result};

/// Execute a closure that returns an `NCStatus`, catching any panics
/// and converting them into `NCStatus::ErrorInternal`.
///
/// Matrix buffers sit behind locks that never poison, so a panic cannot leave
/// a handle in a state later calls would misread.
fn catch_panic<F: FnOnce() -> NCStatus>(f: F) -> NCStatus {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            NCStatus::ErrorInternal
        }
    }
}

/// Turn an engine result into a status, recording the error message.
fn status(result: Result<()>) -> NCStatus {
    match result {
        Ok(()) => NCStatus::Ok,
        Err(e) => report(e),
    }
}

fn null_argument() -> NCStatus {
    set_last_error("null argument".to_string());
    NCStatus::ErrorInvalidArgument
}

/// Hand a new matrix to the caller through `out`.
unsafe fn emit(matrix: Matrix, out: *mut *mut NCMatrix) {
    *out = Box::into_raw(Box::new(NCMatrix { inner: matrix }));
}

/// Create a compute context.
///
/// `params` may be null to use the default kernel configuration. On success,
/// writes a heap-allocated `NCContext` pointer into `*ctx_out`; the caller
/// must later call `nc_context_destroy`.
#[no_mangle]
pub unsafe extern "C" fn nc_context_create(
    params: *const NCKernelParams,
    ctx_out: *mut *mut NCContext,
) -> NCStatus {
    catch_panic(|| {
        if ctx_out.is_null() {
            return null_argument();
        }
        let config = if params.is_null() {
            KernelConfig::default()
        } else {
            KernelConfig::from(unsafe { &*params })
        };
        let ctx = Box::new(NCContext::new(config));
        unsafe {
            *ctx_out = Box::into_raw(ctx);
        }
        NCStatus::Ok
    })
}

/// Destroy a context previously created by `nc_context_create`.
///
/// Passing a null pointer is a no-op and returns `NCStatus::Ok`.
#[no_mangle]
pub unsafe extern "C" fn nc_context_destroy(ctx: *mut NCContext) -> NCStatus {
    if ctx.is_null() {
        return NCStatus::Ok;
    }
    drop(Box::from_raw(ctx));
    NCStatus::Ok
}

/// Allocate a zero-filled `rows x cols` matrix into `*out`.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_create(
    rows: usize,
    cols: usize,
    out: *mut *mut NCMatrix,
) -> NCStatus {
    catch_panic(|| {
        if out.is_null() {
            return null_argument();
        }
        match Matrix::create(rows, cols) {
            Ok(m) => {
                unsafe { emit(m, out) };
                NCStatus::Ok
            }
            Err(e) => report(e),
        }
    })
}

/// Create a `rows x cols` view starting `offset` elements into `owner`.
///
/// The view keeps the shared buffer alive; `owner` may be released before
/// the view.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_create_view(
    owner: *const NCMatrix,
    offset: usize,
    rows: usize,
    cols: usize,
    out: *mut *mut NCMatrix,
) -> NCStatus {
    catch_panic(|| {
        if owner.is_null() || out.is_null() {
            return null_argument();
        }
        let owner = unsafe { &(*owner).inner };
        match owner.create_view(offset, rows, cols) {
            Ok(v) => {
                unsafe { emit(v, out) };
                NCStatus::Ok
            }
            Err(e) => report(e),
        }
    })
}

/// Release a matrix handle. Passing a null pointer is a no-op.
///
/// Each handle must be released exactly once; the buffer is freed with the
/// last handle sharing it.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_release(mat: *mut NCMatrix) {
    if !mat.is_null() {
        drop(Box::from_raw(mat));
    }
}

/// Number of rows of `mat`, or 0 for a null handle.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_rows(mat: *const NCMatrix) -> usize {
    if mat.is_null() {
        return 0;
    }
    (*mat).inner.rows()
}

/// Number of columns of `mat`, or 0 for a null handle.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_cols(mat: *const NCMatrix) -> usize {
    if mat.is_null() {
        return 0;
    }
    (*mat).inner.cols()
}

/// Read entry `(row, col)` into `*value`.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_get(
    mat: *const NCMatrix,
    row: usize,
    col: usize,
    value: *mut f64,
) -> NCStatus {
    catch_panic(|| {
        if mat.is_null() || value.is_null() {
            return null_argument();
        }
        let m = unsafe { &(*mat).inner };
        unsafe { *value = m.get(row, col) };
        NCStatus::Ok
    })
}

/// Write `value` at `(row, col)`.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_set(
    mat: *const NCMatrix,
    row: usize,
    col: usize,
    value: f64,
) -> NCStatus {
    catch_panic(|| {
        if mat.is_null() {
            return null_argument();
        }
        unsafe { &(*mat).inner }.set(row, col, value);
        NCStatus::Ok
    })
}

/// Set every entry of `mat` to `value`.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_fill(mat: *const NCMatrix, value: f64) -> NCStatus {
    catch_panic(|| {
        if mat.is_null() {
            return null_argument();
        }
        unsafe { &(*mat).inner }.fill(value);
        NCStatus::Ok
    })
}

/// Fill `mat` with uniform samples from `[low, high)` seeded by `seed`.
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_randomize(
    mat: *const NCMatrix,
    seed: u64,
    low: f64,
    high: f64,
) -> NCStatus {
    catch_panic(|| {
        if mat.is_null() {
            return null_argument();
        }
        status(ops::randomize(unsafe { &(*mat).inner }, seed, low, high))
    })
}

/// Shared body of the two-operand kernels.
unsafe fn binary_op(
    ctx: *const NCContext,
    result: *const NCMatrix,
    a: *const NCMatrix,
    b: *const NCMatrix,
    op: fn(&dyn nc_matrix::ComputeBackend, &Matrix, &Matrix, &Matrix) -> Result<()>,
) -> NCStatus {
    catch_panic(|| {
        if ctx.is_null() || result.is_null() || a.is_null() || b.is_null() {
            return null_argument();
        }
        let ctx = unsafe { &*ctx };
        let (result, a, b) = unsafe { (&(*result).inner, &(*a).inner, &(*b).inner) };
        status(op(ctx.backend.as_ref(), result, a, b))
    })
}

/// Shared body of the one-operand kernels.
unsafe fn unary_op(
    ctx: *const NCContext,
    result: *const NCMatrix,
    mat: *const NCMatrix,
    op: fn(&dyn nc_matrix::ComputeBackend, &Matrix, &Matrix) -> Result<()>,
) -> NCStatus {
    catch_panic(|| {
        if ctx.is_null() || result.is_null() || mat.is_null() {
            return null_argument();
        }
        let ctx = unsafe { &*ctx };
        let (result, mat) = unsafe { (&(*result).inner, &(*mat).inner) };
        status(op(ctx.backend.as_ref(), result, mat))
    })
}

/// `result = a + b`
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_add(
    ctx: *const NCContext,
    result: *const NCMatrix,
    a: *const NCMatrix,
    b: *const NCMatrix,
) -> NCStatus {
    binary_op(ctx, result, a, b, ops::add)
}

/// `result = a - b`
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_sub(
    ctx: *const NCContext,
    result: *const NCMatrix,
    a: *const NCMatrix,
    b: *const NCMatrix,
) -> NCStatus {
    binary_op(ctx, result, a, b, ops::sub)
}

/// `result = a @ b`
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_matmul(
    ctx: *const NCContext,
    result: *const NCMatrix,
    a: *const NCMatrix,
    b: *const NCMatrix,
) -> NCStatus {
    binary_op(ctx, result, a, b, ops::matmul)
}

/// `result = -mat`
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_neg(
    ctx: *const NCContext,
    result: *const NCMatrix,
    mat: *const NCMatrix,
) -> NCStatus {
    unary_op(ctx, result, mat, ops::neg)
}

/// `result = |mat|`
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_abs(
    ctx: *const NCContext,
    result: *const NCMatrix,
    mat: *const NCMatrix,
) -> NCStatus {
    unary_op(ctx, result, mat, ops::abs)
}

/// `result = mat ^ exponent`
#[no_mangle]
pub unsafe extern "C" fn nc_matrix_pow(
    ctx: *const NCContext,
    result: *const NCMatrix,
    mat: *const NCMatrix,
    exponent: i64,
) -> NCStatus {
    catch_panic(|| {
        if ctx.is_null() || result.is_null() || mat.is_null() {
            return null_argument();
        }
        let ctx = unsafe { &*ctx };
        let (result, mat) = unsafe { (&(*result).inner, &(*mat).inner) };
        status(nc_matrix::pow(ctx.backend.as_ref(), result, mat, exponent))
    })
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error on this
/// thread, or null if there is none. The caller must free the returned string
/// with `nc_free_string`.
#[no_mangle]
pub extern "C" fn nc_last_error() -> *mut c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by `nc_last_error`.
#[no_mangle]
pub unsafe extern "C" fn nc_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::ptr;

    fn create(rows: usize, cols: usize) -> *mut NCMatrix {
        let mut m = ptr::null_mut();
        assert_eq!(unsafe { nc_matrix_create(rows, cols, &mut m) }, NCStatus::Ok);
        m
    }

    fn context() -> *mut NCContext {
        let mut ctx = ptr::null_mut();
        assert_eq!(
            unsafe { nc_context_create(ptr::null(), &mut ctx) },
            NCStatus::Ok
        );
        ctx
    }

    fn get(m: *const NCMatrix, r: usize, c: usize) -> f64 {
        let mut v = f64::NAN;
        assert_eq!(unsafe { nc_matrix_get(m, r, c, &mut v) }, NCStatus::Ok);
        v
    }

    fn last_error() -> String {
        let p = nc_last_error();
        assert!(!p.is_null());
        let s = unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned();
        unsafe { nc_free_string(p) };
        s
    }

    #[test]
    fn test_create_fill_get() {
        let m = create(2, 3);
        unsafe {
            assert_eq!(nc_matrix_rows(m), 2);
            assert_eq!(nc_matrix_cols(m), 3);
            assert_eq!(nc_matrix_fill(m, 5.0), NCStatus::Ok);
        }
        assert_eq!(get(m, 0, 0), 5.0);
        assert_eq!(get(m, 1, 2), 5.0);
        unsafe { nc_matrix_release(m) };
    }

    #[test]
    fn test_create_invalid_dimension() {
        let mut m = ptr::null_mut();
        let status = unsafe { nc_matrix_create(0, 3, &mut m) };
        assert_eq!(status, NCStatus::ErrorInvalidDimension);
        assert!(m.is_null());
        assert!(last_error().contains("invalid dimension"));
    }

    #[test]
    fn test_create_overflowing_dimensions() {
        let mut m = ptr::null_mut();
        let status = unsafe { nc_matrix_create(usize::MAX, 2, &mut m) };
        assert_eq!(status, NCStatus::ErrorInvalidDimension);
        assert!(m.is_null());
    }

    #[test]
    fn test_view_write_through_and_release_order() {
        let parent = create(4, 4);
        let mut view = ptr::null_mut();
        unsafe {
            assert_eq!(
                nc_matrix_create_view(parent, 4, 1, 4, &mut view),
                NCStatus::Ok
            );
            assert_eq!(nc_matrix_set(view, 0, 1, 8.0), NCStatus::Ok);
        }
        assert_eq!(get(parent, 1, 1), 8.0);

        unsafe { nc_matrix_release(parent) };
        assert_eq!(get(view, 0, 1), 8.0);
        unsafe { nc_matrix_release(view) };
    }

    #[test]
    fn test_view_out_of_bounds() {
        let parent = create(2, 2);
        let mut view = ptr::null_mut();
        let status = unsafe { nc_matrix_create_view(parent, 3, 1, 2, &mut view) };
        assert_eq!(status, NCStatus::ErrorInvalidArgument);
        assert!(view.is_null());
        unsafe { nc_matrix_release(parent) };
    }

    #[test]
    fn test_matmul_and_pow() {
        let ctx = context();
        let a = create(2, 2);
        let b = create(2, 2);
        let r = create(2, 2);
        unsafe {
            for (i, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
                nc_matrix_set(a, i / 2, i % 2, v);
            }
            for (i, v) in [5.0, 6.0, 7.0, 8.0].into_iter().enumerate() {
                nc_matrix_set(b, i / 2, i % 2, v);
            }
            assert_eq!(nc_matrix_matmul(ctx, r, a, b), NCStatus::Ok);
        }
        assert_eq!(get(r, 0, 0), 19.0);
        assert_eq!(get(r, 0, 1), 22.0);
        assert_eq!(get(r, 1, 0), 43.0);
        assert_eq!(get(r, 1, 1), 50.0);

        unsafe {
            nc_matrix_fill(a, 0.0);
            nc_matrix_set(a, 0, 0, 1.0);
            nc_matrix_set(a, 0, 1, 1.0);
            nc_matrix_set(a, 1, 1, 1.0);
            assert_eq!(nc_matrix_pow(ctx, r, a, 3), NCStatus::Ok);
        }
        assert_eq!(get(r, 0, 1), 3.0);

        unsafe {
            assert_eq!(
                nc_matrix_pow(ctx, r, a, -2),
                NCStatus::ErrorInvalidArgument
            );
            for m in [a, b, r] {
                nc_matrix_release(m);
            }
            nc_context_destroy(ctx);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let ctx = context();
        let a = create(2, 3);
        let b = create(2, 3);
        let r = create(2, 3);
        unsafe {
            assert_eq!(
                nc_matrix_matmul(ctx, r, a, b),
                NCStatus::ErrorDimensionMismatch
            );
            assert_eq!(nc_matrix_add(ctx, r, a, b), NCStatus::Ok);
            let odd = create(3, 2);
            assert_eq!(nc_matrix_neg(ctx, odd, a), NCStatus::ErrorDimensionMismatch);
            assert_eq!(nc_matrix_abs(ctx, r, a), NCStatus::Ok);
            assert_eq!(nc_matrix_sub(ctx, r, a, odd), NCStatus::ErrorDimensionMismatch);
            for m in [a, b, r, odd] {
                nc_matrix_release(m);
            }
            nc_context_destroy(ctx);
        }
        assert!(last_error().contains("dimension mismatch"));
    }

    #[test]
    fn test_randomize_is_seeded() {
        let a = create(3, 3);
        let b = create(3, 3);
        unsafe {
            assert_eq!(nc_matrix_randomize(a, 9, -1.0, 1.0), NCStatus::Ok);
            assert_eq!(nc_matrix_randomize(b, 9, -1.0, 1.0), NCStatus::Ok);
        }
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(get(a, r, c), get(b, r, c));
            }
        }
        unsafe {
            assert_eq!(
                nc_matrix_randomize(a, 9, 1.0, -1.0),
                NCStatus::ErrorInvalidArgument
            );
            nc_matrix_release(a);
            nc_matrix_release(b);
        }
    }

    #[test]
    fn test_null_arguments() {
        unsafe {
            assert_eq!(
                nc_matrix_create(1, 1, ptr::null_mut()),
                NCStatus::ErrorInvalidArgument
            );
            assert_eq!(nc_matrix_fill(ptr::null(), 1.0), NCStatus::ErrorInvalidArgument);
            assert_eq!(
                nc_matrix_add(ptr::null(), ptr::null(), ptr::null(), ptr::null()),
                NCStatus::ErrorInvalidArgument
            );
            assert_eq!(nc_matrix_rows(ptr::null()), 0);
            nc_matrix_release(ptr::null_mut());
            assert_eq!(nc_context_destroy(ptr::null_mut()), NCStatus::Ok);
        }
        assert_eq!(last_error(), "null argument");
    }

    #[test]
    fn test_out_of_range_get_is_internal_error() {
        let m = create(1, 1);
        let mut v = 0.0;
        let status = unsafe { nc_matrix_get(m, 5, 5, &mut v) };
        assert_eq!(status, NCStatus::ErrorInternal);
        unsafe { nc_matrix_release(m) };
    }

    #[test]
    fn test_custom_params() {
        let params = NCKernelParams {
            parallel_threshold: 0,
            block_len: 0,
            matmul_parallel_threshold: 0,
            min_rows_per_task: 0,
        };
        let mut ctx = ptr::null_mut();
        unsafe {
            assert_eq!(nc_context_create(&params, &mut ctx), NCStatus::Ok);
            assert_eq!((*ctx).backend.config().block_len, 1);
            nc_context_destroy(ctx);
        }
        assert_eq!(
            NCKernelParams::default().block_len as usize,
            KernelConfig::default().block_len
        );
    }
}
