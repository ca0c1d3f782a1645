use nc_matrix::{KernelConfig, MatrixError};

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NCStatus {
    Ok = 0,
    ErrorInvalidDimension = 1,
    ErrorOutOfMemory = 2,
    ErrorDimensionMismatch = 3,
    ErrorInvalidArgument = 4,
    ErrorInternal = 5,
}

impl From<&MatrixError> for NCStatus {
    fn from(err: &MatrixError) -> Self {
        match err {
            MatrixError::InvalidDimension { .. } => NCStatus::ErrorInvalidDimension,
            MatrixError::OutOfMemory { .. } => NCStatus::ErrorOutOfMemory,
            MatrixError::DimensionMismatch { .. } => NCStatus::ErrorDimensionMismatch,
            MatrixError::InvalidArgument(_) | MatrixError::ViewOutOfBounds { .. } => {
                NCStatus::ErrorInvalidArgument
            }
        }
    }
}

/// Kernel tuning parameters for a context.
#[repr(C)]
#[derive(Debug, Clone)]
pub struct NCKernelParams {
    pub parallel_threshold: u64,
    pub block_len: u64,
    pub matmul_parallel_threshold: u64,
    pub min_rows_per_task: u64,
}

impl Default for NCKernelParams {
    fn default() -> Self {
        let cfg = KernelConfig::default();
        Self {
            parallel_threshold: cfg.parallel_threshold as u64,
            block_len: cfg.block_len as u64,
            matmul_parallel_threshold: cfg.matmul_parallel_threshold as u64,
            min_rows_per_task: cfg.min_rows_per_task as u64,
        }
    }
}

impl From<&NCKernelParams> for KernelConfig {
    fn from(p: &NCKernelParams) -> Self {
        let clamp = |v: u64| usize::try_from(v).unwrap_or(usize::MAX);
        KernelConfig {
            parallel_threshold: clamp(p.parallel_threshold),
            block_len: clamp(p.block_len),
            matmul_parallel_threshold: clamp(p.matmul_parallel_threshold),
            min_rows_per_task: clamp(p.min_rows_per_task),
        }
    }
}
