use std::sync::Arc;

use nc_matrix::{CpuBackend, KernelConfig, Matrix};

/// Opaque context handle that owns the compute backend.
pub struct NCContext {
    pub backend: Arc<CpuBackend>,
}

impl Default for NCContext {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl NCContext {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            backend: Arc::new(CpuBackend::with_config(config)),
        }
    }
}

/// Opaque matrix handle. Each handle, root or view, is released exactly once
/// with `nc_matrix_release`.
pub struct NCMatrix {
    pub inner: Matrix,
}
