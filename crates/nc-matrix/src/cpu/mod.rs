pub mod elementwise;
pub mod matmul;

use crate::backend::ComputeBackend;
use crate::config::KernelConfig;
use crate::error::{MatrixError, Result};

/// Pure-Rust CPU compute backend.
///
/// Kernels fork onto the current rayon pool for large inputs and join before
/// returning; nothing runs in the background between calls. The pool itself
/// belongs to the host (install a custom one with `ThreadPool::install`).
#[derive(Debug, Clone, Default)]
pub struct CpuBackend {
    config: KernelConfig,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: KernelConfig) -> Self {
        CpuBackend {
            config: config.normalized(),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }
}

fn check_len(op: &str, what: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MatrixError::InvalidArgument(format!(
            "{}: {}.len()={} but expected {}",
            op, what, got, expected
        )));
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn add(&self, a: &[f64], b: &[f64], out: &mut [f64]) -> Result<()> {
        check_len("add", "a", a.len(), out.len())?;
        check_len("add", "b", b.len(), out.len())?;
        elementwise::zip_map(a, b, out, &self.config, |x, y| x + y);
        Ok(())
    }

    fn sub(&self, a: &[f64], b: &[f64], out: &mut [f64]) -> Result<()> {
        check_len("sub", "a", a.len(), out.len())?;
        check_len("sub", "b", b.len(), out.len())?;
        elementwise::zip_map(a, b, out, &self.config, |x, y| x - y);
        Ok(())
    }

    fn neg(&self, a: &[f64], out: &mut [f64]) -> Result<()> {
        check_len("neg", "a", a.len(), out.len())?;
        elementwise::map(a, out, &self.config, |x| -x);
        Ok(())
    }

    fn abs(&self, a: &[f64], out: &mut [f64]) -> Result<()> {
        check_len("abs", "a", a.len(), out.len())?;
        elementwise::map(a, out, &self.config, f64::abs);
        Ok(())
    }

    fn matmul(
        &self,
        a: &[f64],
        b: &[f64],
        out: &mut [f64],
        m: usize,
        k: usize,
        n: usize,
    ) -> Result<()> {
        check_len("matmul", "a", a.len(), m * k)?;
        check_len("matmul", "b", b.len(), k * n)?;
        check_len("matmul", "out", out.len(), m * n)?;
        matmul::matmul::<{ matmul::LANES }>(a, b, out, m, k, n, &self.config)
    }
}
