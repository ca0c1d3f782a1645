/// Tuning knobs for the CPU kernels.
///
/// None of these affect results beyond floating-point reassociation in the
/// matmul reduction; they only decide when and how work is fanned out to the
/// rayon pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Element count at or above which elementwise kernels run in parallel.
    pub parallel_threshold: usize,
    /// Number of elements handed to one parallel elementwise task.
    pub block_len: usize,
    /// Multiply-add count (`m * k * n`) at or above which matmul fans out
    /// across output rows.
    pub matmul_parallel_threshold: usize,
    /// Minimum number of output rows per parallel matmul task.
    pub min_rows_per_task: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 1 << 15,
            block_len: 1 << 12,
            matmul_parallel_threshold: 1 << 15,
            min_rows_per_task: 1,
        }
    }
}

impl KernelConfig {
    /// A configuration that always takes the parallel paths, with the
    /// smallest task sizes. Used to exercise the fan-out on small inputs.
    pub fn always_parallel() -> Self {
        Self {
            parallel_threshold: 0,
            block_len: 8,
            matmul_parallel_threshold: 0,
            min_rows_per_task: 1,
        }
    }

    /// A configuration that never fans out.
    pub fn sequential() -> Self {
        Self {
            parallel_threshold: usize::MAX,
            matmul_parallel_threshold: usize::MAX,
            ..Self::default()
        }
    }

    /// Clamp zero task sizes, which rayon's chunking cannot accept.
    pub(crate) fn normalized(mut self) -> Self {
        self.block_len = self.block_len.max(1);
        self.min_rows_per_task = self.min_rows_per_task.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps_zero_sizes() {
        let cfg = KernelConfig {
            block_len: 0,
            min_rows_per_task: 0,
            ..KernelConfig::default()
        }
        .normalized();
        assert_eq!(cfg.block_len, 1);
        assert_eq!(cfg.min_rows_per_task, 1);
    }

    #[test]
    fn test_sequential_keeps_block_len() {
        let cfg = KernelConfig::sequential();
        assert_eq!(cfg.block_len, KernelConfig::default().block_len);
        assert_eq!(cfg.parallel_threshold, usize::MAX);
    }
}
