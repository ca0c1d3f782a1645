use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("invalid dimension: {rows}x{cols} (rows and cols must be >= 1)")]
    InvalidDimension { rows: usize, cols: usize },
    #[error("out of memory: failed to allocate {elements} elements")]
    OutOfMemory { elements: usize },
    #[error("{op}: dimension mismatch: expected [{}x{}], got [{}x{}]", .expected.0, .expected.1, .got.0, .got.1)]
    DimensionMismatch {
        op: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("view out of bounds: offset {offset} + {len} elements exceeds {capacity} addressable elements")]
    ViewOutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}

pub type Result<T> = std::result::Result<T, MatrixError>;
