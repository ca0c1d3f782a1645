//! `nc-matrix` - Dense `f64` matrix engine.
//!
//! This crate provides:
//! - A `Matrix` handle type whose roots and views share one reference-counted
//!   buffer
//! - A `ComputeBackend` trait for the numeric kernels
//! - A `CpuBackend` with rayon fork-join elementwise and matmul kernels
//! - Matrix-level operations (`ops`) and integer exponentiation (`pow`)

pub mod backend;
pub mod config;
pub mod cpu;
pub mod error;
pub mod matrix;
pub mod ops;
pub mod pow;
pub mod shape;
pub mod storage;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use config::KernelConfig;
pub use cpu::CpuBackend;
pub use error::{MatrixError, Result};
pub use matrix::Matrix;
pub use ops::{abs, add, matmul, neg, randomize, randomize_with, sub};
pub use pow::pow;
pub use shape::Shape;
pub use storage::Storage;
