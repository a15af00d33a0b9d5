//! OpenCL kernel source for the tiled matrix multiplication.
//!
//! The source is embedded at compile time via `include_str!` and compiled
//! to a device program at runtime. Both precision variants live in one
//! file: `matmul_f32` is always present, `matmul_f64` only where the
//! compiler advertises an fp64 extension.

/// Tiled matrix multiplication kernel source.
pub const MATMUL_TILED_SRC: &str = include_str!("matmul_tiled.cl");

/// Block size used when no override is given.
pub const DEFAULT_BLOCK_SIZE: usize = 16;
