//! OpenCL backend for tilemul block-tiled matrix multiplication.
//!
//! This crate provides:
//! - [`session`]: platform/device selection bound to a context and an
//!   in-order profiling queue
//! - [`capability`]: two-phase double-precision negotiation
//! - [`program`]: kernel compilation with verbatim build diagnostics
//! - [`buffer`]: padded host- and device-resident matrix operands
//! - [`pipeline`]: the end-to-end driver with optional CPU verification
//! - [`kernels`]: the embedded tiled kernel source

pub mod buffer;
pub mod capability;
pub mod device;
pub mod element;
pub mod error;
pub mod kernels;
pub mod pipeline;
pub mod program;
pub mod reference;
pub mod session;

// Re-export primary public types.
pub use buffer::{AccessMode, OperandBuffer};
pub use capability::negotiate_fp64;
pub use device::{enumerate, DeviceListing, PlatformListing};
pub use element::ClElement;
pub use error::{OpenClError, Result};
pub use kernels::{DEFAULT_BLOCK_SIZE, MATMUL_TILED_SRC};
pub use pipeline::{execute, MatmulReport};
pub use program::{build_options, ComputeProgram, BUILD_OPTIONS_CAPACITY};
pub use session::DeviceSession;
