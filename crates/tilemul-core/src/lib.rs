//! Host-side planning and grammar for block-tiled matrix multiplication.
//!
//! Everything in this crate is pure logic with no backend dependency: the
//! numeric suffix grammar ([`parse`]), the device-selection grammar
//! ([`select`]) and the dimension planner ([`plan`]). The OpenCL side lives
//! in `tilemul-opencl`.

pub mod parse;
pub mod plan;
pub mod select;

pub use plan::{padding, DimensionSpec, PlanError, PrecisionMode, SizeTriple};
pub use select::{parse_selection, DeviceClass, Selection, SelectionError};
