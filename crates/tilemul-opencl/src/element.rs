//! Element types the device kernels operate on.
//!
//! The float and double execution paths run the same algorithm and differ
//! only in element width, so the driver is generic over [`ClElement`] and
//! the precision decision is taken exactly once, when a
//! [`PrecisionMode`](tilemul_core::PrecisionMode) is turned into a type
//! parameter. The trait is sealed: the kernel source defines one entry
//! point per width and nothing else can satisfy the contract.

use tilemul_core::PrecisionMode;

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// A floating-point element with a matching device kernel entry point.
pub trait ClElement: sealed::Sealed + Copy + Default + Send + Sync + 'static {
    /// Name of the kernel entry point compiled for this width.
    const KERNEL_NAME: &'static str;

    /// The precision mode this element realizes.
    const PRECISION: PrecisionMode;

    /// Relative tolerance granted per accumulation step when comparing a
    /// device result against the reference.
    const STEP_TOLERANCE: f64;

    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

impl ClElement for f32 {
    const KERNEL_NAME: &'static str = "matmul_f32";
    const PRECISION: PrecisionMode = PrecisionMode::Single;
    const STEP_TOLERANCE: f64 = f32::EPSILON as f64;

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        f64::from(self)
    }
}

impl ClElement for f64 {
    const KERNEL_NAME: &'static str = "matmul_f64";
    const PRECISION: PrecisionMode = PrecisionMode::Double;
    const STEP_TOLERANCE: f64 = f64::EPSILON;

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}
