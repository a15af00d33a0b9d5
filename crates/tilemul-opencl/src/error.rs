//! Error types for the OpenCL backend.

use thiserror::Error;

use tilemul_core::DeviceClass;

/// Errors produced while selecting devices, building programs and running
/// the pipeline.
///
/// Backend failures carry the failing operation and the backend's numeric
/// error code; build failures carry the compiler's diagnostic verbatim.
#[derive(Debug, Error)]
pub enum OpenClError {
    #[error("platform enumeration failed with backend code {code}")]
    PlatformEnumeration { code: i32 },

    #[error("no {class} device found on any platform")]
    NoMatchingDevice { class: DeviceClass },

    #[error("request for {what}[{requested}] but only {available} were found")]
    IndexOutOfRange { what: &'static str, requested: usize, available: usize },

    #[error("context creation failed with backend code {code}")]
    ContextCreation { code: i32 },

    #[error("command queue creation failed with backend code {code}")]
    QueueCreation { code: i32 },

    #[error("device {device:?} does not support double precision")]
    PrecisionUnsupported { device: String },

    #[error("program build failed:\n{log}")]
    BuildFailure { log: String },

    #[error("program build failed but the backend returned an empty build log")]
    EmptyDiagnostic,

    #[error("allocation of {size_bytes} bytes failed: {reason}")]
    Allocation { size_bytes: usize, reason: String },

    #[error("data transfer failed: {reason}")]
    Transfer { reason: String },

    #[error("kernel {kernel:?} launch failed: {reason}")]
    KernelLaunch { kernel: &'static str, reason: String },

    #[error("build options need {needed} bytes but the option buffer holds {capacity}")]
    BuildOptionsTooLong { needed: usize, capacity: usize },

    #[error("padded {what} of {value} exceeds the 32-bit work size")]
    WorkSizeOverflow { what: &'static str, value: usize },

    #[error("{op} needs a {needs}-resident buffer")]
    StorageMismatch { op: &'static str, needs: &'static str },

    #[error("device result diverges from the reference at element {index}: got {got}, want {want}")]
    ResultMismatch { index: usize, got: f64, want: f64 },

    #[error("{op} failed with backend code {code}")]
    Backend { op: &'static str, code: i32 },
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, OpenClError>;
