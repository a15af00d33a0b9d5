//! Double-precision capability negotiation.
//!
//! A device is only treated as fp64-capable when two independent checks
//! agree: the device's double-precision floating-point configuration must
//! report the full set of required capability bits, and the owning
//! platform's extension string must advertise an fp64 extension. Capability
//! bits can be set while the platform-level advertisement is missing (and
//! vice versa on buggy backends), so neither check alone is trusted.

use opencl3::device::{
    Device, CL_FP_DENORM, CL_FP_FMA, CL_FP_INF_NAN, CL_FP_ROUND_TO_INF,
    CL_FP_ROUND_TO_NEAREST, CL_FP_ROUND_TO_ZERO,
};
use opencl3::platform::Platform;
use tracing::debug;

/// Every one of these double-precision bits must be present.
pub const REQUIRED_FP64_CAPS: u64 = CL_FP_FMA
    | CL_FP_ROUND_TO_NEAREST
    | CL_FP_ROUND_TO_ZERO
    | CL_FP_ROUND_TO_INF
    | CL_FP_INF_NAN
    | CL_FP_DENORM;

/// Extension names that advertise double precision, matched as exact
/// case-sensitive substrings.
pub const FP64_EXTENSIONS: [&str; 2] = ["cl_khr_fp64", "cl_amd_fp64"];

/// Phase 1: the device's double-precision configuration contains all
/// required capability bits.
#[must_use]
pub fn fp64_config_complete(config: u64) -> bool {
    config & REQUIRED_FP64_CAPS == REQUIRED_FP64_CAPS
}

/// Phase 2: the platform extension string advertises an fp64 extension.
#[must_use]
pub fn extensions_advertise_fp64(extensions: &str) -> bool {
    FP64_EXTENSIONS.iter().any(|ext| extensions.contains(ext))
}

/// Run both phases against a live device/platform pair.
///
/// Failure of either phase (including a failed query) is reported through
/// the returned boolean, never as an error; only callers that require
/// double precision treat `false` as fatal.
pub fn negotiate_fp64(device: &Device, platform: &Platform) -> bool {
    let config = match device.double_fp_config() {
        Ok(config) => config,
        Err(e) => {
            debug!("double fp config query failed: {}", e);
            return false;
        }
    };
    if !fp64_config_complete(config) {
        debug!(
            "device fp64 config {:#x} is missing required bits {:#x}",
            config,
            REQUIRED_FP64_CAPS & !config
        );
        return false;
    }
    let extensions = match platform.extensions() {
        Ok(extensions) => extensions,
        Err(e) => {
            debug!("platform extension query failed: {}", e);
            return false;
        }
    };
    let advertised = extensions_advertise_fp64(&extensions);
    if !advertised {
        debug!("device passes fp64 config but the platform does not advertise it");
    }
    advertised
}


#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn config_passes_iff_every_required_bit_is_present(config in any::<u64>()) {
            prop_assert_eq!(
                fp64_config_complete(config),
                config & REQUIRED_FP64_CAPS == REQUIRED_FP64_CAPS
            );
        }

        #[test]
        fn substring_scan_ignores_surrounding_extensions(
            prefix in "[a-z_0-9 ]{0,24}",
            suffix in "[a-z_0-9 ]{0,24}",
        ) {
            let listed = format!("{prefix} cl_amd_fp64 {suffix}");
            prop_assert!(extensions_advertise_fp64(&listed));
        }
    }
}
