//! Platform and device enumeration.
//!
//! Platforms and devices are process-global backend handles; nothing here
//! owns or releases them. Enumeration order is whatever the installed
//! runtimes report, and all index-based addressing in this crate refers to
//! that order.

use opencl3::device::{
    Device, CL_DEVICE_TYPE_ACCELERATOR, CL_DEVICE_TYPE_ALL, CL_DEVICE_TYPE_CPU,
    CL_DEVICE_TYPE_DEFAULT, CL_DEVICE_TYPE_GPU,
};
use opencl3::platform::{get_platforms, Platform};
use tilemul_core::DeviceClass;
use tracing::debug;

use crate::capability::negotiate_fp64;
use crate::error::{OpenClError, Result};

/// Enumerate all platforms, in backend order.
pub fn platforms() -> Result<Vec<Platform>> {
    get_platforms().map_err(|e| OpenClError::PlatformEnumeration { code: e.0 })
}

/// The backend's device-type bitmask for a device class.
pub(crate) fn class_mask(class: DeviceClass) -> u64 {
    match class {
        DeviceClass::Gpu => CL_DEVICE_TYPE_GPU,
        DeviceClass::Cpu => CL_DEVICE_TYPE_CPU,
        DeviceClass::Accelerator => CL_DEVICE_TYPE_ACCELERATOR,
        DeviceClass::Default => CL_DEVICE_TYPE_DEFAULT,
    }
}

/// Human-readable name for a reported device-type bitmask.
pub(crate) fn device_type_name(mask: u64) -> &'static str {
    if mask & CL_DEVICE_TYPE_GPU != 0 {
        "GPU"
    } else if mask & CL_DEVICE_TYPE_CPU != 0 {
        "CPU"
    } else if mask & CL_DEVICE_TYPE_ACCELERATOR != 0 {
        "Accelerator"
    } else {
        "Unknown"
    }
}

/// Find the first device of `class`: platforms are walked in enumeration
/// order, and within the first platform that has any matching device the
/// first enumerated one wins.
pub(crate) fn find_by_class(class: DeviceClass) -> Result<(Platform, Device)> {
    for platform in platforms()? {
        let platform_name = platform.name().unwrap_or_default();
        debug!("probing platform {:?} for a {} device", platform_name, class);

        // A platform with no device of this class reports an error on some
        // runtimes and an empty list on others; both mean "keep looking".
        let ids = platform.get_devices(class_mask(class)).unwrap_or_default();
        if let Some(&id) = ids.first() {
            return Ok((platform, Device::new(id)));
        }
    }
    Err(OpenClError::NoMatchingDevice { class })
}

/// Find a device by explicit `<platform>:<device>` indices, bounds-checking
/// each index against the enumerated count.
pub(crate) fn find_by_indices(
    platform_index: usize,
    device_index: usize,
) -> Result<(Platform, Device)> {
    let platforms = platforms()?;
    let platform =
        platforms.get(platform_index).copied().ok_or(OpenClError::IndexOutOfRange {
            what: "platform",
            requested: platform_index,
            available: platforms.len(),
        })?;

    let ids = platform
        .get_devices(CL_DEVICE_TYPE_ALL)
        .map_err(|e| OpenClError::Backend { op: "device enumeration", code: e.0 })?;
    let id = ids.get(device_index).copied().ok_or(OpenClError::IndexOutOfRange {
        what: "device",
        requested: device_index,
        available: ids.len(),
    })?;

    Ok((platform, Device::new(id)))
}

// ── listing ──────────────────────────────────────────────────────────────

/// One device row in a platform listing.
#[derive(Debug, Clone)]
pub struct DeviceListing {
    pub index: usize,
    pub class_name: &'static str,
    pub name: String,
    pub vendor: String,
    pub supports_fp64: bool,
}

/// One enumerated platform with its devices.
#[derive(Debug, Clone)]
pub struct PlatformListing {
    pub index: usize,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub devices: Vec<DeviceListing>,
}

/// Snapshot every platform and device the installed runtimes expose,
/// including per-device fp64 negotiation results.
pub fn enumerate() -> Result<Vec<PlatformListing>> {
    let platforms = platforms()?;
    let mut listings = Vec::with_capacity(platforms.len());

    for (platform_index, platform) in platforms.into_iter().enumerate() {
        let ids = platform
            .get_devices(CL_DEVICE_TYPE_ALL)
            .map_err(|e| OpenClError::Backend { op: "device enumeration", code: e.0 })?;

        let mut devices = Vec::with_capacity(ids.len());
        for (device_index, id) in ids.into_iter().enumerate() {
            let device = Device::new(id);
            devices.push(DeviceListing {
                index: device_index,
                class_name: device_type_name(device.dev_type().unwrap_or(0)),
                name: device.name().unwrap_or_default(),
                vendor: device.vendor().unwrap_or_default(),
                supports_fp64: negotiate_fp64(&device, &platform),
            });
        }

        listings.push(PlatformListing {
            index: platform_index,
            name: platform.name().unwrap_or_default(),
            vendor: platform.vendor().unwrap_or_default(),
            version: platform.version().unwrap_or_default(),
            devices,
        });
    }

    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_class_maps_to_a_distinct_mask() {
        let masks = [
            class_mask(DeviceClass::Gpu),
            class_mask(DeviceClass::Cpu),
            class_mask(DeviceClass::Accelerator),
            class_mask(DeviceClass::Default),
        ];
        for (i, a) in masks.iter().enumerate() {
            for b in &masks[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn type_names_follow_the_mask_bits() {
        assert_eq!(device_type_name(CL_DEVICE_TYPE_GPU), "GPU");
        assert_eq!(device_type_name(CL_DEVICE_TYPE_CPU), "CPU");
        assert_eq!(device_type_name(CL_DEVICE_TYPE_ACCELERATOR), "Accelerator");
        assert_eq!(device_type_name(0), "Unknown");
    }

    #[test]
    fn combined_mask_prefers_gpu() {
        assert_eq!(device_type_name(CL_DEVICE_TYPE_GPU | CL_DEVICE_TYPE_CPU), "GPU");
    }

    // Hardware-dependent paths run only where a runtime is installed.
    #[test]
    fn enumeration_is_consistent_with_indexing() {
        let Ok(listings) = enumerate() else { return };
        for listing in &listings {
            for device in &listing.devices {
                let found = find_by_indices(listing.index, device.index);
                assert!(found.is_ok(), "listed device must be addressable by index");
            }
        }
    }

    #[test]
    fn out_of_range_platform_is_reported_with_counts() {
        let Ok(platforms) = platforms() else { return };
        let requested = platforms.len() + 4;
        match find_by_indices(requested, 0) {
            Err(OpenClError::IndexOutOfRange { what, requested: r, available }) => {
                assert_eq!(what, "platform");
                assert_eq!(r, requested);
                assert_eq!(available, platforms.len());
            }
            other => panic!("expected IndexOutOfRange, got {other:?}"),
        }
    }
}
