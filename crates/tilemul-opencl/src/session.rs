//! Device session lifecycle.
//!
//! A [`DeviceSession`] binds exactly one device: platform and device
//! handles (process-global, never released), a context created from that
//! device, and a profiling-enabled in-order command queue. The constructor
//! either returns a fully usable session or an error; when context or
//! queue creation fails mid-way, the wrappers already created release
//! themselves on drop, in reverse acquisition order. Field order matters
//! for teardown: the queue is declared before the context so it is
//! released first.

use opencl3::command_queue::{CommandQueue, CL_QUEUE_PROFILING_ENABLE};
use opencl3::context::Context;
use opencl3::device::Device;
use opencl3::platform::Platform;
use opencl3::types::cl_device_id;
use tilemul_core::{DeviceClass, Selection};
use tracing::{debug, info};

use crate::capability::negotiate_fp64;
use crate::device::{device_type_name, find_by_class, find_by_indices};
use crate::error::{OpenClError, Result};

/// An exclusive binding to one compute device.
pub struct DeviceSession {
    queue: CommandQueue,
    context: Context,
    device: Device,
    platform: Platform,
    platform_name: String,
    device_name: String,
    supports_fp64: bool,
}

impl DeviceSession {
    /// Open a session on the first device of the requested class.
    ///
    /// Platforms are walked in enumeration order; the first platform with
    /// any matching device wins, and within it the first enumerated
    /// device. The tie-break is deterministic for a fixed runtime setup.
    pub fn from_class(class: DeviceClass) -> Result<Self> {
        let (platform, device) = find_by_class(class)?;
        Self::from_parts(platform, device)
    }

    /// Open a session on the device at `<platform>:<device>` in
    /// enumeration order.
    pub fn from_indices(platform_index: usize, device_index: usize) -> Result<Self> {
        let (platform, device) = find_by_indices(platform_index, device_index)?;
        Self::from_parts(platform, device)
    }

    /// Open a session for an already-parsed selection.
    pub fn from_selection(selection: Selection) -> Result<Self> {
        match selection {
            Selection::ByClass(class) => Self::from_class(class),
            Selection::ByIndices { platform, device } => Self::from_indices(platform, device),
        }
    }

    fn from_parts(platform: Platform, device: Device) -> Result<Self> {
        let platform_name = platform.name().unwrap_or_default();
        let device_name = device.name().unwrap_or_default();

        let context = Context::from_device(&device)
            .map_err(|e| OpenClError::ContextCreation { code: e.0 })?;
        let queue = CommandQueue::create_default_with_properties(
            &context,
            CL_QUEUE_PROFILING_ENABLE,
            0,
        )
        .map_err(|e| OpenClError::QueueCreation { code: e.0 })?;

        let supports_fp64 = negotiate_fp64(&device, &platform);
        info!(
            "session open: {} on {} (fp64: {})",
            device_name, platform_name, supports_fp64
        );

        Ok(Self {
            queue,
            context,
            device,
            platform,
            platform_name,
            device_name,
            supports_fp64,
        })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_id(&self) -> cl_device_id {
        self.device.id()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// Whether fp64 negotiation passed for this device/platform pair.
    /// Always a definite answer; `false` covers failed queries too.
    pub fn supports_fp64(&self) -> bool {
        self.supports_fp64
    }

    /// Fail unless the session negotiated double precision.
    pub fn require_fp64(&self) -> Result<()> {
        if self.supports_fp64 {
            Ok(())
        } else {
            Err(OpenClError::PrecisionUnsupported { device: self.device_name.clone() })
        }
    }

    /// Multi-line key/value summary of the bound platform and device.
    pub fn describe(&self) -> String {
        let device = &self.device;
        let query_failed = || "<query failed>".to_string();

        let vendor_id = device.vendor_id().unwrap_or(0);
        let address_bits = device.address_bits().unwrap_or(0);
        let endianness = match device.endian_little() {
            Ok(false) => "Big-Endian",
            Ok(true) => "Little-Endian",
            Err(_) => "<query failed>",
        };

        let mut lines = Vec::with_capacity(12);
        lines.push(format!("Platform:        {}", self.platform_name));
        lines.push(format!(
            "Vendor:          {}",
            self.platform.vendor().unwrap_or_else(|_| query_failed())
        ));
        lines.push(format!(
            "Version:         {}",
            self.platform.version().unwrap_or_else(|_| query_failed())
        ));
        lines.push(format!(
            "Device:          {} ({})",
            self.device_name,
            device_type_name(device.dev_type().unwrap_or(0))
        ));
        lines.push(format!(
            "Device vendor:   {}",
            device.vendor().unwrap_or_else(|_| query_failed())
        ));
        lines.push(format!("Vendor id:       {vendor_id:#x} ({vendor_id})"));
        lines.push(format!(
            "Device version:  {}",
            device.version().unwrap_or_else(|_| query_failed())
        ));
        lines.push(format!(
            "Driver version:  {}",
            device.driver_version().unwrap_or_else(|_| query_failed())
        ));
        lines.push(format!("Endianness:      {endianness}, {address_bits} bits"));
        lines.push(format!("FP64:            {}", self.supports_fp64));
        lines.join("\n")
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("platform", &self.platform_name)
            .field("device", &self.device_name)
            .field("supports_fp64", &self.supports_fp64)
            .finish()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        debug!("session closed: {}", self.device_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These run silently green on machines without an OpenCL runtime.

    #[test]
    fn default_class_session_is_fully_formed() {
        let Ok(session) = DeviceSession::from_class(DeviceClass::Default) else { return };
        assert!(!session.device_name().is_empty());
        let summary = session.describe();
        assert!(summary.contains("Platform:"));
        assert!(summary.contains("FP64:"));
        assert!(summary.contains(session.device_name()));
    }

    #[test]
    fn selection_dispatch_matches_direct_constructors() {
        let by_selection = DeviceSession::from_selection(Selection::ByIndices {
            platform: 0,
            device: 0,
        });
        let direct = DeviceSession::from_indices(0, 0);
        match (by_selection, direct) {
            (Ok(a), Ok(b)) => assert_eq!(a.device_name(), b.device_name()),
            (Err(_), Err(_)) => {}
            _ => panic!("selection dispatch diverged from the direct constructor"),
        }
    }

    #[test]
    fn require_fp64_reflects_negotiation() {
        let Ok(session) = DeviceSession::from_class(DeviceClass::Default) else { return };
        if session.supports_fp64() {
            assert!(session.require_fp64().is_ok());
        } else {
            match session.require_fp64() {
                Err(OpenClError::PrecisionUnsupported { device }) => {
                    assert_eq!(device, session.device_name());
                }
                other => panic!("expected PrecisionUnsupported, got {other:?}"),
            }
        }
    }
}
