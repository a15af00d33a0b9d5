//! Kernel source compilation.
//!
//! A [`ComputeProgram`] exists only in the built state: construction
//! compiles the source for the session's device and a failure surfaces the
//! backend's build log verbatim instead of a bare status code. A failure
//! the backend refuses to explain (an empty log) is reported as its own
//! anomaly so it is never mistaken for an ordinary compile error.

use opencl3::kernel::Kernel;
use opencl3::program::Program;
use tracing::debug;

use crate::error::{OpenClError, Result};
use crate::session::DeviceSession;

/// Fixed capacity of the option buffer handed to the backend compiler,
/// including the terminating NUL.
pub const BUILD_OPTIONS_CAPACITY: usize = 64;

/// Render the compiler options for a block size: exactly
/// `-DMATMUL_BLOCKSIZE=<n>`, nothing else.
///
/// The rendered string must fit [`BUILD_OPTIONS_CAPACITY`] with its
/// terminator; a size that cannot is refused outright rather than
/// truncated into a different option.
pub fn build_options(block_size: usize) -> Result<String> {
    let options = format!("-DMATMUL_BLOCKSIZE={block_size}");
    let needed = options.len() + 1;
    if needed > BUILD_OPTIONS_CAPACITY {
        return Err(OpenClError::BuildOptionsTooLong {
            needed,
            capacity: BUILD_OPTIONS_CAPACITY,
        });
    }
    Ok(options)
}

/// A program compiled and linked for one device.
#[derive(Debug)]
pub struct ComputeProgram {
    program: Program,
}

impl ComputeProgram {
    /// Compile `source` for the session's device with the given options.
    pub fn build(session: &DeviceSession, source: &str, options: &str) -> Result<Self> {
        let device_id = session.device_id();
        let mut program = Program::create_from_source(session.context(), source)
            .map_err(|e| OpenClError::Backend { op: "program creation", code: e.0 })?;

        if let Err(e) = program.build(&[device_id], options) {
            debug!("program build failed with backend code {}", e.0);
            let log = program
                .get_build_log(device_id)
                .map_err(|e| OpenClError::Backend { op: "build log retrieval", code: e.0 })?;
            let log = log.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            if log.is_empty() {
                return Err(OpenClError::EmptyDiagnostic);
            }
            return Err(OpenClError::BuildFailure { log: log.to_owned() });
        }

        debug!("program built with options {:?}", options);
        Ok(Self { program })
    }

    /// Instantiate a kernel entry point by name.
    pub fn kernel(&self, name: &'static str) -> Result<Kernel> {
        Kernel::create(&self.program, name)
            .map_err(|e| OpenClError::Backend { op: "kernel creation", code: e.0 })
    }
}
