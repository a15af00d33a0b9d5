//! End-to-end matrix-multiplication driver.
//!
//! One host thread drives the whole pipeline: build the program for the
//! planned block size, fill host operands with a deterministic pattern,
//! upload, launch one work-item per padded output element, wait, read the
//! result back, and optionally compare it against the CPU reference. The
//! command queue is the only point of asynchrony and every transfer is
//! blocking, so completion of a step is established before the next one
//! starts.

use std::time::Duration;

use opencl3::event::Event;
use opencl3::kernel::ExecuteKernel;
use tilemul_core::{DimensionSpec, PrecisionMode};
use tracing::{debug, info};

use crate::buffer::{AccessMode, OperandBuffer};
use crate::element::ClElement;
use crate::error::{OpenClError, Result};
use crate::kernels::MATMUL_TILED_SRC;
use crate::program::{build_options, ComputeProgram};
use crate::reference::{ref_matmul, verify};
use crate::session::DeviceSession;

/// Phase offsets separating the two operand fill patterns.
const PHASE_A: f64 = 0.0;
const PHASE_B: f64 = 1.0;

/// What a completed run looked like.
#[derive(Debug, Clone)]
pub struct MatmulReport {
    pub device: String,
    pub precision: PrecisionMode,
    pub spec: DimensionSpec,
    pub waste_bytes: u64,
    pub kernel_duration: Option<Duration>,
    pub checked: bool,
}

impl MatmulReport {
    /// Multi-line key/value summary of the run.
    pub fn summary(&self) -> String {
        let spec = &self.spec;
        let mut lines = Vec::with_capacity(9);
        lines.push(format!("Device:          {}", self.device));
        lines.push(format!("Block size:      {}", spec.block_size()));
        lines.push(format!("M dimension:     {} (+{})", spec.m(), spec.padding_m()));
        lines.push(format!("N dimension:     {} (+{})", spec.n(), spec.padding_n()));
        lines.push(format!("P dimension:     {} (+{})", spec.p(), spec.padding_p()));
        lines.push(format!("Padding waste:   {}", format_bytes(self.waste_bytes)));
        lines.push(format!("Precision:       {}", self.precision));
        lines.push(match self.kernel_duration {
            Some(d) => format!("Kernel time:     {:.3} ms", d.as_secs_f64() * 1e3),
            None => "Kernel time:     <unavailable>".to_string(),
        });
        lines.push(format!(
            "CPU check:       {}",
            if self.checked { "passed" } else { "skipped" }
        ));
        lines.join("\n")
    }
}

/// Run one tiled multiplication at the requested precision.
///
/// Requesting [`PrecisionMode::Double`] on a session that did not
/// negotiate fp64 fails before any per-operation device resource is
/// created; there is no silent downgrade to single precision.
pub fn execute(
    session: &DeviceSession,
    spec: &DimensionSpec,
    precision: PrecisionMode,
    cpu_check: bool,
) -> Result<MatmulReport> {
    match precision {
        PrecisionMode::Single => run_matmul::<f32>(session, spec, cpu_check),
        PrecisionMode::Double => {
            session.require_fp64()?;
            run_matmul::<f64>(session, spec, cpu_check)
        }
    }
}

fn run_matmul<T: ClElement>(
    session: &DeviceSession,
    spec: &DimensionSpec,
    cpu_check: bool,
) -> Result<MatmulReport> {
    info!(
        "matmul {}x{}x{} (block {}, {}) on {}",
        spec.m(),
        spec.n(),
        spec.p(),
        spec.block_size(),
        T::PRECISION,
        session.device_name()
    );

    let options = build_options(spec.block_size())?;
    let program = ComputeProgram::build(session, MATMUL_TILED_SRC, &options)?;
    let kernel = program.kernel(T::KERNEL_NAME)?;

    let mut host_a =
        OperandBuffer::<T>::host(spec.m(), spec.padding_m(), spec.n(), spec.padding_n())?;
    let mut host_b =
        OperandBuffer::<T>::host(spec.n(), spec.padding_n(), spec.p(), spec.padding_p())?;
    fill_operand(&mut host_a, PHASE_A)?;
    fill_operand(&mut host_b, PHASE_B)?;

    let mut dev_a = OperandBuffer::<T>::device(
        session,
        spec.m(),
        spec.padding_m(),
        spec.n(),
        spec.padding_n(),
        AccessMode::ReadOnly,
    )?;
    let mut dev_b = OperandBuffer::<T>::device(
        session,
        spec.n(),
        spec.padding_n(),
        spec.p(),
        spec.padding_p(),
        AccessMode::ReadOnly,
    )?;
    let dev_c = OperandBuffer::<T>::device(
        session,
        spec.m(),
        spec.padding_m(),
        spec.p(),
        spec.padding_p(),
        AccessMode::WriteOnly,
    )?;

    dev_a.write_from(session, host_a.as_slice()?)?;
    dev_b.write_from(session, host_b.as_slice()?)?;

    let m_arg = work_size_arg("m", spec.padded_m())?;
    let n_arg = work_size_arg("n", spec.padded_n())?;
    let p_arg = work_size_arg("p", spec.padded_p())?;
    let a_mem = dev_a.mem()?;
    let b_mem = dev_b.mem()?;
    let c_mem = dev_c.mem()?;

    let launch_failed = |reason: String| OpenClError::KernelLaunch {
        kernel: T::KERNEL_NAME,
        reason,
    };

    let event = unsafe {
        let mut exec = ExecuteKernel::new(&kernel);
        exec.set_arg(&a_mem)
            .set_arg(&b_mem)
            .set_arg(&c_mem)
            .set_arg(&m_arg)
            .set_arg(&n_arg)
            .set_arg(&p_arg)
            .set_global_work_sizes(&[spec.padded_m(), spec.padded_p()])
            .set_local_work_sizes(&[spec.block_size(), spec.block_size()]);
        exec.enqueue_nd_range(session.queue())
            .map_err(|e| launch_failed(e.to_string()))?
    };
    event.wait().map_err(|e| launch_failed(format!("wait: {e}")))?;

    let kernel_duration = profiled_duration(&event);
    if let Some(d) = kernel_duration {
        debug!("kernel {} completed in {:?}", T::KERNEL_NAME, d);
    }

    let mut result = vec![T::default(); dev_c.len()];
    dev_c.read_into(session, &mut result)?;

    if cpu_check {
        let mut want = vec![T::default(); result.len()];
        ref_matmul(spec, host_a.as_slice()?, host_b.as_slice()?, &mut want);
        verify(spec, &result, &want)?;
        debug!("device result matches the reference");
    }

    Ok(MatmulReport {
        device: session.device_name().to_string(),
        precision: T::PRECISION,
        spec: *spec,
        waste_bytes: spec.padding_waste_bytes(T::PRECISION),
        kernel_duration,
        checked: cpu_check,
    })
}

/// Fill the logical region of a host operand with a bounded deterministic
/// pattern; the padding region stays zero so padded tiles contribute
/// nothing to the product.
fn fill_operand<T: ClElement>(buf: &mut OperandBuffer<T>, phase: f64) -> Result<()> {
    let rows = buf.rows();
    let cols = buf.cols();
    let ld = buf.padded_cols();
    let data = buf.as_mut_slice()?;
    for r in 0..rows {
        for c in 0..cols {
            let k = (r * cols + c) as f64;
            data[r * ld + c] = T::from_f64((k * 0.1 + phase).sin());
        }
    }
    Ok(())
}

/// Padded extents travel to the kernel as 32-bit values.
fn work_size_arg(what: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| OpenClError::WorkSizeOverflow { what, value })
}

/// Kernel wall time from the profiling counters, when the queue reports
/// them.
fn profiled_duration(event: &Event) -> Option<Duration> {
    let start = event.profiling_command_start().ok()?;
    let end = event.profiling_command_end().ok()?;
    Some(Duration::from_nanos(end.saturating_sub(start)))
}

/// Render a byte count with the largest binary unit it reaches.
#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const SCALES: [(u64, &str); 3] = [(1 << 30, "GB"), (1 << 20, "MB"), (1 << 10, "KB")];
    for (scale, unit) in SCALES {
        if bytes >= scale {
            return format!("{:.2} {unit}", bytes as f64 / scale as f64);
        }
    }
    format!("{bytes} B")
}
