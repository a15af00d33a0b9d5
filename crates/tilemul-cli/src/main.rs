//! tilemul CLI application
//!
//! Command-line driver for block-tiled matrix multiplication on OpenCL
//! devices: device selection, dimension planning, precision choice and an
//! optional CPU reference check.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use console::style;
use tracing::error;

use tilemul_core::parse::parse_size;
use tilemul_core::{DimensionSpec, PrecisionMode, Selection, SizeTriple};
use tilemul_opencl::{enumerate, execute, DeviceSession, DEFAULT_BLOCK_SIZE};

/// tilemul - block-tiled matrix multiplication on OpenCL devices
#[derive(Parser)]
#[command(name = "tilemul")]
#[command(about = "Block-tiled matrix multiplication on OpenCL devices")]
#[command(long_about = r#"
tilemul pads matrices to a uniform block size and multiplies them on an
OpenCL device with a tiled kernel, in single or double precision.

Examples:
  # Multiply 1000x1000x1000 on the first GPU
  tilemul matmul

  # Pick a device by explicit indices and check against the CPU
  tilemul matmul --device 0:1 --cpu-check

  # Double precision with 2 Ki square operands and 32-wide tiles
  tilemul matmul -m 2Ki,2Ki,2Ki -b 32 --double-precision

  # List every platform and device
  tilemul devices
"#)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tiled matrix multiplication
    #[command(alias = "mm")]
    Matmul(MatmulCommand),

    /// List OpenCL platforms and devices
    #[command(alias = "list")]
    Devices,
}

#[derive(Args)]
struct MatmulCommand {
    /// Device selector: GPU | CPU | Default | <platform>:<device>
    /// (keywords match case-insensitively by prefix)
    #[arg(short, long, default_value = "GPU")]
    device: Selection,

    /// Block (tile) edge length; must be even and non-zero
    #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE, value_parser = parse_size)]
    block_size: usize,

    /// Matrix sizes M,N,P with optional K/Ki/M/Mi/G/Gi suffixes
    #[arg(short, long, default_value = "1000,1000,1000", value_name = "M,N,P")]
    matrix_size: SizeTriple,

    /// Compute in double precision (fp64)
    #[arg(short = 'f', long)]
    double_precision: bool,

    /// Compare the device result against a CPU reference
    #[arg(short, long)]
    cpu_check: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Matmul(cmd)) => run_matmul(&cmd),
        Some(Commands::Devices) => list_devices(),
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);

        let mut source = e.source();
        while let Some(err) = source {
            error!("  Caused by: {}", err);
            source = err.source();
        }

        std::process::exit(1);
    }

    Ok(())
}

/// Route log verbosity through the standard env filter; the flag only
/// provides the fallback when `RUST_LOG` is unset.
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn run_matmul(cmd: &MatmulCommand) -> Result<()> {
    let spec = DimensionSpec::plan(cmd.matrix_size, cmd.block_size)
        .context("the requested dimensions cannot be planned")?;

    let session = DeviceSession::from_selection(cmd.device)
        .context("no usable device for the requested selector")?;
    println!("{}\n", session.describe());

    let precision = if cmd.double_precision {
        PrecisionMode::Double
    } else {
        PrecisionMode::Single
    };

    let report = execute(&session, &spec, precision, cmd.cpu_check)
        .context("matrix multiplication failed")?;
    println!("{}", report.summary());

    Ok(())
}

fn list_devices() -> Result<()> {
    let listings = enumerate().context("OpenCL platform enumeration failed")?;

    if listings.is_empty() {
        println!("No OpenCL platforms found.");
        return Ok(());
    }

    for platform in &listings {
        println!(
            "{} {}",
            style(format!("Platform {}:", platform.index)).bold().cyan(),
            platform.name
        );
        println!("  Vendor:  {}", platform.vendor);
        println!("  Version: {}", platform.version);

        if platform.devices.is_empty() {
            println!("  {}", style("(no devices)").dim());
        }
        for device in &platform.devices {
            println!(
                "  {} {} [{}]",
                style(format!("Device {}:", device.index)).bold(),
                device.name,
                device.class_name
            );
            println!("    Vendor: {}", device.vendor);
            if device.supports_fp64 {
                println!("    FP64:   {}", style("supported").green());
            } else {
                println!("    FP64:   {}", style("unsupported").red());
            }
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilemul_core::DeviceClass;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn matmul_defaults_match_the_documented_ones() {
        let cli = Cli::try_parse_from(["tilemul", "matmul"]).unwrap();
        let Some(Commands::Matmul(cmd)) = cli.command else {
            panic!("expected the matmul subcommand")
        };
        assert_eq!(cmd.device, Selection::ByClass(DeviceClass::Gpu));
        assert_eq!(cmd.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(cmd.matrix_size, SizeTriple::new(1000, 1000, 1000));
        assert!(!cmd.double_precision);
        assert!(!cmd.cpu_check);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn every_flag_parses_through_the_grammar() {
        let cli = Cli::try_parse_from([
            "tilemul", "matmul", "-d", "1:0", "-m", "1K,2Ki,3", "-b", "32", "-f", "-c", "-vv",
        ])
        .unwrap();
        let Some(Commands::Matmul(cmd)) = cli.command else {
            panic!("expected the matmul subcommand")
        };
        assert_eq!(cmd.device, Selection::ByIndices { platform: 1, device: 0 });
        assert_eq!(cmd.matrix_size, SizeTriple::new(1000, 2048, 3));
        assert_eq!(cmd.block_size, 32);
        assert!(cmd.double_precision);
        assert!(cmd.cpu_check);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn keyword_prefixes_select_classes() {
        let cli = Cli::try_parse_from(["tilemul", "matmul", "--device", "cp"]).unwrap();
        let Some(Commands::Matmul(cmd)) = cli.command else {
            panic!("expected the matmul subcommand")
        };
        assert_eq!(cmd.device, Selection::ByClass(DeviceClass::Cpu));
    }

    #[test]
    fn unrecognized_selector_fails_at_parse_time() {
        assert!(Cli::try_parse_from(["tilemul", "matmul", "-d", "fastest"]).is_err());
    }

    #[test]
    fn malformed_sizes_fail_at_parse_time() {
        assert!(Cli::try_parse_from(["tilemul", "matmul", "-m", "10,20"]).is_err());
        assert!(Cli::try_parse_from(["tilemul", "matmul", "-m", "10,20,x"]).is_err());
    }

    #[test]
    fn block_size_accepts_suffixes() {
        let cli = Cli::try_parse_from(["tilemul", "matmul", "-b", "1Ki"]).unwrap();
        let Some(Commands::Matmul(cmd)) = cli.command else {
            panic!("expected the matmul subcommand")
        };
        assert_eq!(cmd.block_size, 1024);
    }

    #[test]
    fn devices_subcommand_parses() {
        let cli = Cli::try_parse_from(["tilemul", "devices", "-v"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Devices)));
        assert_eq!(cli.verbose, 1);
    }
}
