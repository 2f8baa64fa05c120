//! curvefit CLI

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

use cf_inference::StepScheme;
use cf_models::ModelKind;

#[derive(Parser)]
#[command(name = "curvefit")]
#[command(about = "curvefit - finite-difference Jacobians and dense linear algebra on CPU/GPU")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Compute backend
    #[arg(long, global = true, value_enum, default_value_t = BackendArg::Cpu)]
    backend: BackendArg,

    /// CUDA device ordinal (only with `--backend cuda`)
    #[arg(long, global = true, default_value = "0")]
    device: usize,

    /// Output file for results (pretty JSON). Defaults to stdout.
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendArg {
    Cpu,
    Cuda,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a model over t = 0..n-1
    Eval {
        /// Model name (linear, exp1, exp2)
        #[arg(long, value_parser = parse_model)]
        model: ModelKind,

        /// Comma-separated parameter values
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        params: Vec<f32>,

        /// Number of samples
        #[arg(long)]
        n: usize,
    },

    /// Estimate the N x K Jacobian of a model by forward differences
    Jacobian {
        /// Model name (linear, exp1, exp2)
        #[arg(long, value_parser = parse_model)]
        model: ModelKind,

        /// Comma-separated parameter values
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        params: Vec<f32>,

        /// Number of samples
        #[arg(long)]
        n: usize,

        /// Step scheme (fixed, adaptive)
        #[arg(long, value_parser = parse_step, default_value = "fixed")]
        step: StepScheme,
    },

    /// Full SVD of a column-major matrix
    Svd {
        /// Input matrix JSON: {"rows", "cols", "data"} (column-major)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Least-squares line through samples y[t], t = 0..n-1
    Linfit {
        /// Input JSON array of y values
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn parse_model(s: &str) -> std::result::Result<ModelKind, String> {
    ModelKind::from_name(s).map_err(|e| e.to_string())
}

fn parse_step(s: &str) -> std::result::Result<StepScheme, String> {
    s.parse().map_err(|e: cf_core::Error| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    let value = match cli.backend {
        BackendArg::Cpu => {
            let backend = cf_compute::CpuBackend::new();
            commands::run(&backend, &cli.command)?
        }
        BackendArg::Cuda => run_cuda(cli.device, &cli.command)?,
    };

    commands::write_json(cli.output.as_ref(), value)
}

#[cfg(feature = "cuda")]
fn run_cuda(device_id: usize, command: &Commands) -> Result<serde_json::Value> {
    use anyhow::Context;

    if !cf_compute::CudaBackend::is_available() {
        anyhow::bail!("CUDA requested but no CUDA device is available");
    }
    let backend = cf_compute::CudaBackend::with_options(&cf_compute::CudaOptions { device_id })
        .with_context(|| format!("initialising CUDA device {device_id}"))?;
    tracing::info!(device = device_id, arch = backend.arch(), "CUDA backend ready");
    commands::run(&backend, command)
}

#[cfg(not(feature = "cuda"))]
fn run_cuda(_device_id: usize, _command: &Commands) -> Result<serde_json::Value> {
    anyhow::bail!("curvefit was built without the `cuda` feature")
}
