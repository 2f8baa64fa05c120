use anyhow::{Context, Result, ensure};
use cf_core::{LinalgBackend, MatrixShape, ModelEvaluator};
use cf_inference::{JacobianEstimator, StepScheme, fit_linear};
use cf_models::{DesignMatrix, LinearDesign, ModelKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::Commands;

/// Column-major matrix as read from `--input`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MatrixJson {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

pub(crate) fn run<B>(backend: &B, command: &Commands) -> Result<serde_json::Value>
where
    B: LinalgBackend,
    ModelKind: ModelEvaluator<B>,
    LinearDesign: DesignMatrix<B>,
{
    tracing::debug!(backend = backend.name(), "running command");
    match command {
        Commands::Eval { model, params, n } => cmd_eval(backend, *model, params, *n),
        Commands::Jacobian { model, params, n, step } => {
            cmd_jacobian(backend, *model, params, *n, *step)
        }
        Commands::Svd { input } => cmd_svd(backend, input),
        Commands::Linfit { input } => cmd_linfit(backend, input),
    }
}

fn cmd_eval<B>(backend: &B, model: ModelKind, params: &[f32], n: usize) -> Result<serde_json::Value>
where
    B: LinalgBackend,
    ModelKind: ModelEvaluator<B>,
{
    let mut out = backend.alloc_zeros(n)?;
    model.evaluate(backend, &mut out, params, n)?;
    let values = backend.download(&out)?;
    tracing::info!(model = %model, n, "evaluated");

    Ok(serde_json::json!({
        "model": model,
        "params": params,
        "n": n,
        "values": &values[..n],
    }))
}

fn cmd_jacobian<B>(
    backend: &B,
    model: ModelKind,
    params: &[f32],
    n: usize,
    step: StepScheme,
) -> Result<serde_json::Value>
where
    B: LinalgBackend,
    ModelKind: ModelEvaluator<B>,
{
    let mut params = params.to_vec();
    let k = params.len();
    let len = MatrixShape::new(n, k).len()?;
    let mut jac = backend.alloc_zeros(len)?;
    JacobianEstimator::new(step).estimate(backend, &model, &mut params, n, &mut jac)?;
    let jac = backend.download(&jac)?;
    tracing::info!(model = %model, step = %step, n, k, "jacobian estimated");

    let columns: Vec<&[f32]> = if n == 0 { Vec::new() } else { jac.chunks(n).collect() };
    Ok(serde_json::json!({
        "model": model,
        "step": step,
        "params": params,
        "n": n,
        "k": k,
        "columns": columns,
    }))
}

fn cmd_svd<B: LinalgBackend>(backend: &B, input: &PathBuf) -> Result<serde_json::Value> {
    let matrix: MatrixJson = read_json(input)?;
    let (m, n) = (matrix.rows, matrix.cols);
    ensure!(m > 0 && n > 0, "matrix must be non-empty, got {m}x{n}");
    let len = MatrixShape::new(m, n).len()?;
    ensure!(
        matrix.data.len() == len,
        "matrix data has {} values, expected rows*cols = {len}",
        matrix.data.len(),
    );
    let u_len = MatrixShape::new(m, m).len()?;
    let vt_len = MatrixShape::new(n, n).len()?;

    let a = backend.upload(&matrix.data)?;
    let mut u = backend.alloc_zeros(u_len)?;
    let mut s = backend.alloc_zeros(m.min(n))?;
    let mut vt = backend.alloc_zeros(vt_len)?;
    backend.svd(&a, &mut u, &mut s, &mut vt, m, n)?;
    tracing::info!(rows = m, cols = n, "svd complete");

    Ok(serde_json::json!({
        "rows": m,
        "cols": n,
        "singular_values": backend.download(&s)?,
        "u": backend.download(&u)?,
        "vt": backend.download(&vt)?,
    }))
}

fn cmd_linfit<B>(backend: &B, input: &PathBuf) -> Result<serde_json::Value>
where
    B: LinalgBackend,
    LinearDesign: DesignMatrix<B>,
{
    let y: Vec<f32> = read_json(input)?;
    let fit = fit_linear(backend, &y)?;
    tracing::info!(slope = fit.slope, intercept = fit.intercept, "linear fit complete");

    let mut value = serde_json::to_value(fit)?;
    value["n"] = serde_json::json!(y.len());
    Ok(value)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

pub(crate) fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
