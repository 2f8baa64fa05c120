//! Forward-difference Jacobian estimation on a compute backend.
//!
//! For a model `f: R^K -> R^N` evaluated on the backend, column `i` of the
//! `N × K` column-major Jacobian is
//!
//! ```text
//! J[:, i] = (f(p + h_i · e_i) - f(p)) / h_i
//! ```
//!
//! One baseline evaluation plus `K` perturbed evaluations are performed, with
//! exactly two `N`-length scratch buffers alive for the whole call. The
//! subtraction and rescaling run on the backend, so for the CUDA backend the
//! model output never leaves the device.
//!
//! Two step schemes are available:
//! - [`StepScheme::Fixed`]: `h = 2^-17` for every parameter, one rescale of
//!   the whole matrix at the end.
//! - [`StepScheme::Adaptive`]: `h_i = 2^-10 · p_i`, clamped to [`MIN_STEP`]
//!   when `|h_i|` falls below it, each column rescaled right after its
//!   subtraction.
//!
//! `params` is perturbed in place and restored bit-exactly before the next
//! column, including when the model evaluation fails.

use cf_core::{DeviceBuffer, Error, LinalgBackend, ModelEvaluator, Result, check_exact_len};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Step used by [`StepScheme::Fixed`] (`2^-17`).
pub const FIXED_STEP: f32 = 1.0 / 131_072.0;

/// Relative step used by [`StepScheme::Adaptive`] (`2^-10`).
pub const ADAPTIVE_RELATIVE_STEP: f32 = 1.0 / 1024.0;

/// Smallest adaptive step magnitude.
pub const MIN_STEP: f32 = 1e-30;

/// How the finite-difference step is chosen per parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepScheme {
    /// Constant absolute step [`FIXED_STEP`].
    #[default]
    Fixed,
    /// Step proportional to the parameter, see [`adaptive_step`].
    Adaptive,
}

impl StepScheme {
    /// Step for a parameter currently at `param`.
    pub fn step(self, param: f32) -> f32 {
        match self {
            StepScheme::Fixed => FIXED_STEP,
            StepScheme::Adaptive => adaptive_step(param),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            StepScheme::Fixed => "fixed",
            StepScheme::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for StepScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fixed" => Ok(StepScheme::Fixed),
            "adaptive" => Ok(StepScheme::Adaptive),
            other => Err(Error::Validation(format!(
                "unknown step scheme '{other}' (expected 'fixed' or 'adaptive')"
            ))),
        }
    }
}

/// `2^-10 · param`, replaced by [`MIN_STEP`] when its magnitude is below it.
///
/// The replacement is the positive constant regardless of the sign of
/// `param`, so the step is never zero.
pub fn adaptive_step(param: f32) -> f32 {
    let h = ADAPTIVE_RELATIVE_STEP * param;
    if h.abs() < MIN_STEP { MIN_STEP } else { h }
}

/// `1 / h` computed in `f64` and rounded once to `f32`.
pub fn reciprocal_step(h: f32) -> f32 {
    (1.0 / f64::from(h)) as f32
}

/// Jacobian estimator with a runtime-selected step scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JacobianEstimator {
    scheme: StepScheme,
}

impl JacobianEstimator {
    /// Create an estimator with the given scheme.
    pub fn new(scheme: StepScheme) -> Self {
        Self { scheme }
    }

    /// Configured step scheme.
    pub fn scheme(&self) -> StepScheme {
        self.scheme
    }

    /// Fill `jacobian` (`n × params.len()`, column-major) for `model` at `params`.
    pub fn estimate<B, M>(
        &self,
        backend: &B,
        model: &M,
        params: &mut [f32],
        n: usize,
        jacobian: &mut B::Buffer,
    ) -> Result<()>
    where
        B: LinalgBackend,
        M: ModelEvaluator<B> + ?Sized,
    {
        estimate(backend, model, params, n, jacobian, self.scheme)
    }
}

/// Forward-difference Jacobian with the constant step [`FIXED_STEP`].
pub fn estimate_jacobian_fixed<B, M>(
    backend: &B,
    model: &M,
    params: &mut [f32],
    n: usize,
    jacobian: &mut B::Buffer,
) -> Result<()>
where
    B: LinalgBackend,
    M: ModelEvaluator<B> + ?Sized,
{
    estimate(backend, model, params, n, jacobian, StepScheme::Fixed)
}

/// Forward-difference Jacobian with per-parameter steps from [`adaptive_step`].
pub fn estimate_jacobian_adaptive<B, M>(
    backend: &B,
    model: &M,
    params: &mut [f32],
    n: usize,
    jacobian: &mut B::Buffer,
) -> Result<()>
where
    B: LinalgBackend,
    M: ModelEvaluator<B> + ?Sized,
{
    estimate(backend, model, params, n, jacobian, StepScheme::Adaptive)
}

/// One coordinate of `params` perturbed for the lifetime of the value.
struct Probe<'a> {
    params: &'a mut [f32],
    index: usize,
    saved: f32,
}

impl<'a> Probe<'a> {
    fn perturb(params: &'a mut [f32], index: usize, step: f32) -> Self {
        let saved = params[index];
        params[index] = saved + step;
        Self { params, index, saved }
    }

    fn params(&self) -> &[f32] {
        self.params
    }
}

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        self.params[self.index] = self.saved;
    }
}

fn estimate<B, M>(
    backend: &B,
    model: &M,
    params: &mut [f32],
    n: usize,
    jacobian: &mut B::Buffer,
    scheme: StepScheme,
) -> Result<()>
where
    B: LinalgBackend,
    M: ModelEvaluator<B> + ?Sized,
{
    let k = params.len();
    if k != model.n_params() {
        return Err(Error::Validation(format!(
            "{}: expected {} params, got {k}",
            model.name(),
            model.n_params()
        )));
    }
    let total = n
        .checked_mul(k)
        .ok_or_else(|| Error::Validation(format!("jacobian {n}x{k} overflows usize")))?;
    check_exact_len("jacobian", jacobian.len(), total)?;
    if total == 0 {
        return Ok(());
    }

    let mut baseline = backend.alloc_zeros(n)?;
    let mut perturbed = backend.alloc_zeros(n)?;

    model.evaluate(backend, &mut baseline, params, n)?;

    for i in 0..k {
        let step = scheme.step(params[i]);
        {
            let probe = Probe::perturb(params, i, step);
            model.evaluate(backend, &mut perturbed, probe.params(), n)?;
        }
        backend.subtract_into(&perturbed, &baseline, jacobian, i * n, n)?;
        if scheme == StepScheme::Adaptive {
            backend.scale(jacobian, i * n, n, reciprocal_step(step))?;
        }
    }

    if scheme == StepScheme::Fixed {
        backend.scale(jacobian, 0, total, reciprocal_step(FIXED_STEP))?;
    }

    backend.synchronize()?;

    if log::log_enabled!(log::Level::Debug) {
        log_non_finite_columns(backend, jacobian, n, k)?;
    }
    Ok(())
}

fn log_non_finite_columns<B: LinalgBackend>(
    backend: &B,
    jacobian: &B::Buffer,
    n: usize,
    k: usize,
) -> Result<()> {
    let host = backend.download(jacobian)?;
    for (i, col) in host.chunks(n).take(k).enumerate() {
        let bad = col.iter().filter(|v| !v.is_finite()).count();
        if bad > 0 {
            log::debug!("jacobian column {i}: {bad}/{n} non-finite entries");
        }
    }
    Ok(())
}
