//! # cf-models
//!
//! Parametric curve models for curvefit.
//!
//! Every model is evaluated over the sample domain `t = 0, 1, …, n-1` and
//! implements [`cf_core::ModelEvaluator`] for the CPU backend and, with the
//! `cuda` feature, for the CUDA backend (one NVRTC kernel per model, compiled
//! lazily through the backend's kernel cache).
//!
//! - [`Affine`]: `a·t + b`
//! - [`SingleExponential`]: `a·exp(−|k|·t) + b`
//! - [`DoubleExponential`]: `a1·exp(−|k1|·t) + a2·exp(−|k2|·t) + b`
//! - [`LinearDesign`]: the `N × 2` design matrix of the affine model
//! - [`ModelKind`]: runtime selection by name

#![warn(missing_docs)]
#![warn(clippy::all)]

use cf_core::{Error, Result};

/// Implement `ModelEvaluator` for every backend compiled in.
macro_rules! impl_evaluator {
    ($ty:ty) => {
        impl cf_core::ModelEvaluator<cf_compute::CpuBackend> for $ty {
            fn n_params(&self) -> usize {
                <$ty as $crate::CurveModel>::N_PARAMS
            }

            fn name(&self) -> &str {
                <$ty as $crate::CurveModel>::NAME
            }

            fn evaluate(
                &self,
                _backend: &cf_compute::CpuBackend,
                out: &mut Vec<f32>,
                params: &[f32],
                n: usize,
            ) -> cf_core::Result<()> {
                $crate::host::evaluate::<$ty>(out, params, n)
            }
        }

        #[cfg(feature = "cuda")]
        impl cf_core::ModelEvaluator<cf_compute::CudaBackend> for $ty {
            fn n_params(&self) -> usize {
                <$ty as $crate::CurveModel>::N_PARAMS
            }

            fn name(&self) -> &str {
                <$ty as $crate::CurveModel>::NAME
            }

            fn evaluate(
                &self,
                backend: &cf_compute::CudaBackend,
                out: &mut cudarc::driver::CudaSlice<f32>,
                params: &[f32],
                n: usize,
            ) -> cf_core::Result<()> {
                $crate::cuda::evaluate::<$ty>(backend, out, params, n)
            }
        }
    };
}

pub(crate) use impl_evaluator;

mod affine;
mod design;
mod exponential;
mod host;
mod kind;

#[cfg(feature = "cuda")]
mod cuda;

pub use affine::Affine;
pub use design::{DesignMatrix, LinearDesign};
pub use exponential::{DoubleExponential, SingleExponential};
pub use kind::ModelKind;

/// A closed-form model `f(t; params)` with a matching device kernel.
pub trait CurveModel: Send + Sync {
    /// Registry name.
    const NAME: &'static str;
    /// Parameter count.
    const N_PARAMS: usize;
    /// Name of the kernel in `kernels/models.cu`.
    const KERNEL: &'static str;

    /// Model value at `t`. `params` has exactly [`Self::N_PARAMS`] entries.
    fn value(params: &[f32], t: f32) -> f32;
}

pub(crate) fn check_params(name: &str, expected: usize, params: &[f32]) -> Result<()> {
    if params.len() != expected {
        return Err(Error::Validation(format!(
            "{name} expects {expected} params, got {}",
            params.len()
        )));
    }
    Ok(())
}
