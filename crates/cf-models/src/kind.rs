//! Runtime model selection.

use crate::{Affine, CurveModel, DoubleExponential, SingleExponential};
use cf_compute::CpuBackend;
use cf_core::{Error, ModelEvaluator, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the built-in models, chosen by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// [`Affine`]
    Linear,
    /// [`SingleExponential`]
    Exp1,
    /// [`DoubleExponential`]
    Exp2,
}

impl ModelKind {
    /// All built-in models.
    pub const ALL: [ModelKind; 3] = [ModelKind::Linear, ModelKind::Exp1, ModelKind::Exp2];

    /// Look up a model by its registry name (`linear`, `exp1`, `exp2`).
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|k| k.as_str()).collect();
            Error::Validation(format!("unknown model '{name}' (expected one of {known:?})"))
        })
    }

    /// Registry name.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Linear => Affine::NAME,
            ModelKind::Exp1 => SingleExponential::NAME,
            ModelKind::Exp2 => DoubleExponential::NAME,
        }
    }

    /// Number of parameters the model expects.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Linear => Affine::N_PARAMS,
            ModelKind::Exp1 => SingleExponential::N_PARAMS,
            ModelKind::Exp2 => DoubleExponential::N_PARAMS,
        }
    }

    /// Evaluate on the host without going through a backend buffer.
    pub fn value(self, params: &[f32], t: f32) -> Result<f32> {
        crate::check_params(self.as_str(), self.param_count(), params)?;
        Ok(match self {
            ModelKind::Linear => Affine::value(params, t),
            ModelKind::Exp1 => SingleExponential::value(params, t),
            ModelKind::Exp2 => DoubleExponential::value(params, t),
        })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

macro_rules! dispatch {
    ($kind:expr, $model:ident => $body:expr) => {
        match $kind {
            ModelKind::Linear => {
                let $model = Affine;
                $body
            }
            ModelKind::Exp1 => {
                let $model = SingleExponential;
                $body
            }
            ModelKind::Exp2 => {
                let $model = DoubleExponential;
                $body
            }
        }
    };
}

impl ModelEvaluator<CpuBackend> for ModelKind {
    fn n_params(&self) -> usize {
        self.param_count()
    }

    fn name(&self) -> &str {
        self.as_str()
    }

    fn evaluate(
        &self,
        backend: &CpuBackend,
        out: &mut Vec<f32>,
        params: &[f32],
        n: usize,
    ) -> Result<()> {
        dispatch!(self, m => m.evaluate(backend, out, params, n))
    }
}

#[cfg(feature = "cuda")]
impl ModelEvaluator<cf_compute::CudaBackend> for ModelKind {
    fn n_params(&self) -> usize {
        self.param_count()
    }

    fn name(&self) -> &str {
        self.as_str()
    }

    fn evaluate(
        &self,
        backend: &cf_compute::CudaBackend,
        out: &mut cudarc::driver::CudaSlice<f32>,
        params: &[f32],
        n: usize,
    ) -> Result<()> {
        dispatch!(self, m => m.evaluate(backend, out, params, n))
    }
}
