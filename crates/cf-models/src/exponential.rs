//! Decaying exponentials with a constant offset.
//!
//! Rates enter as `−|k|`, so both signs of `k` describe the same decay and
//! the model stays bounded on the whole domain.

use crate::{CurveModel, impl_evaluator};

/// `a·exp(−|k|·t) + b`, params `[a, k, b]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleExponential;

impl CurveModel for SingleExponential {
    const NAME: &'static str = "exp1";
    const N_PARAMS: usize = 3;
    const KERNEL: &'static str = "exp1_model";

    #[inline]
    fn value(params: &[f32], t: f32) -> f32 {
        params[0] * (-params[1].abs() * t).exp() + params[2]
    }
}

/// `a1·exp(−|k1|·t) + a2·exp(−|k2|·t) + b`, params `[a1, k1, a2, k2, b]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DoubleExponential;

impl CurveModel for DoubleExponential {
    const NAME: &'static str = "exp2";
    const N_PARAMS: usize = 5;
    const KERNEL: &'static str = "exp2_model";

    #[inline]
    fn value(params: &[f32], t: f32) -> f32 {
        params[0] * (-params[1].abs() * t).exp()
            + params[2] * (-params[3].abs() * t).exp()
            + params[4]
    }
}

impl_evaluator!(SingleExponential);
impl_evaluator!(DoubleExponential);
