use crate::{CurveModel, impl_evaluator};

/// Straight line `a·t + b`, params `[a, b]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affine;

impl CurveModel for Affine {
    const NAME: &'static str = "linear";
    const N_PARAMS: usize = 2;
    const KERNEL: &'static str = "affine_model";

    #[inline]
    fn value(params: &[f32], t: f32) -> f32 {
        params[0] * t + params[1]
    }
}

impl_evaluator!(Affine);
