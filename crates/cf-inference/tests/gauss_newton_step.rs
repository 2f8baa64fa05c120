//! End-to-end: Jacobian -> normal equations -> SVD solve.
//!
//! One Gauss-Newton step on an exactly linear problem must land on the
//! solution, which exercises every primitive the estimators feed.

use approx::assert_relative_eq;
use cf_compute::CpuBackend;
use cf_core::{LinalgBackend, ModelEvaluator, MultiplyConfig, Transpose};
use cf_inference::{DEFAULT_RCOND, JacobianEstimator, StepScheme, solve_svd};
use cf_models::{Affine, ModelKind, SingleExponential};

fn gauss_newton_step(
    backend: &CpuBackend,
    model: &dyn ModelEvaluator<CpuBackend>,
    scheme: StepScheme,
    params: &mut [f32],
    y: &[f32],
) -> Vec<f32> {
    let n = y.len();
    let k = params.len();

    let mut jac = backend.alloc_zeros(n * k).unwrap();
    JacobianEstimator::new(scheme).estimate(backend, model, params, n, &mut jac).unwrap();

    let mut fitted = backend.alloc_zeros(n).unwrap();
    model.evaluate(backend, &mut fitted, params, n).unwrap();
    let y_dev = backend.upload(y).unwrap();
    let mut residual = backend.alloc_zeros(n).unwrap();
    backend.subtract_into(&y_dev, &fitted, &mut residual, 0, n).unwrap();

    let jt = MultiplyConfig::new(k, n, k).with_transpose(Transpose::Yes, Transpose::No);
    let mut jtj = backend.alloc_zeros(k * k).unwrap();
    backend.multiply(&jac, &jac, &mut jtj, &jt).unwrap();

    let jt_r = MultiplyConfig::new(k, n, 1).with_transpose(Transpose::Yes, Transpose::No);
    let mut jtr = backend.alloc_zeros(k).unwrap();
    backend.multiply(&jac, &residual, &mut jtr, &jt_r).unwrap();

    let delta = solve_svd(backend, &jtj, &jtr, k, DEFAULT_RCOND).unwrap();
    params.iter().zip(&delta).map(|(p, d)| p + d).collect()
}

#[test]
fn affine_converges_in_one_step() {
    let backend = CpuBackend::new();
    let y: Vec<f32> = (0..20).map(|t| -1.5 * t as f32 + 4.0).collect();
    for scheme in [StepScheme::Fixed, StepScheme::Adaptive] {
        let mut params = [0.5f32, 0.5];
        let next = gauss_newton_step(&backend, &Affine, scheme, &mut params, &y);
        assert_eq!(params, [0.5, 0.5]);
        assert_relative_eq!(next[0], -1.5, epsilon = 1e-2);
        assert_relative_eq!(next[1], 4.0, epsilon = 1e-2);
    }
}

#[test]
fn exponential_step_reduces_residual() {
    let backend = CpuBackend::new();
    let truth = [2.0f32, 0.3, 1.0];
    let n = 30;
    let y: Vec<f32> = (0..n).map(|t| ModelKind::Exp1.value(&truth, t as f32).unwrap()).collect();

    let sse = |p: &[f32]| -> f32 {
        y.iter()
            .enumerate()
            .map(|(t, v)| {
                let r = v - ModelKind::Exp1.value(p, t as f32).unwrap();
                r * r
            })
            .sum()
    };

    let mut params = [1.8f32, 0.25, 1.1];
    let before = sse(&params);
    let next = gauss_newton_step(&backend, &SingleExponential, StepScheme::Adaptive, &mut params, &y);
    assert!(sse(&next) < before, "sse {} -> {}", before, sse(&next));
}
