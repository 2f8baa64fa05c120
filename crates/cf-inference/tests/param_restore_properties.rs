//! Both step schemes hand the parameter vector back bit for bit.

use cf_compute::CpuBackend;
use cf_core::LinalgBackend;
use cf_inference::{JacobianEstimator, StepScheme};
use cf_models::ModelKind;
use proptest::prelude::*;

fn param() -> impl Strategy<Value = f32> {
    prop_oneof![
        Just(0.0f32),
        Just(-0.0f32),
        Just(1e-35f32),
        -50.0f32..50.0,
        -1e6f32..1e6,
    ]
}

fn model_and_params() -> impl Strategy<Value = (ModelKind, Vec<f32>)> {
    prop::sample::select(ModelKind::ALL.to_vec())
        .prop_flat_map(|kind| (Just(kind), prop::collection::vec(param(), kind.param_count())))
}

fn scheme() -> impl Strategy<Value = StepScheme> {
    prop_oneof![Just(StepScheme::Fixed), Just(StepScheme::Adaptive)]
}

proptest! {
    #[test]
    fn params_are_restored_exactly(
        (kind, original) in model_and_params(),
        scheme in scheme(),
        n in 0usize..24,
    ) {
        let backend = CpuBackend::new();
        let mut params = original.clone();
        let mut jac = backend.alloc_zeros(n * params.len()).unwrap();
        JacobianEstimator::new(scheme)
            .estimate(&backend, &kind, &mut params, n, &mut jac)
            .unwrap();

        let before: Vec<u32> = original.iter().map(|p| p.to_bits()).collect();
        let after: Vec<u32> = params.iter().map(|p| p.to_bits()).collect();
        prop_assert_eq!(after, before);
    }
}
