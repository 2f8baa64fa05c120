//! Device model kernels agree with the host formulas.
//!
//! Run with: `cargo test -p cf-models --features cuda --test cuda_models`

#![cfg(feature = "cuda")]

use cf_compute::{CpuBackend, CudaBackend};
use cf_core::{LinalgBackend, ModelEvaluator};
use cf_models::{DesignMatrix, LinearDesign, ModelKind};

fn gpu() -> Option<CudaBackend> {
    if !CudaBackend::is_available() {
        eprintln!("CUDA not available, skipping");
        return None;
    }
    CudaBackend::new().ok()
}

#[test]
fn every_model_matches_cpu() {
    let Some(gpu) = gpu() else { return };
    let cpu = CpuBackend::new();
    let n = 513;
    let cases: [(ModelKind, &[f32]); 3] = [
        (ModelKind::Linear, &[2.0, 3.0]),
        (ModelKind::Exp1, &[2.0, -0.05, 1.0]),
        (ModelKind::Exp2, &[3.0, 0.02, -1.0, 0.3, 0.5]),
    ];
    for (kind, params) in cases {
        let mut host = vec![0.0; n];
        kind.evaluate(&cpu, &mut host, params, n).unwrap();

        let mut dev = gpu.alloc_zeros(n).unwrap();
        kind.evaluate(&gpu, &mut dev, params, n).unwrap();
        let dev = gpu.download(&dev).unwrap();

        for (i, (d, h)) in dev.iter().zip(&host).enumerate() {
            assert!((d - h).abs() <= 1e-5 * (1.0 + h.abs()), "{kind} t={i}: gpu={d} cpu={h}");
        }
    }
}

#[test]
fn design_matrix_matches_cpu() {
    let Some(gpu) = gpu() else { return };
    let cpu = CpuBackend::new();
    let n = 300;
    let mut host = vec![0.0; 2 * n];
    LinearDesign.build(&cpu, &mut host, n).unwrap();
    let mut dev = gpu.alloc_zeros(2 * n).unwrap();
    LinearDesign.build(&gpu, &mut dev, n).unwrap();
    assert_eq!(gpu.download(&dev).unwrap(), host);
}
