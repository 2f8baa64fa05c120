//! # cf-compute
//!
//! Compute backends for curvefit.
//!
//! This crate provides implementations of the `LinalgBackend` trait:
//! - **CPU backend** (Rayon + nalgebra) - always available, reference semantics
//! - **CUDA backend** (NVIDIA, cuBLAS/cuSOLVER/NVRTC) - feature-gated
//!
//! ## Architecture
//!
//! The Jacobian estimators (cf-inference) depend on the `LinalgBackend`
//! trait from cf-core, NOT on concrete implementations. Every primitive the
//! CUDA backend offers is validated against the CPU backend in
//! `tests/cuda_parity.rs`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cpu;

pub use cpu::CpuBackend;

/// CUDA backend (requires `cuda` feature + NVIDIA GPU at runtime).
#[cfg(feature = "cuda")]
pub mod cuda;

#[cfg(feature = "cuda")]
pub use cuda::{CudaBackend, CudaOptions};

/// Names of the backends compiled into this build, CPU first.
pub fn available_backends() -> Vec<&'static str> {
    let mut names = vec!["cpu"];
    if cfg!(feature = "cuda") {
        names.push("cuda");
    }
    names
}
