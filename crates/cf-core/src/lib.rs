//! # cf-core
//!
//! Core types and traits for curvefit.
//!
//! - [`Error`] / [`Result`] shared by every crate in the workspace
//! - column-major layout types ([`MatrixShape`], [`Transpose`], [`MultiplyConfig`])
//! - the [`LinalgBackend`] and [`ModelEvaluator`] traits
//!
//! ## Architecture
//!
//! The Jacobian estimators in cf-inference depend on these traits, NOT on
//! the concrete CPU/CUDA backends in cf-compute.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{DeviceBuffer, LinalgBackend, ModelEvaluator};
pub use types::{MatrixShape, MultiplyConfig, Transpose, check_exact_len, check_len};
