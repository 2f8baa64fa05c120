//! # cf-inference
//!
//! Numerical building blocks for curve fitting on a [`cf_core::LinalgBackend`]:
//!
//! - [`jacobian`]: forward-difference Jacobian estimation with fixed or
//!   adaptive steps, evaluated on the backend.
//! - [`linear`]: SVD-based least squares for the linear model.
//!
//! The nonlinear fitting loop itself (damping, step acceptance, convergence)
//! is left to the caller.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod jacobian;
pub mod linear;

pub use jacobian::{
    JacobianEstimator, StepScheme, adaptive_step, estimate_jacobian_adaptive,
    estimate_jacobian_fixed,
};
pub use linear::{DEFAULT_RCOND, LinearFit, fit_linear, solve_svd};
