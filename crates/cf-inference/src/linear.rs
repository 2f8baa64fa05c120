//! Closed-form least squares through the backend SVD.
//!
//! The normal equations `XᵀX β = Xᵀy` are formed with `multiply` and solved
//! with the pseudo-inverse `V · diag(1/s) · Uᵀ`, dropping singular values
//! below `rcond · s_max`.

use cf_core::{Error, LinalgBackend, MultiplyConfig, Result, Transpose, check_exact_len};
use cf_models::{DesignMatrix, LinearDesign};
use serde::{Deserialize, Serialize};

/// Default relative cutoff for small singular values.
pub const DEFAULT_RCOND: f32 = 1e-6;

/// Result of [`fit_linear`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Coefficient of `t`.
    pub slope: f32,
    /// Constant term.
    pub intercept: f32,
    /// Root-mean-square residual over the samples.
    pub rmse: f32,
}

impl LinearFit {
    /// Fitted value at `t`.
    pub fn predict(&self, t: f32) -> f32 {
        self.slope * t + self.intercept
    }
}

/// Solve the `n × n` system `A x = b` with the SVD pseudo-inverse.
///
/// Singular values `s_i <= rcond · s_max` are treated as zero, so rank
/// deficient systems return the minimum-norm solution.
pub fn solve_svd<B: LinalgBackend>(
    backend: &B,
    a: &B::Buffer,
    b: &B::Buffer,
    n: usize,
    rcond: f32,
) -> Result<Vec<f32>> {
    if n == 0 {
        return Err(Error::Validation("solve_svd: empty system".into()));
    }
    if !(rcond.is_finite() && rcond >= 0.0) {
        return Err(Error::Validation(format!("solve_svd: invalid rcond {rcond}")));
    }

    let mut u = backend.alloc_zeros(n * n)?;
    let mut s = backend.alloc_zeros(n)?;
    let mut vt = backend.alloc_zeros(n * n)?;
    backend.svd(a, &mut u, &mut s, &mut vt, n, n)?;

    let s_host = backend.download(&s)?;
    let s_max = s_host.first().copied().unwrap_or(0.0);
    let cutoff = rcond * s_max;
    let inv_s: Vec<f32> =
        s_host.iter().map(|&v| if v > cutoff && v > 0.0 { 1.0 / v } else { 0.0 }).collect();
    let dropped = inv_s.iter().filter(|&&v| v == 0.0).count();
    if dropped > 0 {
        log::debug!("solve_svd: dropped {dropped}/{n} singular values below {cutoff:e}");
    }
    let inv_s = backend.upload(&inv_s)?;

    // x = Vᵀᵀ · diag(1/s) · Uᵀ · b
    let mut utb = backend.alloc_zeros(n)?;
    let cfg = MultiplyConfig::new(n, n, 1).with_transpose(Transpose::Yes, Transpose::No);
    backend.multiply(&u, b, &mut utb, &cfg)?;

    let mut scaled = backend.alloc_zeros(n)?;
    backend.multiply_diagonal(&inv_s, &utb, &mut scaled, n, 1)?;

    let mut x = backend.alloc_zeros(n)?;
    backend.multiply(&vt, &scaled, &mut x, &cfg)?;

    backend.download(&x)
}

/// Fit `y[t] ≈ slope · t + intercept` over `t = 0..y.len()`.
pub fn fit_linear<B>(backend: &B, y: &[f32]) -> Result<LinearFit>
where
    B: LinalgBackend,
    LinearDesign: DesignMatrix<B>,
{
    let n = y.len();
    if n < 2 {
        return Err(Error::Validation(format!("fit_linear needs at least 2 samples, got {n}")));
    }

    let shape = LinearDesign::shape(n);
    let mut x = backend.alloc_zeros(shape.len()?)?;
    LinearDesign.build(backend, &mut x, n)?;
    let y_dev = backend.upload(y)?;

    let mut xtx = backend.alloc_zeros(4)?;
    backend.multiply(
        &x,
        &x,
        &mut xtx,
        &MultiplyConfig::new(2, n, 2).with_transpose(Transpose::Yes, Transpose::No),
    )?;
    let mut xty = backend.alloc_zeros(2)?;
    backend.multiply(
        &x,
        &y_dev,
        &mut xty,
        &MultiplyConfig::new(2, n, 1).with_transpose(Transpose::Yes, Transpose::No),
    )?;

    let coef = solve_svd(backend, &xtx, &xty, 2, DEFAULT_RCOND)?;
    check_exact_len("fit_linear coefficients", coef.len(), 2)?;
    let (slope, intercept) = (coef[0], coef[1]);

    let sse: f64 = y
        .iter()
        .enumerate()
        .map(|(t, &v)| {
            let r = f64::from(v) - (f64::from(slope) * t as f64 + f64::from(intercept));
            r * r
        })
        .sum();
    let rmse = (sse / n as f64).sqrt() as f32;

    log::debug!("fit_linear: n={n} slope={slope} intercept={intercept} rmse={rmse}");
    Ok(LinearFit { slope, intercept, rmse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cf_compute::CpuBackend;

    #[test]
    fn solves_diagonal_system() {
        let backend = CpuBackend::new();
        // A = diag(2, 4), b = [2, 8] -> x = [1, 2]
        let a = vec![2.0, 0.0, 0.0, 4.0];
        let b = vec![2.0, 8.0];
        let x = solve_svd(&backend, &a, &b, 2, DEFAULT_RCOND).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-5);
    }

    #[test]
    fn solves_general_system() {
        let backend = CpuBackend::new();
        // A = [[1, 2], [3, 4]] column-major, x = [1, -1] -> b = [-1, -1]
        let a = vec![1.0, 3.0, 2.0, 4.0];
        let b = vec![-1.0, -1.0];
        let x = solve_svd(&backend, &a, &b, 2, DEFAULT_RCOND).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(x[1], -1.0, epsilon = 1e-4);
    }

    #[test]
    fn singular_system_gives_minimum_norm() {
        let backend = CpuBackend::new();
        // A = [[1, 1], [1, 1]], b = [2, 2] -> minimum-norm x = [1, 1]
        let a = vec![1.0; 4];
        let b = vec![2.0, 2.0];
        let x = solve_svd(&backend, &a, &b, 2, DEFAULT_RCOND).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-4);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn non_finite_system_is_an_error() {
        let backend = CpuBackend::new();
        let a = vec![1.0, f32::NAN, 2.0, 3.0];
        let b = vec![1.0, 1.0];
        let err = solve_svd(&backend, &a, &b, 2, DEFAULT_RCOND);
        assert!(matches!(err, Err(Error::Computation(_))));

        let y = vec![1.0, f32::INFINITY, 3.0];
        assert!(fit_linear(&backend, &y).is_err());
    }

    #[test]
    fn recovers_exact_line() {
        let backend = CpuBackend::new();
        let y: Vec<f32> = (0..10).map(|t| 2.0 * t as f32 + 3.0).collect();
        let fit = fit_linear(&backend, &y).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-3);
        assert_relative_eq!(fit.intercept, 3.0, epsilon = 1e-3);
        assert!(fit.rmse < 1e-3);
        assert_relative_eq!(fit.predict(20.0), 43.0, epsilon = 1e-2);
    }

    #[test]
    fn rejects_degenerate_input() {
        let backend = CpuBackend::new();
        assert!(fit_linear(&backend, &[1.0]).is_err());
        assert!(solve_svd(&backend, &vec![], &vec![], 0, DEFAULT_RCOND).is_err());
        assert!(solve_svd(&backend, &vec![1.0], &vec![1.0], 1, -1.0).is_err());
    }
}
