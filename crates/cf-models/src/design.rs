//! Design matrices for linear least squares.

use cf_compute::CpuBackend;
use cf_core::{LinalgBackend, MatrixShape, Result, check_len};

/// A backend that can fill a design matrix for `n` samples.
pub trait DesignMatrix<B: LinalgBackend> {
    /// Number of columns (regressors).
    fn n_cols(&self) -> usize;

    /// Fill `out[..n * n_cols]` as an `n × n_cols` column-major matrix.
    fn build(&self, backend: &B, out: &mut B::Buffer, n: usize) -> Result<()>;
}

/// Design matrix of the affine model: column 0 = `t`, column 1 = `1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinearDesign;

impl LinearDesign {
    /// Shape of the design matrix for `n` samples.
    pub fn shape(n: usize) -> MatrixShape {
        MatrixShape::new(n, 2)
    }
}

impl DesignMatrix<CpuBackend> for LinearDesign {
    fn n_cols(&self) -> usize {
        2
    }

    fn build(&self, _backend: &CpuBackend, out: &mut Vec<f32>, n: usize) -> Result<()> {
        check_len("linear design", out.len(), Self::shape(n).len()?)?;
        let (ts, ones) = out[..2 * n].split_at_mut(n);
        for (i, t) in ts.iter_mut().enumerate() {
            *t = i as f32;
        }
        ones.fill(1.0);
        Ok(())
    }
}

#[cfg(feature = "cuda")]
impl DesignMatrix<cf_compute::CudaBackend> for LinearDesign {
    fn n_cols(&self) -> usize {
        2
    }

    fn build(
        &self,
        backend: &cf_compute::CudaBackend,
        out: &mut cudarc::driver::CudaSlice<f32>,
        n: usize,
    ) -> Result<()> {
        check_len("linear design", out.len(), Self::shape(n).len()?)?;
        crate::cuda::launch(backend, "linear_design", out, &[], n)
    }
}
