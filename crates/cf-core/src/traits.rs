//! Core traits for curvefit
//!
//! This module defines the trait-based architecture that keeps the
//! Jacobian estimators (cf-inference) independent of the concrete compute
//! backend (CPU reference or CUDA): estimators only see `LinalgBackend`
//! and `ModelEvaluator`.

use crate::Result;
use crate::types::MultiplyConfig;

/// A contiguous buffer of `f32` living on a backend's device.
pub trait DeviceBuffer {
    /// Number of `f32` elements.
    fn len(&self) -> usize;

    /// `true` when the buffer holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DeviceBuffer for Vec<f32> {
    fn len(&self) -> usize {
        Vec::len(self)
    }
}

#[cfg(feature = "cuda")]
impl DeviceBuffer for cudarc::driver::CudaSlice<f32> {
    fn len(&self) -> usize {
        cudarc::driver::CudaSlice::len(self)
    }
}

/// Dense linear-algebra backend over column-major `f32` buffers.
///
/// Device work may be enqueued asynchronously: callers must call
/// [`LinalgBackend::synchronize`] (or [`LinalgBackend::download`], which
/// synchronizes) before inspecting results produced by the matrix
/// primitives.
pub trait LinalgBackend {
    /// Device buffer type.
    type Buffer: DeviceBuffer;

    /// Backend name (e.g., "CPU", "CUDA")
    fn name(&self) -> &str;

    /// Allocate a zero-filled buffer of `len` floats.
    fn alloc_zeros(&self, len: usize) -> Result<Self::Buffer>;

    /// Copy host data into a new device buffer.
    fn upload(&self, host: &[f32]) -> Result<Self::Buffer>;

    /// Copy a device buffer back to the host (synchronizes).
    fn download(&self, buf: &Self::Buffer) -> Result<Vec<f32>>;

    /// Block until all enqueued device work has completed.
    fn synchronize(&self) -> Result<()>;

    /// `dst[..len] = src[..len]`
    fn copy(&self, dst: &mut Self::Buffer, src: &Self::Buffer, len: usize) -> Result<()>;

    /// `out[offset..offset + len] = a[..len] - b[..len]`
    fn subtract_into(
        &self,
        a: &Self::Buffer,
        b: &Self::Buffer,
        out: &mut Self::Buffer,
        offset: usize,
        len: usize,
    ) -> Result<()>;

    /// `buf[offset..offset + len] *= factor`
    fn scale(&self, buf: &mut Self::Buffer, offset: usize, len: usize, factor: f32)
    -> Result<()>;

    /// `C = beta · (alpha · op(A) · op(B))`, see [`MultiplyConfig`].
    ///
    /// The whole `C` buffer is zeroed first, including any tail past `m × k`.
    fn multiply(
        &self,
        a: &Self::Buffer,
        b: &Self::Buffer,
        c: &mut Self::Buffer,
        cfg: &MultiplyConfig,
    ) -> Result<()>;

    /// `C = diag(d) · B` for `B: m × n` and `d` of length `m`.
    ///
    /// The whole `C` buffer is zeroed first.
    fn multiply_diagonal(
        &self,
        diag: &Self::Buffer,
        b: &Self::Buffer,
        c: &mut Self::Buffer,
        m: usize,
        n: usize,
    ) -> Result<()>;

    /// `B = Aᵀ` for `A: m × n` (so `B` is `n × m`).
    fn transpose(&self, a: &Self::Buffer, b: &mut Self::Buffer, m: usize, n: usize)
    -> Result<()>;

    /// `A = Aᵀ` in place. `A` is `m × n` on entry and `n × m` on return.
    fn transpose_in_place(&self, a: &mut Self::Buffer, m: usize, n: usize) -> Result<()>;

    /// Full SVD `A = U · diag(S) · VT` for `A: m × n`.
    ///
    /// `U` is `m × m`, `S` holds `min(m, n)` singular values in descending
    /// order, `VT` is `n × n`. `A` is left untouched. Non-finite entries in
    /// `A` are an [`crate::Error::Computation`].
    fn svd(
        &self,
        a: &Self::Buffer,
        u: &mut Self::Buffer,
        s: &mut Self::Buffer,
        vt: &mut Self::Buffer,
        m: usize,
        n: usize,
    ) -> Result<()>;
}

/// A parametric model evaluated over the canonical domain `t = 0, 1, …, n-1`.
///
/// Implementations must be deterministic, read only `params` and `n`, and
/// have no other observable effect: the Jacobian estimators call them
/// `K + 1` times per estimate.
pub trait ModelEvaluator<B: LinalgBackend> {
    /// Number of parameters the model expects.
    fn n_params(&self) -> usize;

    /// Model name (e.g., "linear", "exp1")
    fn name(&self) -> &str;

    /// Write `n` model values into `out[..n]`.
    fn evaluate(&self, backend: &B, out: &mut B::Buffer, params: &[f32], n: usize) -> Result<()>;
}

impl<B, M> ModelEvaluator<B> for &M
where
    B: LinalgBackend,
    M: ModelEvaluator<B> + ?Sized,
{
    fn n_params(&self) -> usize {
        (**self).n_params()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, backend: &B, out: &mut B::Buffer, params: &[f32], n: usize) -> Result<()> {
        (**self).evaluate(backend, out, params, n)
    }
}

impl<B, M> ModelEvaluator<B> for Box<M>
where
    B: LinalgBackend,
    M: ModelEvaluator<B> + ?Sized,
{
    fn n_params(&self) -> usize {
        (**self).n_params()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn evaluate(&self, backend: &B, out: &mut B::Buffer, params: &[f32], n: usize) -> Result<()> {
        (**self).evaluate(backend, out, params, n)
    }
}
