//! CPU compute backend
//!
//! Priority P0 - this is the reference backend that MUST work everywhere.
//! It defines the semantics the CUDA backend is validated against.
//!
//! Features:
//! - Rayon for element-wise and per-column parallelism
//! - nalgebra (column-major `DMatrix`) for GEMM and SVD
//! - Optional dedicated thread pool (`with_threads`)

use cf_core::{Error, LinalgBackend, MatrixShape, MultiplyConfig, Result, check_len};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use std::sync::Arc;

/// Below this many elements a chunk is processed on one thread.
const PAR_MIN_LEN: usize = 4096;

/// CPU compute backend using Rayon for parallelism
#[derive(Clone)]
pub struct CpuBackend {
    n_threads: usize,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl CpuBackend {
    /// Create a new CPU backend on the global Rayon pool
    pub fn new() -> Self {
        Self { n_threads: 0, pool: None }
    }

    /// Create a CPU backend with a dedicated pool of `n_threads` (0 = automatic)
    pub fn with_threads(n_threads: usize) -> Result<Self> {
        if n_threads == 0 {
            return Ok(Self::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .map_err(|e| Error::Computation(format!("CPU backend: thread pool: {e}")))?;
        log::debug!("CPU backend: dedicated pool with {n_threads} threads");
        Ok(Self { n_threads, pool: Some(Arc::new(pool)) })
    }

    /// Configured thread count (0 = automatic).
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    fn run<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBackend").field("n_threads", &self.n_threads).finish()
    }
}

fn range_check(what: &str, buf_len: usize, offset: usize, len: usize) -> Result<()> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| Error::Validation(format!("{what}: offset {offset} + len {len} overflows")))?;
    check_len(what, buf_len, end)
}

impl LinalgBackend for CpuBackend {
    type Buffer = Vec<f32>;

    fn name(&self) -> &str {
        "CPU"
    }

    fn alloc_zeros(&self, len: usize) -> Result<Vec<f32>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            Error::Computation(format!("CPU alloc_zeros: {len} floats: {e}"))
        })?;
        buf.resize(len, 0.0);
        Ok(buf)
    }

    fn upload(&self, host: &[f32]) -> Result<Vec<f32>> {
        Ok(host.to_vec())
    }

    fn download(&self, buf: &Vec<f32>) -> Result<Vec<f32>> {
        Ok(buf.clone())
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }

    fn copy(&self, dst: &mut Vec<f32>, src: &Vec<f32>, len: usize) -> Result<()> {
        check_len("copy: src", src.len(), len)?;
        check_len("copy: dst", dst.len(), len)?;
        dst[..len].copy_from_slice(&src[..len]);
        Ok(())
    }

    fn subtract_into(
        &self,
        a: &Vec<f32>,
        b: &Vec<f32>,
        out: &mut Vec<f32>,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        check_len("subtract: a", a.len(), len)?;
        check_len("subtract: b", b.len(), len)?;
        range_check("subtract: out", out.len(), offset, len)?;

        let dst = &mut out[offset..offset + len];
        let (a, b) = (&a[..len], &b[..len]);
        self.run(|| {
            dst.par_iter_mut()
                .with_min_len(PAR_MIN_LEN)
                .zip(a.par_iter().zip(b.par_iter()))
                .for_each(|(o, (&x, &y))| *o = x - y);
        });
        Ok(())
    }

    fn scale(&self, buf: &mut Vec<f32>, offset: usize, len: usize, factor: f32) -> Result<()> {
        range_check("scale", buf.len(), offset, len)?;
        let dst = &mut buf[offset..offset + len];
        self.run(|| {
            dst.par_iter_mut().with_min_len(PAR_MIN_LEN).for_each(|v| *v *= factor);
        });
        Ok(())
    }

    fn multiply(
        &self,
        a: &Vec<f32>,
        b: &Vec<f32>,
        c: &mut Vec<f32>,
        cfg: &MultiplyConfig,
    ) -> Result<()> {
        cfg.validate(a.len(), b.len(), c.len())?;
        let c_len = cfg.c_shape().len()?;
        c.fill(0.0);
        if c_len == 0 {
            return Ok(());
        }

        let op_a = column_major(&a[..], cfg.a_shape())?;
        let op_a = if cfg.trans_a.is_transposed() { op_a.transpose() } else { op_a };
        let op_b = column_major(&b[..], cfg.b_shape())?;
        let op_b = if cfg.trans_b.is_transposed() { op_b.transpose() } else { op_b };

        let product = self.run(|| (op_a * op_b) * cfg.effective_alpha());
        c[..c_len].copy_from_slice(product.as_slice());
        Ok(())
    }

    fn multiply_diagonal(
        &self,
        diag: &Vec<f32>,
        b: &Vec<f32>,
        c: &mut Vec<f32>,
        m: usize,
        n: usize,
    ) -> Result<()> {
        let len = MatrixShape::new(m, n).len()?;
        check_len("multiply_diagonal: diag", diag.len(), m)?;
        check_len("multiply_diagonal: B", b.len(), len)?;
        check_len("multiply_diagonal: C", c.len(), len)?;
        c.fill(0.0);
        if len == 0 {
            return Ok(());
        }

        let d = &diag[..m];
        let dst = &mut c[..len];
        let src = &b[..len];
        self.run(|| {
            dst.par_chunks_mut(m).zip(src.par_chunks(m)).for_each(|(c_col, b_col)| {
                for ((out, &x), &w) in c_col.iter_mut().zip(b_col).zip(d) {
                    *out = w * x;
                }
            });
        });
        Ok(())
    }

    fn transpose(&self, a: &Vec<f32>, b: &mut Vec<f32>, m: usize, n: usize) -> Result<()> {
        let len = MatrixShape::new(m, n).len()?;
        check_len("transpose: A", a.len(), len)?;
        check_len("transpose: B", b.len(), len)?;
        if len == 0 {
            return Ok(());
        }

        // Column r of B (n entries) is row r of A.
        let src = &a[..len];
        let dst = &mut b[..len];
        self.run(|| {
            dst.par_chunks_mut(n).enumerate().for_each(|(r, b_col)| {
                for (c, out) in b_col.iter_mut().enumerate() {
                    *out = src[c * m + r];
                }
            });
        });
        Ok(())
    }

    fn transpose_in_place(&self, a: &mut Vec<f32>, m: usize, n: usize) -> Result<()> {
        let len = MatrixShape::new(m, n).len()?;
        check_len("transpose: A", a.len(), len)?;
        let snapshot = a[..len].to_vec();
        self.transpose(&snapshot, a, m, n)
    }

    fn svd(
        &self,
        a: &Vec<f32>,
        u: &mut Vec<f32>,
        s: &mut Vec<f32>,
        vt: &mut Vec<f32>,
        m: usize,
        n: usize,
    ) -> Result<()> {
        let len = MatrixShape::new(m, n).len()?;
        let rank = m.min(n);
        check_len("svd: A", a.len(), len)?;
        check_len("svd: U", u.len(), MatrixShape::new(m, m).len()?)?;
        check_len("svd: S", s.len(), rank)?;
        check_len("svd: VT", vt.len(), MatrixShape::new(n, n).len()?)?;
        if let Some(pos) = a[..len].iter().position(|v| !v.is_finite()) {
            return Err(Error::Computation(format!(
                "CPU svd: non-finite input {} at index {pos} ({m}x{n})",
                a[pos]
            )));
        }

        let (u_full, sigma, vt_full) = if rank == 0 {
            (DMatrix::identity(m, m), Vec::new(), DMatrix::identity(n, n))
        } else {
            let mat = DMatrix::<f64>::from_iterator(m, n, a[..len].iter().map(|&x| x as f64));
            full_svd(mat)?
        };

        for (dst, &src) in u[..m * m].iter_mut().zip(u_full.as_slice()) {
            *dst = src as f32;
        }
        for (dst, &src) in s[..rank].iter_mut().zip(&sigma) {
            *dst = src as f32;
        }
        for (dst, &src) in vt[..n * n].iter_mut().zip(vt_full.as_slice()) {
            *dst = src as f32;
        }
        Ok(())
    }
}

fn column_major(data: &[f32], shape: MatrixShape) -> Result<DMatrix<f32>> {
    let len = shape.len()?;
    Ok(DMatrix::from_column_slice(shape.rows, shape.cols, &data[..len]))
}

/// Full (non-economy) SVD in f64 with singular values sorted descending.
fn full_svd(mat: DMatrix<f64>) -> Result<(DMatrix<f64>, Vec<f64>, DMatrix<f64>)> {
    let (m, n) = mat.shape();
    // max_niter = 0: iterate until convergence.
    let svd = nalgebra::SVD::try_new_unordered(mat, true, true, f64::EPSILON, 0)
        .ok_or_else(|| Error::Computation(format!("CPU svd: no convergence ({m}x{n})")))?;
    if svd.singular_values.iter().any(|v| !v.is_finite()) {
        return Err(Error::Computation(format!("CPU svd: non-finite singular values ({m}x{n})")));
    }
    let u_thin = svd.u.ok_or_else(|| Error::Computation("CPU svd: U not computed".into()))?;
    let vt_thin = svd.v_t.ok_or_else(|| Error::Computation("CPU svd: VT not computed".into()))?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&i, &j| svd.singular_values[j].total_cmp(&svd.singular_values[i]));

    let sigma: Vec<f64> = order.iter().map(|&i| svd.singular_values[i]).collect();
    let u_cols: Vec<DVector<f64>> = order.iter().map(|&i| u_thin.column(i).into_owned()).collect();
    let v_cols: Vec<DVector<f64>> =
        order.iter().map(|&i| vt_thin.row(i).transpose().into_owned()).collect();

    let u_full = complete_basis(u_cols, m)?;
    let v_full = complete_basis(v_cols, n)?;
    Ok((u_full, sigma, v_full.transpose()))
}

/// Extend orthonormal columns to an orthonormal basis of R^dim.
///
/// Candidates are the unit vectors, orthogonalised twice (classical
/// Gram-Schmidt with re-orthogonalisation) against the basis so far.
fn complete_basis(mut cols: Vec<DVector<f64>>, dim: usize) -> Result<DMatrix<f64>> {
    for e in 0..dim {
        if cols.len() == dim {
            break;
        }
        let mut v = DVector::<f64>::zeros(dim);
        v[e] = 1.0;
        for _ in 0..2 {
            for q in &cols {
                let p = q.dot(&v);
                v.axpy(-p, q, 1.0);
            }
        }
        let norm = v.norm();
        if norm > 1e-6 {
            cols.push(v / norm);
        }
    }

    if cols.len() != dim {
        return Err(Error::Computation(format!(
            "CPU svd: could not complete basis ({} of {dim} vectors)",
            cols.len()
        )));
    }
    Ok(DMatrix::from_columns(&cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use cf_core::Transpose;

    fn identity(n: usize) -> Vec<f32> {
        let mut out = vec![0.0; n * n];
        for i in 0..n {
            out[i * n + i] = 1.0;
        }
        out
    }

    #[test]
    fn test_cpu_backend_creation() {
        let backend = CpuBackend::new();
        assert_eq!(backend.name(), "CPU");
        assert_eq!(backend.n_threads(), 0);
    }

    #[test]
    fn test_cpu_backend_with_threads() {
        let backend = CpuBackend::with_threads(2).unwrap();
        assert_eq!(backend.n_threads(), 2);
        let mut buf = vec![1.0, 2.0, 3.0];
        backend.scale(&mut buf, 1, 2, 2.0).unwrap();
        assert_eq!(buf, vec![1.0, 4.0, 6.0]);
    }

    #[test]
    fn subtract_writes_at_offset() {
        let backend = CpuBackend::new();
        let a = vec![5.0, 7.0];
        let b = vec![1.0, 2.0];
        let mut out = vec![9.0; 6];
        backend.subtract_into(&a, &b, &mut out, 2, 2).unwrap();
        assert_eq!(out, vec![9.0, 9.0, 4.0, 5.0, 9.0, 9.0]);
    }

    #[test]
    fn copy_prefix_and_scale() {
        let backend = CpuBackend::new();
        let src = vec![1.0, 2.0, 3.0];
        let mut dst = vec![0.0; 4];
        backend.copy(&mut dst, &src, 2).unwrap();
        backend.scale(&mut dst, 1, 2, 4.0).unwrap();
        assert_eq!(dst, vec![1.0, 8.0, 0.0, 0.0]);
        assert!(backend.copy(&mut dst, &src, 4).is_err());
    }

    #[test]
    fn alloc_zeros_reports_impossible_sizes() {
        let backend = CpuBackend::new();
        assert_eq!(backend.alloc_zeros(3).unwrap(), vec![0.0; 3]);
        let err = backend.alloc_zeros(usize::MAX);
        assert!(matches!(err, Err(Error::Computation(_))));
    }

    #[test]
    fn subtract_rejects_out_of_range() {
        let backend = CpuBackend::new();
        let mut out = vec![0.0; 3];
        let err = backend.subtract_into(&vec![0.0; 2], &vec![0.0; 2], &mut out, 2, 2);
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn multiply_column_major_product() {
        let backend = CpuBackend::new();
        // A = [[1, 2], [3, 4]] column-major, B = [[5], [6]]
        let a = vec![1.0, 3.0, 2.0, 4.0];
        let b = vec![5.0, 6.0];
        let mut c = vec![100.0; 2];
        backend.multiply(&a, &b, &mut c, &MultiplyConfig::new(2, 2, 1)).unwrap();
        assert_eq!(c, vec![17.0, 39.0]);
    }

    #[test]
    fn multiply_overwrites_and_scales_product() {
        let backend = CpuBackend::new();
        let a = vec![1.0, 3.0, 2.0, 4.0];
        let eye = identity(2);
        let mut c = vec![-1.0; 4];
        let cfg = MultiplyConfig::new(2, 2, 2).with_scalars(2.0, 0.5);
        backend.multiply(&a, &eye, &mut c, &cfg).unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn multiply_clears_oversized_output() {
        let backend = CpuBackend::new();
        let a = vec![1.0, 3.0, 2.0, 4.0];
        let eye = identity(2);
        let mut c = vec![7.0; 6];
        backend.multiply(&a, &eye, &mut c, &MultiplyConfig::new(2, 2, 2)).unwrap();
        assert_eq!(c, vec![1.0, 3.0, 2.0, 4.0, 0.0, 0.0]);

        let mut c = vec![7.0; 5];
        backend.multiply_diagonal(&vec![2.0, 3.0], &a, &mut c, 2, 2).unwrap();
        assert_eq!(c, vec![2.0, 9.0, 4.0, 12.0, 0.0]);
    }

    #[test]
    fn multiply_transposed_gram_matrix() {
        let backend = CpuBackend::new();
        // X is 3x2: columns [0,1,2] and [1,1,1]
        let x = vec![0.0, 1.0, 2.0, 1.0, 1.0, 1.0];
        let mut xtx = vec![0.0; 4];
        let cfg = MultiplyConfig::new(2, 3, 2).with_transpose(Transpose::Yes, Transpose::No);
        backend.multiply(&x, &x, &mut xtx, &cfg).unwrap();
        assert_eq!(xtx, vec![5.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn multiply_diagonal_scales_rows() {
        let backend = CpuBackend::new();
        let d = vec![2.0, -1.0];
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut c = vec![0.0; 6];
        backend.multiply_diagonal(&d, &b, &mut c, 2, 3).unwrap();
        assert_eq!(c, vec![2.0, -2.0, 6.0, -4.0, 10.0, -6.0]);
    }

    #[test]
    fn transpose_rectangular() {
        let backend = CpuBackend::new();
        // A = [[1, 2, 3], [4, 5, 6]] (2x3)
        let a = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        let mut b = vec![0.0; 6];
        backend.transpose(&a, &mut b, 2, 3).unwrap();
        // B = [[1, 4], [2, 5], [3, 6]] (3x2)
        assert_eq!(b, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn transpose_in_place_matches_out_of_place() {
        let backend = CpuBackend::new();
        let a: Vec<f32> = (0..35).map(|i| i as f32).collect();
        let mut expected = vec![0.0; 35];
        backend.transpose(&a, &mut expected, 5, 7).unwrap();
        let mut inplace = a.clone();
        backend.transpose_in_place(&mut inplace, 5, 7).unwrap();
        assert_eq!(inplace, expected);
    }

    #[test]
    fn svd_diagonal_two_by_two() {
        let backend = CpuBackend::new();
        let a = vec![3.0, 0.0, 0.0, -2.0];
        let (mut u, mut s, mut vt) = (vec![0.0; 4], vec![0.0; 2], vec![0.0; 4]);
        backend.svd(&a, &mut u, &mut s, &mut vt, 2, 2).unwrap();
        assert_abs_diff_eq!(s[0], 3.0, epsilon = 1e-5);
        assert_abs_diff_eq!(s[1], 2.0, epsilon = 1e-5);
        assert_reconstructs(&a, &u, &s, &vt, 2, 2);
    }

    #[test]
    fn svd_wide_and_tall_are_full() {
        let backend = CpuBackend::new();
        for (m, n) in [(4, 2), (2, 5), (3, 3)] {
            let a: Vec<f32> = (0..m * n).map(|i| ((i * 7 % 11) as f32) - 4.0).collect();
            let (mut u, mut s, mut vt) = (vec![0.0; m * m], vec![0.0; m.min(n)], vec![0.0; n * n]);
            backend.svd(&a, &mut u, &mut s, &mut vt, m, n).unwrap();
            assert!(s.windows(2).all(|w| w[0] >= w[1]), "not descending: {s:?}");
            assert_orthogonal(&u, m);
            assert_orthogonal(&vt, n);
            assert_reconstructs(&a, &u, &s, &vt, m, n);
        }
    }

    #[test]
    fn svd_rank_deficient() {
        let backend = CpuBackend::new();
        // Two identical columns.
        let a = vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let (mut u, mut s, mut vt) = (vec![0.0; 9], vec![0.0; 2], vec![0.0; 4]);
        backend.svd(&a, &mut u, &mut s, &mut vt, 3, 2).unwrap();
        assert_abs_diff_eq!(s[1], 0.0, epsilon = 1e-5);
        assert_orthogonal(&u, 3);
        assert_reconstructs(&a, &u, &s, &vt, 3, 2);
    }

    #[test]
    fn svd_rejects_non_finite_input() {
        let backend = CpuBackend::new();
        for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let a = vec![1.0, bad, 2.0, 3.0];
            let (mut u, mut s, mut vt) = (vec![0.0; 4], vec![0.0; 2], vec![0.0; 4]);
            let err = backend.svd(&a, &mut u, &mut s, &mut vt, 2, 2);
            assert!(matches!(err, Err(Error::Computation(_))), "input {bad}");
        }
    }

    fn assert_orthogonal(q: &[f32], dim: usize) {
        for i in 0..dim {
            for j in 0..dim {
                let dot: f32 = (0..dim).map(|r| q[i * dim + r] * q[j * dim + r]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(dot, expected, epsilon = 1e-4);
            }
        }
    }

    fn assert_reconstructs(a: &[f32], u: &[f32], s: &[f32], vt: &[f32], m: usize, n: usize) {
        for r in 0..m {
            for c in 0..n {
                let v: f32 = (0..m.min(n)).map(|k| u[k * m + r] * s[k] * vt[c * n + k]).sum();
                assert_abs_diff_eq!(v, a[c * m + r], epsilon = 1e-4);
            }
        }
    }
}
