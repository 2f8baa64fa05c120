//! CUDA compute backend (NVIDIA).
//!
//! Feature-gated behind `cuda`. A [`CudaBackend`] is an explicit device
//! context: it owns the CUDA context, one stream, the cuBLAS and cuSOLVER
//! handles and the NVRTC-compiled kernel modules. Create it once and reuse
//! it across calls; nothing is re-created per operation.
//!
//! - GEMM: `cublasSgemm` through cudarc's safe `Gemm` wrapper
//! - diagonal multiply: `cublasSdgmm`
//! - SVD: `cusolverDnSgesvd` (`jobu = jobvt = 'A'`)
//! - vector ops and the tiled transpose: kernels in `kernels/linalg.cu`
//!
//! The matrix primitives only enqueue work on the backend stream; call
//! [`LinalgBackend::synchronize`] or [`LinalgBackend::download`] before
//! reading results on the host.

use cf_core::{Error, LinalgBackend, MatrixShape, MultiplyConfig, Result, Transpose, check_len};
use core::ffi::c_int;
use cudarc::cublas::safe::{Gemm, GemmConfig};
use cudarc::cublas::{CudaBlas, result::CublasError, sys as cublas_sys};
use cudarc::cusolver::sys as cusolver_sys;
use cudarc::driver::{
    CudaContext, CudaFunction, CudaModule, CudaSlice, CudaStream, DevicePtr, DevicePtrMut,
    LaunchConfig, PushKernelArg,
};
use cudarc::nvrtc::Ptx;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const LINALG_KERNEL_SRC: &str = include_str!("../kernels/linalg.cu");

/// Threads per block for the 1-D element-wise kernels.
const BLOCK_1D: u32 = 256;
/// Edge of a shared-memory tile in `transpose_tiled_f32`.
const TILE_DIM: u32 = 32;
/// Rows of threads per tile in `transpose_tiled_f32`.
const BLOCK_ROWS: u32 = 8;
const MAX_GRID: u32 = 65535;

pub(crate) fn cuda_err(msg: impl std::fmt::Display) -> Error {
    Error::Computation(format!("CUDA: {msg}"))
}

fn cublas_err(msg: impl std::fmt::Display, err: CublasError) -> Error {
    Error::Computation(format!("CUDA cuBLAS: {msg}: {err:?}"))
}

fn check_cublas(status: cublas_sys::cublasStatus_t, call: &str) -> Result<()> {
    if status != cublas_sys::cublasStatus_t::CUBLAS_STATUS_SUCCESS {
        return Err(Error::Computation(format!("CUDA cuBLAS: {call}: {status:?}")));
    }
    Ok(())
}

fn check_cusolver(status: cusolver_sys::cusolverStatus_t, call: &str) -> Result<()> {
    if status != cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
        return Err(Error::Computation(format!("CUDA cuSOLVER: {call}: {status:?}")));
    }
    Ok(())
}

fn to_c_int(what: &str, v: usize) -> Result<c_int> {
    c_int::try_from(v).map_err(|_| Error::Validation(format!("{what} = {v} exceeds i32::MAX")))
}

fn launch_1d(len: usize) -> LaunchConfig {
    let grid = (len as u64).div_ceil(BLOCK_1D as u64).clamp(1, MAX_GRID as u64) as u32;
    LaunchConfig { grid_dim: (grid, 1, 1), block_dim: (BLOCK_1D, 1, 1), shared_mem_bytes: 0 }
}

fn detect_gpu_arch_for_device(device_id: usize) -> Result<String> {
    use cudarc::driver::result;
    use cudarc::driver::sys;

    unsafe {
        result::init().map_err(|e| cuda_err(format!("cuInit: {e}")))?;
        let dev = result::device::get(device_id as i32)
            .map_err(|e| cuda_err(format!("cuDeviceGet({device_id}): {e}")))?;

        let major = result::device::get_attribute(
            dev,
            sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MAJOR,
        )
        .map_err(|e| cuda_err(format!("get CC major (device {device_id}): {e}")))?;

        let minor = result::device::get_attribute(
            dev,
            sys::CUdevice_attribute::CU_DEVICE_ATTRIBUTE_COMPUTE_CAPABILITY_MINOR,
        )
        .map_err(|e| cuda_err(format!("get CC minor (device {device_id}): {e}")))?;

        Ok(format!("sm_{major}{minor}"))
    }
}

/// Compile a kernel source to PTX for `arch` (e.g. `sm_86`).
///
/// `CF_KERNELS_PTX_OVERRIDE_<NAMESPACE>` points at a prebuilt PTX file and
/// skips NVRTC; `CF_NVRTC_ARCH` overrides the virtual architecture.
fn compile_ptx_for_arch(namespace: &str, source: &str, arch: &str) -> Result<String> {
    use cudarc::nvrtc::{CompileOptions, compile_ptx_with_opts};

    let override_key = format!("CF_KERNELS_PTX_OVERRIDE_{}", namespace.to_ascii_uppercase());
    if let Ok(override_ptx) = std::env::var(&override_key)
        && !override_ptx.trim().is_empty()
    {
        let src = std::fs::read_to_string(&override_ptx)
            .map_err(|e| cuda_err(format!("read {override_key}={override_ptx}: {e}")))?;
        if src.trim().is_empty() {
            return Err(cuda_err(format!("{override_key} is empty: {override_ptx}")));
        }
        log::debug!("{namespace}: using PTX override {override_ptx}");
        return Ok(src);
    }

    let inferred_arch = match arch.strip_prefix("sm_") {
        Some(cc) => format!("compute_{cc}"),
        None => arch.to_string(),
    };

    let mut try_arches = Vec::new();
    if let Ok(override_arch) = std::env::var("CF_NVRTC_ARCH")
        && !override_arch.trim().is_empty()
    {
        try_arches.push(override_arch);
    }
    if try_arches.is_empty() {
        try_arches.push(inferred_arch.clone());
        // CUDA 13 toolchains may drop compute_70 from NVRTC options.
        if inferred_arch == "compute_70" {
            try_arches.push("compute_75".to_string());
        }
    }

    let mut errs = Vec::new();
    for nvrtc_arch in try_arches {
        let opts = CompileOptions {
            prec_sqrt: Some(true),
            prec_div: Some(true),
            fmad: Some(false),
            arch: None,
            options: vec![format!("--gpu-architecture={nvrtc_arch}")],
            ..Default::default()
        };

        match compile_ptx_with_opts(source, opts) {
            Ok(ptx) => {
                log::debug!("{namespace}: NVRTC compiled for {nvrtc_arch}");
                return Ok(ptx.to_src());
            }
            Err(e) => errs.push(format!("{nvrtc_arch}: {e}")),
        }
    }

    Err(cuda_err(format!("NVRTC compile {namespace} failed:\n{}", errs.join("\n"))))
}

/// Owned cuSOLVER dense handle bound to the backend stream.
struct DnHandle(cusolver_sys::cusolverDnHandle_t);

// The handle is only ever used through the owning `CudaBackend`, on its stream.
unsafe impl Send for DnHandle {}

impl DnHandle {
    fn new(stream: &CudaStream) -> Result<Self> {
        let mut raw = std::ptr::null_mut();
        check_cusolver(unsafe { cusolver_sys::cusolverDnCreate(&mut raw) }, "cusolverDnCreate")?;
        let handle = Self(raw);
        check_cusolver(
            unsafe { cusolver_sys::cusolverDnSetStream(handle.0, stream.cu_stream() as _) },
            "cusolverDnSetStream",
        )?;
        Ok(handle)
    }
}

impl Drop for DnHandle {
    fn drop(&mut self) {
        let status = unsafe { cusolver_sys::cusolverDnDestroy(self.0) };
        if status != cusolver_sys::cusolverStatus_t::CUSOLVER_STATUS_SUCCESS {
            log::warn!("cusolverDnDestroy failed: {status:?}");
        }
    }
}

/// Options for [`CudaBackend::with_options`].
#[derive(Debug, Clone, Default)]
pub struct CudaOptions {
    /// CUDA device ordinal.
    pub device_id: usize,
}

/// Kernels loaded from `kernels/linalg.cu`.
struct LinalgKernels {
    copy: CudaFunction,
    subtract: CudaFunction,
    scale: CudaFunction,
    transpose: CudaFunction,
}

/// CUDA backend: explicit device context with reusable library handles.
pub struct CudaBackend {
    ctx: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    blas: CudaBlas,
    solver: DnHandle,
    kernels: LinalgKernels,
    arch: String,
    device_id: usize,
    modules: Mutex<HashMap<&'static str, Arc<CudaModule>>>,
}

impl CudaBackend {
    /// Check CUDA availability.
    pub fn is_available() -> bool {
        std::panic::catch_unwind(|| CudaContext::new(0).is_ok()).unwrap_or(false)
    }

    /// Create a backend on GPU 0.
    pub fn new() -> Result<Self> {
        Self::with_options(&CudaOptions::default())
    }

    /// Create a backend on the configured device.
    pub fn with_options(options: &CudaOptions) -> Result<Self> {
        let device_id = options.device_id;
        let ctx = CudaContext::new(device_id)
            .map_err(|e| cuda_err(format!("context (device {device_id}): {e}")))?;
        let stream = ctx.default_stream();
        let blas = CudaBlas::new(stream.clone()).map_err(|e| cublas_err("create handle", e))?;
        let solver = DnHandle::new(&stream)?;

        let arch = detect_gpu_arch_for_device(device_id)?;
        let ptx_src = compile_ptx_for_arch("linalg", LINALG_KERNEL_SRC, &arch)?;
        let module = ctx
            .load_module(Ptx::from_src(ptx_src))
            .map_err(|e| cuda_err(format!("load module linalg: {e}")))?;
        let load = |name: &str| {
            module.load_function(name).map_err(|e| cuda_err(format!("load {name}: {e}")))
        };
        let kernels = LinalgKernels {
            copy: load("copy_f32")?,
            subtract: load("subtract_f32")?,
            scale: load("scale_f32")?,
            transpose: load("transpose_tiled_f32")?,
        };

        log::debug!("CUDA backend ready on device {device_id} ({arch})");

        let mut modules = HashMap::new();
        modules.insert("linalg", module);

        Ok(Self {
            ctx,
            stream,
            blas,
            solver,
            kernels,
            arch,
            device_id,
            modules: Mutex::new(modules),
        })
    }

    /// The stream all work of this backend is enqueued on.
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Device ordinal.
    pub fn device_id(&self) -> usize {
        self.device_id
    }

    /// Compute capability, e.g. `sm_86`.
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Load `function` from the module compiled from `source`.
    ///
    /// Modules are compiled once per backend and cached under `namespace`;
    /// model plugins use this to ship their own kernels.
    pub fn kernel(
        &self,
        namespace: &'static str,
        source: &'static str,
        function: &str,
    ) -> Result<CudaFunction> {
        let module = {
            let mut modules = self
                .modules
                .lock()
                .map_err(|_| cuda_err("kernel cache lock poisoned"))?;
            let cached = modules.get(namespace).cloned();
            match cached {
                Some(module) => module,
                None => {
                    let ptx = compile_ptx_for_arch(namespace, source, &self.arch)?;
                    let module = self
                        .ctx
                        .load_module(Ptx::from_src(ptx))
                        .map_err(|e| cuda_err(format!("load module {namespace}: {e}")))?;
                    modules.insert(namespace, module.clone());
                    module
                }
            }
        };
        module
            .load_function(function)
            .map_err(|e| cuda_err(format!("load {namespace}::{function}: {e}")))
    }

    /// Launch configuration for a 1-D grid-stride kernel over `len` elements.
    pub fn launch_config_1d(&self, len: usize) -> LaunchConfig {
        launch_1d(len)
    }

    fn copy_prefix(&self, dst: &mut CudaSlice<f32>, src: &CudaSlice<f32>, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let len_arg = to_c_int("copy len", len)?;
        let mut builder = self.stream.launch_builder(&self.kernels.copy);
        builder.arg(dst);
        builder.arg(src);
        builder.arg(&len_arg);
        unsafe {
            builder.launch(launch_1d(len)).map_err(|e| cuda_err(format!("launch copy_f32: {e}")))?;
        }
        Ok(())
    }

    /// `gesvd` for `m >= n`. Overwrites `work_a`.
    fn gesvd_tall(
        &self,
        work_a: &mut CudaSlice<f32>,
        u: &mut CudaSlice<f32>,
        s: &mut CudaSlice<f32>,
        vt: &mut CudaSlice<f32>,
        m: usize,
        n: usize,
    ) -> Result<()> {
        let m_arg = to_c_int("svd m", m)?;
        let n_arg = to_c_int("svd n", n)?;

        let mut lwork: c_int = 0;
        check_cusolver(
            unsafe {
                cusolver_sys::cusolverDnSgesvd_bufferSize(self.solver.0, m_arg, n_arg, &mut lwork)
            },
            "cusolverDnSgesvd_bufferSize",
        )?;

        let mut work = self.stream.alloc_zeros::<f32>((lwork as usize).max(1)).map_err(cuda_err)?;
        let mut dev_info = self.stream.alloc_zeros::<c_int>(1).map_err(cuda_err)?;

        {
            let (a_ptr, _ga) = work_a.device_ptr_mut(&self.stream);
            let (s_ptr, _gs) = s.device_ptr_mut(&self.stream);
            let (u_ptr, _gu) = u.device_ptr_mut(&self.stream);
            let (vt_ptr, _gvt) = vt.device_ptr_mut(&self.stream);
            let (work_ptr, _gw) = work.device_ptr_mut(&self.stream);
            let (info_ptr, _gi) = dev_info.device_ptr_mut(&self.stream);

            check_cusolver(
                unsafe {
                    cusolver_sys::cusolverDnSgesvd(
                        self.solver.0,
                        b'A' as _,
                        b'A' as _,
                        m_arg,
                        n_arg,
                        a_ptr as *mut f32,
                        m_arg,
                        s_ptr as *mut f32,
                        u_ptr as *mut f32,
                        m_arg,
                        vt_ptr as *mut f32,
                        n_arg,
                        work_ptr as *mut f32,
                        lwork,
                        std::ptr::null_mut(),
                        info_ptr as *mut c_int,
                    )
                },
                "cusolverDnSgesvd",
            )?;
        }

        let mut info = vec![0 as c_int; 1];
        self.stream.memcpy_dtoh(&dev_info, &mut info).map_err(cuda_err)?;
        self.stream.synchronize().map_err(cuda_err)?;
        if info[0] != 0 {
            return Err(Error::Computation(format!(
                "CUDA cuSOLVER: gesvd devInfo = {} ({m}x{n})",
                info[0]
            )));
        }

        // gesvd does not reject NaN/Inf input; it shows up in S.
        let mut sigma = vec![0.0f32; n];
        self.stream.memcpy_dtoh(&s.slice(..n), &mut sigma).map_err(cuda_err)?;
        self.stream.synchronize().map_err(cuda_err)?;
        if sigma.iter().any(|v| !v.is_finite()) {
            return Err(Error::Computation(format!(
                "CUDA cuSOLVER: non-finite singular values ({m}x{n})"
            )));
        }
        Ok(())
    }
}

impl LinalgBackend for CudaBackend {
    type Buffer = CudaSlice<f32>;

    fn name(&self) -> &str {
        "CUDA"
    }

    fn alloc_zeros(&self, len: usize) -> Result<CudaSlice<f32>> {
        self.stream.alloc_zeros::<f32>(len).map_err(cuda_err)
    }

    fn upload(&self, host: &[f32]) -> Result<CudaSlice<f32>> {
        self.stream.clone_htod(host).map_err(cuda_err)
    }

    fn download(&self, buf: &CudaSlice<f32>) -> Result<Vec<f32>> {
        let mut host = vec![0.0f32; buf.len()];
        self.stream.memcpy_dtoh(buf, &mut host).map_err(cuda_err)?;
        self.stream.synchronize().map_err(cuda_err)?;
        Ok(host)
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().map_err(cuda_err)
    }

    fn copy(&self, dst: &mut CudaSlice<f32>, src: &CudaSlice<f32>, len: usize) -> Result<()> {
        check_len("copy: src", src.len(), len)?;
        check_len("copy: dst", dst.len(), len)?;
        self.copy_prefix(dst, src, len)
    }

    fn subtract_into(
        &self,
        a: &CudaSlice<f32>,
        b: &CudaSlice<f32>,
        out: &mut CudaSlice<f32>,
        offset: usize,
        len: usize,
    ) -> Result<()> {
        check_len("subtract: a", a.len(), len)?;
        check_len("subtract: b", b.len(), len)?;
        check_len("subtract: out", out.len(), offset.saturating_add(len))?;
        if len == 0 {
            return Ok(());
        }

        let offset_arg = to_c_int("subtract offset", offset)?;
        let len_arg = to_c_int("subtract len", len)?;
        let mut builder = self.stream.launch_builder(&self.kernels.subtract);
        builder.arg(a);
        builder.arg(b);
        builder.arg(out);
        builder.arg(&offset_arg);
        builder.arg(&len_arg);
        unsafe {
            builder
                .launch(launch_1d(len))
                .map_err(|e| cuda_err(format!("launch subtract_f32: {e}")))?;
        }
        Ok(())
    }

    fn scale(
        &self,
        buf: &mut CudaSlice<f32>,
        offset: usize,
        len: usize,
        factor: f32,
    ) -> Result<()> {
        check_len("scale", buf.len(), offset.saturating_add(len))?;
        if len == 0 {
            return Ok(());
        }

        let offset_arg = to_c_int("scale offset", offset)?;
        let len_arg = to_c_int("scale len", len)?;
        let mut builder = self.stream.launch_builder(&self.kernels.scale);
        builder.arg(buf);
        builder.arg(&factor);
        builder.arg(&offset_arg);
        builder.arg(&len_arg);
        unsafe {
            builder
                .launch(launch_1d(len))
                .map_err(|e| cuda_err(format!("launch scale_f32: {e}")))?;
        }
        Ok(())
    }

    fn multiply(
        &self,
        a: &CudaSlice<f32>,
        b: &CudaSlice<f32>,
        c: &mut CudaSlice<f32>,
        cfg: &MultiplyConfig,
    ) -> Result<()> {
        cfg.validate(a.len(), b.len(), c.len())?;
        self.stream.memset_zeros(c).map_err(cuda_err)?;
        if cfg.c_shape().is_empty() {
            return Ok(());
        }

        let trans = |t: Transpose| {
            if t.is_transposed() {
                cublas_sys::cublasOperation_t::CUBLAS_OP_T
            } else {
                cublas_sys::cublasOperation_t::CUBLAS_OP_N
            }
        };
        let gemm = GemmConfig {
            transa: trans(cfg.trans_a),
            transb: trans(cfg.trans_b),
            m: to_c_int("multiply m", cfg.m)?,
            n: to_c_int("multiply k", cfg.k)?,
            k: to_c_int("multiply n", cfg.n)?,
            alpha: cfg.effective_alpha(),
            lda: to_c_int("multiply lda", cfg.a_shape().rows.max(1))?,
            ldb: to_c_int("multiply ldb", cfg.b_shape().rows.max(1))?,
            // C was zeroed above and never contributes.
            beta: 0.0f32,
            ldc: to_c_int("multiply ldc", cfg.m)?,
        };
        unsafe {
            self.blas.gemm(gemm, a, b, c).map_err(|e| cublas_err("sgemm", e))?;
        }
        Ok(())
    }

    fn multiply_diagonal(
        &self,
        diag: &CudaSlice<f32>,
        b: &CudaSlice<f32>,
        c: &mut CudaSlice<f32>,
        m: usize,
        n: usize,
    ) -> Result<()> {
        let shape = MatrixShape::new(m, n);
        check_len("multiply_diagonal: diag", diag.len(), m)?;
        check_len("multiply_diagonal: B", b.len(), shape.len()?)?;
        check_len("multiply_diagonal: C", c.len(), shape.len()?)?;
        self.stream.memset_zeros(c).map_err(cuda_err)?;
        if shape.is_empty() {
            return Ok(());
        }

        let m_arg = to_c_int("multiply_diagonal m", m)?;
        let n_arg = to_c_int("multiply_diagonal n", n)?;
        let (d_ptr, _gd) = diag.device_ptr(&self.stream);
        let (b_ptr, _gb) = b.device_ptr(&self.stream);
        let (c_ptr, _gc) = c.device_ptr_mut(&self.stream);
        check_cublas(
            unsafe {
                cublas_sys::cublasSdgmm(
                    *self.blas.handle(),
                    cublas_sys::cublasSideMode_t::CUBLAS_SIDE_LEFT,
                    m_arg,
                    n_arg,
                    b_ptr as *const f32,
                    m_arg,
                    d_ptr as *const f32,
                    1,
                    c_ptr as *mut f32,
                    m_arg,
                )
            },
            "cublasSdgmm",
        )
    }

    fn transpose(
        &self,
        a: &CudaSlice<f32>,
        b: &mut CudaSlice<f32>,
        m: usize,
        n: usize,
    ) -> Result<()> {
        let shape = MatrixShape::new(m, n);
        check_len("transpose: A", a.len(), shape.len()?)?;
        check_len("transpose: B", b.len(), shape.len()?)?;
        if shape.is_empty() {
            return Ok(());
        }

        let grid_x = (m as u64).div_ceil(TILE_DIM as u64);
        let grid_y = (n as u64).div_ceil(TILE_DIM as u64);
        if grid_x > u32::MAX as u64 || grid_y > MAX_GRID as u64 {
            return Err(Error::Validation(format!("transpose: {m}x{n} exceeds the launch grid")));
        }
        let cfg = LaunchConfig {
            grid_dim: (grid_x as u32, grid_y as u32, 1),
            block_dim: (TILE_DIM, BLOCK_ROWS, 1),
            shared_mem_bytes: 0,
        };
        let rows_arg = to_c_int("transpose rows", m)?;
        let cols_arg = to_c_int("transpose cols", n)?;
        let mut builder = self.stream.launch_builder(&self.kernels.transpose);
        builder.arg(a);
        builder.arg(b);
        builder.arg(&rows_arg);
        builder.arg(&cols_arg);
        unsafe {
            builder
                .launch(cfg)
                .map_err(|e| cuda_err(format!("launch transpose_tiled_f32: {e}")))?;
        }
        Ok(())
    }

    fn transpose_in_place(&self, a: &mut CudaSlice<f32>, m: usize, n: usize) -> Result<()> {
        let len = MatrixShape::new(m, n).len()?;
        check_len("transpose: A", a.len(), len)?;
        if len == 0 {
            return Ok(());
        }
        let mut snapshot = self.stream.alloc_zeros::<f32>(len).map_err(cuda_err)?;
        self.copy_prefix(&mut snapshot, a, len)?;
        self.transpose(&snapshot, a, m, n)
    }

    fn svd(
        &self,
        a: &CudaSlice<f32>,
        u: &mut CudaSlice<f32>,
        s: &mut CudaSlice<f32>,
        vt: &mut CudaSlice<f32>,
        m: usize,
        n: usize,
    ) -> Result<()> {
        let len = MatrixShape::new(m, n).len()?;
        check_len("svd: A", a.len(), len)?;
        check_len("svd: U", u.len(), MatrixShape::new(m, m).len()?)?;
        check_len("svd: S", s.len(), m.min(n))?;
        check_len("svd: VT", vt.len(), MatrixShape::new(n, n).len()?)?;
        if len == 0 {
            return Err(Error::Validation(format!("svd: empty matrix {m}x{n}")));
        }

        if m >= n {
            let mut work_a = self.stream.alloc_zeros::<f32>(len).map_err(cuda_err)?;
            self.copy_prefix(&mut work_a, a, len)?;
            return self.gesvd_tall(&mut work_a, u, s, vt, m, n);
        }

        // gesvd needs m >= n: decompose Aᵀ = U' S VT', then U = VT'ᵀ and VT = U'ᵀ.
        let mut at = self.stream.alloc_zeros::<f32>(len).map_err(cuda_err)?;
        self.transpose(a, &mut at, m, n)?;
        let mut u_t = self.stream.alloc_zeros::<f32>(n * n).map_err(cuda_err)?;
        let mut vt_t = self.stream.alloc_zeros::<f32>(m * m).map_err(cuda_err)?;
        self.gesvd_tall(&mut at, &mut u_t, s, &mut vt_t, n, m)?;
        self.transpose(&vt_t, u, m, m)?;
        self.transpose(&u_t, vt, n, n)
    }
}
