//! Device-side model evaluation through the `models` kernel namespace.

use crate::{CurveModel, check_params};
use cf_compute::CudaBackend;
use cf_core::{Error, Result, check_len};
use cudarc::driver::{CudaSlice, PushKernelArg};
use core::ffi::c_int;

const MODELS_NAMESPACE: &str = "models";
const MODELS_SRC: &str = include_str!("../kernels/models.cu");

fn n_arg(n: usize) -> Result<c_int> {
    c_int::try_from(n).map_err(|_| Error::Validation(format!("n={n} exceeds i32::MAX")))
}

/// Launch `function(out, n, params...)` over `n` samples.
pub(crate) fn launch(
    backend: &CudaBackend,
    function: &str,
    out: &mut CudaSlice<f32>,
    params: &[f32],
    n: usize,
) -> Result<()> {
    if n == 0 {
        return Ok(());
    }
    let func = backend.kernel(MODELS_NAMESPACE, MODELS_SRC, function)?;
    let n_arg = n_arg(n)?;
    let mut builder = backend.stream().launch_builder(&func);
    builder.arg(out);
    builder.arg(&n_arg);
    for p in params {
        builder.arg(p);
    }
    unsafe {
        builder
            .launch(backend.launch_config_1d(n))
            .map_err(|e| Error::Computation(format!("launch {function}: {e}")))?;
    }
    Ok(())
}

pub(crate) fn evaluate<M: CurveModel>(
    backend: &CudaBackend,
    out: &mut CudaSlice<f32>,
    params: &[f32],
    n: usize,
) -> Result<()> {
    check_params(M::NAME, M::N_PARAMS, params)?;
    check_len(M::NAME, out.len(), n)?;
    launch(backend, M::KERNEL, out, params, n)
}
