//! Host-side model evaluation for the CPU backend.

use crate::{CurveModel, check_params};
use cf_core::{Result, check_len};
use rayon::prelude::*;

const PAR_MIN_LEN: usize = 4096;

pub(crate) fn evaluate<M: CurveModel>(out: &mut [f32], params: &[f32], n: usize) -> Result<()> {
    check_params(M::NAME, M::N_PARAMS, params)?;
    check_len(M::NAME, out.len(), n)?;
    out[..n]
        .par_iter_mut()
        .with_min_len(PAR_MIN_LEN)
        .enumerate()
        .for_each(|(i, v)| *v = M::value(params, i as f32));
    Ok(())
}
