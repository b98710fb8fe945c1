//! Rayon chunk-parallel accumulation (feature-gated).
//!
//! Samples are split into fixed-size chunks; each chunk accumulates a
//! partial sums struct independently, and partials merge sequentially in
//! chunk order, so the result is reproducible run-to-run.

use nalgebra::DVector;
use rayon::prelude::*;

use crate::metric::sums::Accumulate;
use crate::metric::{accumulate_chunk, Collaborators};
use crate::sample::Sample;
use crate::util::MetricResult;

const CHUNK_SIZE: usize = 4096;

pub(crate) fn accumulate_par<A, F>(
    collab: &Collaborators<'_>,
    samples: &[Sample],
    params: &DVector<f64>,
    deriv_params: Option<usize>,
    make: &F,
) -> MetricResult<A>
where
    A: Accumulate,
    F: Fn() -> A + Sync,
{
    let partials: Vec<MetricResult<A>> = samples
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| accumulate_chunk(collab, chunk, params, deriv_params, make))
        .collect();

    let mut merged = make();
    for partial in partials {
        merged.merge(partial?);
    }
    Ok(merged)
}
