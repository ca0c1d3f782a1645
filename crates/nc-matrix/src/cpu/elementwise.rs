// Elementwise kernels.
//
// Every output entry depends only on the same-indexed inputs, so the index
// range is cut into disjoint blocks that rayon workers process in any order.
// Inside a block, entries go UNROLL at a time through a fixed-length inner
// loop the compiler can vectorise, then the short remainder one by one.

use rayon::prelude::*;

use crate::config::KernelConfig;

/// Entries processed per unrolled step.
pub const UNROLL: usize = 8;

/// out[i] = f(a[i])
pub fn map<F>(a: &[f64], out: &mut [f64], config: &KernelConfig, f: F)
where
    F: Fn(f64) -> f64 + Sync,
{
    debug_assert_eq!(a.len(), out.len());
    if out.len() >= config.parallel_threshold {
        out.par_chunks_mut(config.block_len)
            .zip(a.par_chunks(config.block_len))
            .for_each(|(o, x)| map_block(x, o, &f));
    } else {
        map_block(a, out, &f);
    }
}

/// out[i] = f(a[i], b[i])
pub fn zip_map<F>(a: &[f64], b: &[f64], out: &mut [f64], config: &KernelConfig, f: F)
where
    F: Fn(f64, f64) -> f64 + Sync,
{
    debug_assert_eq!(a.len(), out.len());
    debug_assert_eq!(b.len(), out.len());
    if out.len() >= config.parallel_threshold {
        out.par_chunks_mut(config.block_len)
            .zip(a.par_chunks(config.block_len))
            .zip(b.par_chunks(config.block_len))
            .for_each(|((o, x), y)| zip_map_block(x, y, o, &f));
    } else {
        zip_map_block(a, b, out, &f);
    }
}

#[inline]
fn map_block<F: Fn(f64) -> f64>(a: &[f64], out: &mut [f64], f: &F) {
    let mut oc = out.chunks_exact_mut(UNROLL);
    let mut ac = a.chunks_exact(UNROLL);
    for (o, x) in oc.by_ref().zip(ac.by_ref()) {
        for i in 0..UNROLL {
            o[i] = f(x[i]);
        }
    }
    for (o, &x) in oc.into_remainder().iter_mut().zip(ac.remainder()) {
        *o = f(x);
    }
}

#[inline]
fn zip_map_block<F: Fn(f64, f64) -> f64>(a: &[f64], b: &[f64], out: &mut [f64], f: &F) {
    let mut oc = out.chunks_exact_mut(UNROLL);
    let mut ac = a.chunks_exact(UNROLL);
    let mut bc = b.chunks_exact(UNROLL);
    for ((o, x), y) in oc.by_ref().zip(ac.by_ref()).zip(bc.by_ref()) {
        for i in 0..UNROLL {
            o[i] = f(x[i], y[i]);
        }
    }
    for ((o, &x), &y) in oc
        .into_remainder()
        .iter_mut()
        .zip(ac.remainder())
        .zip(bc.remainder())
    {
        *o = f(x, y);
    }
}
