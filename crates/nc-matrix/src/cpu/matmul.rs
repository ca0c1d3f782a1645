// Matrix multiplication kernel.
//
// out[r][c] = sum_i a[r][i] * b[i][c]
//
// Layout of the work:
// - `b` is packed transposed so each output column's reduction reads a
//   contiguous run, like the row of `a` it is paired with.
// - Output rows are independent; above the configured size they are spread
//   over the rayon pool, each task owning a disjoint run of rows of `out`.
// - Within a row, output columns are computed in pairs so every W-wide chunk
//   of the `a` row is loaded once for two dot products. An odd last column is
//   reduced on its own.
// - The reduction accumulates W lanes per step. The trailing partial chunk is
//   copied into zeroed lanes, so missing lanes add exactly 0.0 and nothing past
//   the end of either operand is read.
//
// Summation order differs from the naive loop (per-lane partial sums), which
// can move results by a few ulps.

use rayon::prelude::*;
use tracing::trace;

use crate::config::KernelConfig;
use crate::error::Result;
use crate::storage::try_zeroed;

/// Lane width used by the production backend.
pub const LANES: usize = 4;

/// Compute `out = a @ b` with a reduction width of `W` lanes.
///
/// `a` is [m, k], `b` is [k, n], `out` is [m, n], all row-major. Every entry
/// of `out` is overwritten.
pub fn matmul<const W: usize>(
    a: &[f64],
    b: &[f64],
    out: &mut [f64],
    m: usize,
    k: usize,
    n: usize,
    config: &KernelConfig,
) -> Result<()> {
    debug_assert!(W > 0, "lane width must be non-zero");
    debug_assert_eq!(a.len(), m * k);
    debug_assert_eq!(b.len(), k * n);
    debug_assert_eq!(out.len(), m * n);

    let bt = transpose(b, k, n)?;
    let row_kernel = |(r, out_row): (usize, &mut [f64])| {
        row::<W>(&a[r * k..(r + 1) * k], &bt, out_row, k);
    };

    let work = m.saturating_mul(k).saturating_mul(n);
    if work >= config.matmul_parallel_threshold && m > 1 {
        trace!(m, k, n, lanes = W, "matmul: parallel over rows");
        out.par_chunks_mut(n)
            .with_min_len(config.min_rows_per_task)
            .enumerate()
            .for_each(row_kernel);
    } else {
        trace!(m, k, n, lanes = W, "matmul: sequential");
        out.chunks_mut(n).enumerate().for_each(row_kernel);
    }
    Ok(())
}

/// Pack `b` ([k, n]) as its transpose ([n, k]).
fn transpose(b: &[f64], k: usize, n: usize) -> Result<Vec<f64>> {
    let mut bt = try_zeroed(k * n)?;
    for (i, b_row) in b.chunks_exact(n).enumerate() {
        for (c, &v) in b_row.iter().enumerate() {
            bt[c * k + i] = v;
        }
    }
    Ok(bt)
}

/// One output row: paired columns, then the odd column if any.
#[inline]
fn row<const W: usize>(a_row: &[f64], bt: &[f64], out_row: &mut [f64], k: usize) {
    let n = out_row.len();
    let mut pairs = out_row.chunks_exact_mut(2);
    for (p, pair) in pairs.by_ref().enumerate() {
        let c = 2 * p;
        let col0 = &bt[c * k..(c + 1) * k];
        let col1 = &bt[(c + 1) * k..(c + 2) * k];
        let (s0, s1) = dot_pair::<W>(a_row, col0, col1);
        pair[0] = s0;
        pair[1] = s1;
    }
    if let [last] = pairs.into_remainder() {
        let c = n - 1;
        *last = dot::<W>(a_row, &bt[c * k..(c + 1) * k]);
    }
}

/// Two dot products sharing every loaded chunk of `a`.
#[inline]
fn dot_pair<const W: usize>(a: &[f64], x: &[f64], y: &[f64]) -> (f64, f64) {
    let mut acc0 = [0.0f64; W];
    let mut acc1 = [0.0f64; W];

    let mut ac = a.chunks_exact(W);
    let mut xc = x.chunks_exact(W);
    let mut yc = y.chunks_exact(W);
    for ((va, vx), vy) in ac.by_ref().zip(xc.by_ref()).zip(yc.by_ref()) {
        for l in 0..W {
            acc0[l] += va[l] * vx[l];
            acc1[l] += va[l] * vy[l];
        }
    }

    let ta = masked::<W>(ac.remainder());
    let tx = masked::<W>(xc.remainder());
    let ty = masked::<W>(yc.remainder());
    for l in 0..W {
        acc0[l] += ta[l] * tx[l];
        acc1[l] += ta[l] * ty[l];
    }

    (horizontal_sum(&acc0), horizontal_sum(&acc1))
}

#[inline]
fn dot<const W: usize>(a: &[f64], x: &[f64]) -> f64 {
    let mut acc = [0.0f64; W];

    let mut ac = a.chunks_exact(W);
    let mut xc = x.chunks_exact(W);
    for (va, vx) in ac.by_ref().zip(xc.by_ref()) {
        for l in 0..W {
            acc[l] += va[l] * vx[l];
        }
    }

    let ta = masked::<W>(ac.remainder());
    let tx = masked::<W>(xc.remainder());
    for l in 0..W {
        acc[l] += ta[l] * tx[l];
    }

    horizontal_sum(&acc)
}

/// Load a partial chunk into a full lane array, zeroing the missing lanes.
#[inline]
fn masked<const W: usize>(tail: &[f64]) -> [f64; W] {
    let mut lanes = [0.0f64; W];
    lanes[..tail.len()].copy_from_slice(tail);
    lanes
}

#[inline]
fn horizontal_sum<const W: usize>(acc: &[f64; W]) -> f64 {
    acc.iter().sum()
}
