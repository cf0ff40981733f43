//! Multi-resolution ("approximate fast") rendering.
//!
//! Particles with large smoothing lengths cover many pixels but carry little
//! small-scale structure, so they are drawn on progressively coarser grids
//! and interpolated back up. Level 1 draws every particle smaller than two
//! pixels at full resolution; each further level halves the resolution and
//! draws particles between one and two of its own pixels, the last level
//! taking everything larger.

use crate::error::RenderError;
use crate::field::RenderedField;

use super::Tier;

/// Number of resolution levels for an `nx`-pixel-wide render:
/// `floor(log2(nx / 20))`, at least 1.
pub fn levels_for(nx: usize) -> usize {
    let ratio = nx as f64 / 20.0;
    if ratio < 2.0 {
        return 1;
    }
    (ratio.log2().floor() as usize).max(1)
}

/// The tiers visited for `levels` levels, finest first.
pub(crate) fn tiers(levels: usize) -> Vec<Tier> {
    if levels <= 1 {
        return vec![Tier::FULL];
    }
    let mut tiers = vec![Tier {
        downgrade: 1,
        smooth_lo: 0.0,
        smooth_hi: 2.0,
    }];
    let mut sub = 1;
    for level in 1..levels {
        sub *= 2;
        let smooth_hi = if level == levels - 1 { f32::INFINITY } else { 2.0 };
        tiers.push(Tier {
            downgrade: sub,
            smooth_lo: 1.0,
            smooth_hi,
        });
    }
    tiers
}

/// Run `rasterize` once per tier and sum the upsampled results.
pub(crate) fn render(
    levels: usize,
    shape: &[usize],
    rasterize: impl Fn(Tier) -> Result<RenderedField, RenderError>,
) -> Result<RenderedField, RenderError> {
    let mut tiers = tiers(levels).into_iter();
    let first = tiers.next().unwrap_or(Tier::FULL);
    let mut base = rasterize(first)?;
    for tier in tiers {
        let coarse = rasterize(tier)?;
        tracing::debug!(
            "Level with downgrade {} rendered at {:?}",
            tier.downgrade,
            coarse.shape()
        );
        base.accumulate(&zoom_linear(&coarse, shape));
    }
    Ok(base)
}

/// Resample `field` to `shape` by separable linear interpolation between
/// cell centres, holding edge values constant beyond the outermost centres.
pub fn zoom_linear(field: &RenderedField, shape: &[usize]) -> RenderedField {
    debug_assert_eq!(field.shape().len(), shape.len(), "zoom must keep dimensionality");
    let mut current = field.data().to_vec();
    let mut cur_shape = field.shape().to_vec();

    for axis in 0..shape.len() {
        let n_in = cur_shape[axis];
        let n_out = shape[axis];
        if n_in == n_out {
            continue;
        }
        let outer: usize = cur_shape[..axis].iter().product();
        let inner: usize = cur_shape[axis + 1..].iter().product();
        let mut next = vec![0.0_f32; outer * n_out * inner];
        let scale = n_in as f32 / n_out as f32;

        for j in 0..n_out {
            let src = ((j as f32 + 0.5) * scale - 0.5).clamp(0.0, (n_in - 1) as f32);
            let i0 = src.floor() as usize;
            let i1 = (i0 + 1).min(n_in - 1);
            let t = src - i0 as f32;
            for o in 0..outer {
                let a = (o * n_in + i0) * inner;
                let b = (o * n_in + i1) * inner;
                let dst = (o * n_out + j) * inner;
                for k in 0..inner {
                    next[dst + k] = current[a + k] * (1.0 - t) + current[b + k] * t;
                }
            }
        }
        current = next;
        cur_shape[axis] = n_out;
    }

    let mut zoomed = RenderedField::from_vec(current, shape);
    zoomed.unit = field.unit;
    zoomed
}
