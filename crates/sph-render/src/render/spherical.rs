use std::f64::consts::PI;

use crate::error::RenderError;
use crate::field::RenderedField;
use crate::healpix;
use crate::kernel::Kernel;
use crate::particle::ParticleSet;
use crate::units::Unit;

use super::{threaded, Prepared, Quantity};

/// Step of the midpoint rule used to integrate `x K(x)` over each ring.
const RING_INTEGRATION_STEP: f32 = 0.05;

#[derive(Clone, Debug, Default)]
pub struct SphericalOptions {
    /// Ring spacing in smoothing lengths; the config default when unset.
    pub kstep: Option<f32>,
    pub smooth_array: Option<String>,
    /// Length unit of `distance` and of the particle positions.
    pub xy_units: Option<Unit>,
    pub out_units: Option<Unit>,
    pub threaded: Option<usize>,
    pub denoise: Option<bool>,
}

/// Ring radii and disc weights approximating a kernel by nested discs.
///
/// Rings sit at `kstep, 2 kstep, ...` out to the kernel support. Each ring
/// first gets the mean of `K` over its annulus, `2 int x K(x) dx / (d1^2 - d0^2)`;
/// the weights are then differenced outward so that stacking a disc of
/// radius `ds[i]` with weight `w[i]` for every `i` reproduces the stepped
/// kernel.
pub fn ring_weights(kernel: &dyn Kernel, kstep: f32) -> (Vec<f32>, Vec<f32>) {
    let max_d = kernel.max_d();
    let rings = (max_d / kstep - 0.5).ceil().max(1.0) as usize;
    let ds: Vec<f32> = (1..=rings).map(|k| k as f32 * kstep).collect();

    let mut weights: Vec<f32> = ds
        .iter()
        .map(|&d1| {
            let d0 = d1 - kstep;
            let n = ((d1 - d0) / RING_INTEGRATION_STEP - 1e-4).ceil().max(1.0) as usize;
            let integral: f32 = (0..n)
                .map(|k| {
                    let x = d0 + k as f32 * RING_INTEGRATION_STEP;
                    kernel.value(x, 1.0) * x
                })
                .sum::<f32>()
                * RING_INTEGRATION_STEP;
            2.0 * integral / (d1 * d1 - d0 * d0)
        })
        .collect();

    for i in 0..weights.len().saturating_sub(1) {
        weights[i] -= weights[i + 1];
    }
    (ds, weights)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn render(
    particles: &ParticleSet,
    qty: Quantity<'_>,
    nside: usize,
    distance: f32,
    kernel: &dyn Kernel,
    kstep: f32,
    options: &SphericalOptions,
    out_units: Option<Unit>,
    threads: usize,
) -> Result<RenderedField, RenderError> {
    let prepared = Prepared::gather(
        particles,
        qty,
        options.smooth_array.as_deref(),
        options.xy_units,
    )?;
    let h_power = kernel.h_power();
    let (factor, unit) = prepared.output_units(h_power, out_units)?;
    let (ds, weights) = ring_weights(kernel, kstep);
    let npix = healpix::nside2npix(nside);
    let pixel_area = 4.0 * PI / npix as f64;
    let max_d = kernel.max_d();
    let radius = distance as f64;

    tracing::info!(
        "Rendering {} particles onto HEALPix nside {} ({} rings, {} kernel)",
        particles.count,
        nside,
        ds.len(),
        kernel.name()
    );

    let cols = &prepared.columns;
    let mut field = threaded::render(threads, particles.count, |slice| {
        let mut map = RenderedField::zeros(&[npix]);
        let out = map.data_mut();
        let mut disc = Vec::new();

        for i in slice.indices(cols.len()) {
            let pos = cols.position(i).as_dvec3();
            let d = pos.length();
            let h = cols.smoothing(i) as f64;
            if d <= 0.0 || h <= 0.0 {
                continue;
            }
            let included = match h_power {
                3 => (d - radius).abs() < h * max_d as f64,
                _ => d < radius,
            };
            if !included {
                continue;
            }
            let weight = cols.weight(i) as f64 / h.powi(h_power as i32);

            for (&dsi, &wi) in ds.iter().zip(&weights) {
                let s = dsi as f64 * h;
                let theta = if h_power == 3 {
                    if s <= (d - radius).abs() {
                        continue;
                    }
                    ((d * d + radius * radius - s * s) / (2.0 * d * radius))
                        .clamp(-1.0, 1.0)
                        .acos()
                } else {
                    (s / d).atan()
                };
                let value = weight * wi as f64;

                disc.clear();
                healpix::query_disc(nside, pos, theta, &mut disc);
                if disc.is_empty() {
                    // Disc smaller than a pixel: keep its integral.
                    let solid_angle = 2.0 * PI * (1.0 - theta.cos());
                    out[healpix::vec2pix(nside, pos)] += (value * solid_angle / pixel_area) as f32;
                } else {
                    for &p in &disc {
                        out[p] += value as f32;
                    }
                }
            }
        }
        Ok(map)
    })?;

    field.scale(factor);
    field.unit = unit;
    Ok(field)
}
