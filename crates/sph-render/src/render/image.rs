use std::time::Instant;

use crate::error::RenderError;
use crate::field::RenderedField;
use crate::kernel::{lookup, Kernel};
use crate::particle::ParticleSet;
use crate::units::Unit;

use super::wrap::wrapping_offsets;
use super::{multires, threaded, Prepared, Quantity, Slice, Tier};

/// Pixel grid of an image. Edges at `x1..x2`, `y1..y2`; pixel centres at
/// `x1 + (i + 1/2) dx`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImageGeometry {
    pub x1: f32,
    pub x2: f32,
    pub y1: f32,
    pub y2: f32,
    pub nx: usize,
    pub ny: usize,
}

impl ImageGeometry {
    /// Square `nx` by `nx` image spanning `[-x2, x2]` on both axes.
    pub fn new(x2: f32, nx: usize) -> Self {
        Self::with_ny(x2, nx, nx)
    }

    /// `ny` rows with square pixels: `y2 = x2 * ny / nx`.
    pub fn with_ny(x2: f32, nx: usize, ny: usize) -> Self {
        let y2 = x2 * ny as f32 / nx.max(1) as f32;
        Self::bounds(-x2, x2, -y2, y2, nx, ny)
    }

    pub fn bounds(x1: f32, x2: f32, y1: f32, y2: f32, nx: usize, ny: usize) -> Self {
        Self {
            x1,
            x2,
            y1,
            y2,
            nx,
            ny,
        }
    }

    pub fn pixel_size(&self) -> (f32, f32) {
        (
            (self.x2 - self.x1) / self.nx as f32,
            (self.y2 - self.y1) / self.ny as f32,
        )
    }

    /// Same edges, `factor` times fewer pixels per axis.
    pub fn downgraded(&self, factor: usize) -> Self {
        Self {
            nx: (self.nx / factor).max(1),
            ny: (self.ny / factor).max(1),
            ..*self
        }
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.ny, self.nx]
    }

    pub(crate) fn validate(&self) -> Result<(), RenderError> {
        if self.nx == 0 || self.ny == 0 {
            return Err(RenderError::InvalidGeometry("image needs at least one pixel per axis"));
        }
        if !(self.x2 > self.x1 && self.y2 > self.y1) {
            return Err(RenderError::InvalidGeometry("image bounds are empty"));
        }
        Ok(())
    }
}

/// Per-call options for [`render_image`](super::render_image).
#[derive(Clone, Debug, Default)]
pub struct ImageOptions {
    /// Plane sliced by volumetric kernels.
    pub z_plane: f32,
    /// Perspective camera on the z axis looking towards -z. Image bounds are
    /// measured in the z = 0 plane; particles at or behind the camera are
    /// dropped.
    pub z_camera: Option<f32>,
    /// Only particles with z inside this range are drawn.
    pub z_range: Option<(f32, f32)>,
    /// Smoothing lengths below this (in xy units) are raised to it.
    pub smooth_min: f32,
    /// Name of the smoothing-length array, `smooth` by default.
    pub smooth_array: Option<String>,
    pub xy_units: Option<Unit>,
    pub out_units: Option<Unit>,
    pub approximate_fast: Option<bool>,
    /// Thread count; `Some(0)` forces a single thread.
    pub threaded: Option<usize>,
    pub denoise: Option<bool>,
}

impl ImageOptions {
    pub(crate) fn validate(&self, kernel: &dyn Kernel) -> Result<(), RenderError> {
        if let Some(z) = self.z_camera {
            if kernel.h_power() != 2 {
                return Err(RenderError::InvalidGeometry(
                    "perspective rendering needs a projected kernel",
                ));
            }
            if !(z > 0.0) {
                return Err(RenderError::InvalidGeometry("z_camera must be positive"));
            }
        }
        if self.smooth_min < 0.0 {
            return Err(RenderError::InvalidGeometry("smooth_min must not be negative"));
        }
        Ok(())
    }
}

/// Everything fixed across tiers and slices of one image render.
pub(crate) struct ImagePass<'a> {
    pub prepared: &'a Prepared<'a>,
    pub geometry: ImageGeometry,
    pub kernel: &'a dyn Kernel,
    pub z_plane: f32,
    pub z_camera: Option<f32>,
    pub z_range: Option<(f32, f32)>,
    pub smooth_min: f32,
    pub wrap_x: Vec<f32>,
    pub wrap_y: Vec<f32>,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn render(
    particles: &ParticleSet,
    qty: Quantity<'_>,
    geometry: &ImageGeometry,
    kernel: &dyn Kernel,
    options: &ImageOptions,
    out_units: Option<Unit>,
    approximate: bool,
    threads: usize,
) -> Result<RenderedField, RenderError> {
    let prepared = Prepared::gather(
        particles,
        qty,
        options.smooth_array.as_deref(),
        options.xy_units,
    )?;
    // Compute the conversion before rendering so an incompatible unit fails fast.
    let (factor, unit) = prepared.output_units(kernel.h_power(), out_units)?;

    let boxsize = prepared.boxsize(particles);
    let pass = ImagePass {
        prepared: &prepared,
        geometry: *geometry,
        kernel,
        z_plane: options.z_plane,
        z_camera: options.z_camera,
        z_range: options.z_range,
        smooth_min: options.smooth_min,
        wrap_x: wrapping_offsets(boxsize, geometry.x1, geometry.x2),
        wrap_y: wrapping_offsets(boxsize, geometry.y1, geometry.y2),
    };

    let levels = if approximate {
        multires::levels_for(geometry.nx)
    } else {
        1
    };
    tracing::info!(
        "Rendering {} particles onto {}x{} image ({} kernel, {} levels)",
        particles.count,
        geometry.nx,
        geometry.ny,
        kernel.name(),
        levels
    );

    let start = Instant::now();
    let mut field = threaded::render(threads, particles.count, |slice| {
        multires::render(levels, &geometry.shape(), |tier| Ok(pass.rasterize(tier, slice)))
    })?;
    field.scale(factor);
    field.unit = unit;
    tracing::debug!("Image rasterized in {:.3}s", start.elapsed().as_secs_f64());
    Ok(field)
}

impl ImagePass<'_> {
    /// Scatter the particles of `slice` onto the image at `tier`.
    pub fn rasterize(&self, tier: Tier, slice: Slice) -> RenderedField {
        let geometry = self.geometry.downgraded(tier.downgrade);
        let (nx, ny) = (geometry.nx, geometry.ny);
        let (dx, dy) = geometry.pixel_size();
        let cols = &self.prepared.columns;
        let samples = self.kernel.samples();
        let max_d = self.kernel.max_d();
        let max_d2 = max_d * max_d;
        let h_power = self.kernel.h_power() as i32;
        // Column kernels on an image are normalised over their footprint.
        let normalise = h_power == 2;

        let mut image = RenderedField::zeros(&geometry.shape());
        let out = image.data_mut();
        let mut footprint: Vec<(usize, f32)> = Vec::new();

        for i in slice.indices(cols.len()) {
            let p = cols.position(i);
            if let Some((lo, hi)) = self.z_range {
                if p.z < lo || p.z > hi {
                    continue;
                }
            }
            let mut h = cols.smoothing(i).max(self.smooth_min);
            if !tier.accepts(h, dx) {
                continue;
            }

            let (mut x, mut y) = (p.x, p.y);
            let mut dz2 = 0.0;
            if let Some(z_camera) = self.z_camera {
                let depth = z_camera - p.z;
                if depth <= 0.0 {
                    continue;
                }
                let s = z_camera / depth;
                x *= s;
                y *= s;
                h *= s;
            } else if h_power == 3 {
                let dz = p.z - self.z_plane;
                if dz.abs() >= max_d * h {
                    continue;
                }
                dz2 = dz * dz;
            }
            if h <= 0.0 {
                continue;
            }

            let weight = cols.weight(i);
            let inv_h2 = 1.0 / (h * h);
            let radius = (max_d2 * h * h - dz2).max(0.0).sqrt();

            for &ox in &self.wrap_x {
                for &oy in &self.wrap_y {
                    let cx = x + ox;
                    let cy = y + oy;
                    let mut ix_lo = ((cx - radius - geometry.x1) / dx - 0.5).ceil() as i64;
                    let mut ix_hi = ((cx + radius - geometry.x1) / dx - 0.5).floor() as i64;
                    let mut iy_lo = ((cy - radius - geometry.y1) / dy - 0.5).ceil() as i64;
                    let mut iy_hi = ((cy + radius - geometry.y1) / dy - 0.5).floor() as i64;

                    let empty = ix_lo > ix_hi || iy_lo > iy_hi;
                    let outside =
                        ix_hi < 0 || iy_hi < 0 || ix_lo >= nx as i64 || iy_lo >= ny as i64;
                    if outside && !empty {
                        continue;
                    }
                    // Well-resolved footprints use the analytic kernel sum, so
                    // the off-image part need not be visited.
                    let analytic = normalise && radius > 8.0 * dx && radius > 8.0 * dy;
                    if !normalise || analytic {
                        ix_lo = ix_lo.max(0);
                        iy_lo = iy_lo.max(0);
                        ix_hi = ix_hi.min(nx as i64 - 1);
                        iy_hi = iy_hi.min(ny as i64 - 1);
                    }

                    footprint.clear();
                    let mut total = 0.0_f32;
                    for iy in iy_lo..=iy_hi {
                        let py = geometry.y1 + (iy as f32 + 0.5) * dy;
                        let ry2 = (py - cy) * (py - cy);
                        for ix in ix_lo..=ix_hi {
                            let px = geometry.x1 + (ix as f32 + 0.5) * dx;
                            let d2 = ((px - cx) * (px - cx) + ry2 + dz2) * inv_h2;
                            if d2 >= max_d2 {
                                continue;
                            }
                            let k = lookup(samples, d2);
                            total += k;
                            if ix >= 0 && iy >= 0 && (ix as usize) < nx && (iy as usize) < ny {
                                footprint.push((iy as usize * nx + ix as usize, k));
                            }
                        }
                    }

                    if normalise {
                        if analytic {
                            total = h * h / (dx * dy);
                        }
                        if total > 0.0 {
                            let scale = weight / (total * dx * dy);
                            for &(cell, k) in &footprint {
                                out[cell] += k * scale;
                            }
                        } else {
                            // No pixel centre inside the kernel: the particle
                            // lands entirely in the pixel containing it.
                            let ix = ((cx - geometry.x1) / dx).floor();
                            let iy = ((cy - geometry.y1) / dy).floor();
                            if ix >= 0.0 && iy >= 0.0 && (ix as usize) < nx && (iy as usize) < ny {
                                out[iy as usize * nx + ix as usize] += weight / (dx * dy);
                            }
                        }
                    } else {
                        let scale = weight / h.powi(h_power);
                        for &(cell, k) in &footprint {
                            out[cell] += k * scale;
                        }
                    }
                }
            }
        }
        image
    }
}
