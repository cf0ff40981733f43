use glam::Vec3;

use crate::error::RenderError;
use crate::field::RenderedField;
use crate::kernel::{lookup, Kernel};
use crate::particle::ParticleSet;
use crate::units::Unit;

use super::wrap::wrapping_offsets;
use super::{multires, threaded, Prepared, Quantity, Slice, Tier};

/// Voxel grid bounds and resolution. Voxel `(ix, iy, iz)` is stored at
/// `(ix * ny + iy) * nz + iz`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridGeometry {
    pub min: Vec3,
    pub max: Vec3,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridGeometry {
    /// `n^3` voxels spanning `[-x2, x2]` on every axis.
    pub fn cube(x2: f32, n: usize) -> Self {
        Self::bounds(Vec3::splat(-x2), Vec3::splat(x2), n, n, n)
    }

    pub fn bounds(min: Vec3, max: Vec3, nx: usize, ny: usize, nz: usize) -> Self {
        Self {
            min,
            max,
            nx,
            ny,
            nz,
        }
    }

    /// Smallest box holding every position.
    pub fn enclosing(positions: &[Vec3], nx: usize, ny: usize, nz: usize) -> Self {
        let (min, max) = positions.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), &p| (lo.min(p), hi.max(p)),
        );
        Self::bounds(min, max, nx, ny, nz)
    }

    /// `n^3` voxels over `[min, max]` with `n = ceil((max.x - min.x) / min(eps))`,
    /// so the voxel size matches the smallest gravitational softening.
    /// Bounds are in the particles' position unit.
    pub fn resolved_by_softening(
        particles: &ParticleSet,
        min: Vec3,
        max: Vec3,
    ) -> Result<Self, RenderError> {
        let eps = particles.array("eps")?;
        let scale = eps.unit.ratio(&particles.position_unit)? as f32;
        let finest = eps.values.iter().fold(f32::INFINITY, |m, &e| m.min(e)) * scale;
        if !(finest > 0.0) || !finest.is_finite() {
            return Err(RenderError::InvalidGeometry("softening must be positive"));
        }
        let n = ((max.x - min.x) / finest).ceil().max(1.0) as usize;
        Ok(Self::bounds(min, max, n, n, n))
    }

    pub fn voxel_size(&self) -> Vec3 {
        (self.max - self.min) / Vec3::new(self.nx as f32, self.ny as f32, self.nz as f32)
    }

    pub fn downgraded(&self, factor: usize) -> Self {
        Self {
            nx: (self.nx / factor).max(1),
            ny: (self.ny / factor).max(1),
            nz: (self.nz / factor).max(1),
            ..*self
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub(crate) fn validate(&self) -> Result<(), RenderError> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return Err(RenderError::InvalidGeometry("grid needs at least one voxel per axis"));
        }
        if !self.max.cmpgt(self.min).all() {
            return Err(RenderError::InvalidGeometry("grid bounds are empty"));
        }
        Ok(())
    }
}

/// Per-call options for [`to_3d_grid`](super::to_3d_grid).
#[derive(Clone, Debug, Default)]
pub struct GridOptions {
    pub smooth_array: Option<String>,
    pub xy_units: Option<Unit>,
    pub out_units: Option<Unit>,
    pub approximate_fast: Option<bool>,
    pub threaded: Option<usize>,
    pub denoise: Option<bool>,
}

struct GridPass<'a> {
    prepared: &'a Prepared<'a>,
    geometry: GridGeometry,
    kernel: &'a dyn Kernel,
    wrap: [Vec<f32>; 3],
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn render(
    particles: &ParticleSet,
    qty: Quantity<'_>,
    geometry: &GridGeometry,
    kernel: &dyn Kernel,
    options: &GridOptions,
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
    let (factor, unit) = prepared.output_units(kernel.h_power(), out_units)?;

    let boxsize = prepared.boxsize(particles);
    let pass = GridPass {
        prepared: &prepared,
        geometry: *geometry,
        kernel,
        wrap: [
            wrapping_offsets(boxsize, geometry.min.x, geometry.max.x),
            wrapping_offsets(boxsize, geometry.min.y, geometry.max.y),
            wrapping_offsets(boxsize, geometry.min.z, geometry.max.z),
        ],
    };
    let levels = if approximate {
        multires::levels_for(geometry.nx)
    } else {
        1
    };
    tracing::info!(
        "Gridding {} particles onto {}x{}x{} voxels ({} kernel, {} levels)",
        particles.count,
        geometry.nx,
        geometry.ny,
        geometry.nz,
        kernel.name(),
        levels
    );

    let mut field = threaded::render(threads, particles.count, |slice| {
        multires::render(levels, &geometry.shape(), |tier| Ok(pass.rasterize(tier, slice)))
    })?;
    field.scale(factor);
    field.unit = unit;
    Ok(field)
}

impl GridPass<'_> {
    fn rasterize(&self, tier: Tier, slice: Slice) -> RenderedField {
        let geometry = self.geometry.downgraded(tier.downgrade);
        let n = [geometry.nx as i64, geometry.ny as i64, geometry.nz as i64];
        let cell = geometry.voxel_size();
        let cell_volume = cell.x * cell.y * cell.z;
        let cols = &self.prepared.columns;
        let samples = self.kernel.samples();
        let max_d = self.kernel.max_d();
        let max_d2 = max_d * max_d;
        let h_power = self.kernel.h_power() as i32;
        let normalise = h_power == 3;

        let mut grid = RenderedField::zeros(&geometry.shape());
        let out = grid.data_mut();
        let index = |ix: i64, iy: i64, iz: i64| ((ix * n[1] + iy) * n[2] + iz) as usize;
        let inside = |ix: i64, iy: i64, iz: i64| {
            ix >= 0 && iy >= 0 && iz >= 0 && ix < n[0] && iy < n[1] && iz < n[2]
        };
        let mut footprint: Vec<(usize, f32)> = Vec::new();

        for i in slice.indices(cols.len()) {
            let h = cols.smoothing(i);
            if h <= 0.0 || !tier.accepts(h, cell.x) {
                continue;
            }
            let p = cols.position(i);
            let weight = cols.weight(i);
            let inv_h2 = 1.0 / (h * h);
            let radius = max_d * h;

            for &ox in &self.wrap[0] {
                for &oy in &self.wrap[1] {
                    for &oz in &self.wrap[2] {
                        let c = p + Vec3::new(ox, oy, oz);
                        let lo = ((c - radius - geometry.min) / cell - 0.5).ceil();
                        let hi = ((c + radius - geometry.min) / cell - 0.5).floor();
                        let mut lo = [lo.x as i64, lo.y as i64, lo.z as i64];
                        let mut hi = [hi.x as i64, hi.y as i64, hi.z as i64];

                        let empty = (0..3).any(|a| lo[a] > hi[a]);
                        let outside = (0..3).any(|a| hi[a] < 0 || lo[a] >= n[a]);
                        if outside && !empty {
                            continue;
                        }
                        let analytic = normalise && cell.cmplt(Vec3::splat(radius / 8.0)).all();
                        if !normalise || analytic {
                            for a in 0..3 {
                                lo[a] = lo[a].max(0);
                                hi[a] = hi[a].min(n[a] - 1);
                            }
                        }

                        footprint.clear();
                        let mut total = 0.0_f32;
                        for ix in lo[0]..=hi[0] {
                            let rx = geometry.min.x + (ix as f32 + 0.5) * cell.x - c.x;
                            for iy in lo[1]..=hi[1] {
                                let ry = geometry.min.y + (iy as f32 + 0.5) * cell.y - c.y;
                                let rxy2 = rx * rx + ry * ry;
                                for iz in lo[2]..=hi[2] {
                                    let rz = geometry.min.z + (iz as f32 + 0.5) * cell.z - c.z;
                                    let d2 = (rxy2 + rz * rz) * inv_h2;
                                    if d2 >= max_d2 {
                                        continue;
                                    }
                                    let k = lookup(samples, d2);
                                    total += k;
                                    if inside(ix, iy, iz) {
                                        footprint.push((index(ix, iy, iz), k));
                                    }
                                }
                            }
                        }

                        if normalise {
                            if analytic {
                                total = h * h * h / cell_volume;
                            }
                            if total > 0.0 {
                                let scale = weight / (total * cell_volume);
                                for &(v, k) in &footprint {
                                    out[v] += k * scale;
                                }
                            } else {
                                let home = ((c - geometry.min) / cell).floor();
                                let (ix, iy, iz) = (home.x as i64, home.y as i64, home.z as i64);
                                if home.cmpge(Vec3::ZERO).all() && inside(ix, iy, iz) {
                                    out[index(ix, iy, iz)] += weight / cell_volume;
                                }
                            }
                        } else {
                            let scale = weight / h.powi(h_power);
                            for &(v, k) in &footprint {
                                out[v] += k * scale;
                            }
                        }
                    }
                }
            }
        }
        grid
    }
}
