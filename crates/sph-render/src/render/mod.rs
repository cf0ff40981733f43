//! SPH scatter rendering onto images, 3D grids, HEALPix shells and
//! sightline spectra.
//!
//! Every entry point follows the same shape: resolve options against the
//! [`SphConfig`], work out the output unit (failing before any rendering if
//! the requested unit is incompatible), run the rasterizer through the
//! parallel and multi-resolution drivers, then optionally divide by a
//! flat-field render.

pub mod grid;
pub mod image;
pub mod multires;
pub mod spectra;
pub mod spherical;
pub mod threaded;
pub mod wrap;

pub use grid::{GridGeometry, GridOptions};
pub use image::{ImageGeometry, ImageOptions};
pub use spectra::{Spectrum, SpectrumOptions};
pub use spherical::{ring_weights, SphericalOptions};

use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;

use crate::config::SphConfig;
use crate::error::RenderError;
use crate::field::RenderedField;
use crate::kernel::Kernel;
use crate::particle::ParticleSet;
use crate::units::{Unit, UnitError};

pub(crate) const DEFAULT_SMOOTH: &str = "smooth";

/// Interleaved subset of particle indices: `start, start + step, ...`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub start: usize,
    pub step: usize,
}

impl Slice {
    pub const ALL: Slice = Slice { start: 0, step: 1 };

    pub fn indices(self, n: usize) -> impl Iterator<Item = usize> {
        (self.start..n).step_by(self.step.max(1))
    }
}

/// One resolution level of the multi-resolution renderer.
///
/// Only particles with `smooth_lo * dx <= h < smooth_hi * dx` are drawn,
/// where `dx` is the pixel size after downgrading.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Tier {
    pub downgrade: usize,
    pub smooth_lo: f32,
    pub smooth_hi: f32,
}

impl Tier {
    pub const FULL: Tier = Tier {
        downgrade: 1,
        smooth_lo: 0.0,
        smooth_hi: f32::INFINITY,
    };

    #[inline]
    pub fn accepts(&self, h: f32, dx: f32) -> bool {
        h >= self.smooth_lo * dx && h < self.smooth_hi * dx
    }
}

/// Borrowed particle columns read by the rasterizers.
pub(crate) struct Columns<'a> {
    pub pos: &'a [Vec3],
    pub smooth: &'a [f32],
    pub mass: &'a [f32],
    pub rho: &'a [f32],
    pub qty: &'a [f32],
    /// Position unit to render length unit.
    pub length_scale: f32,
    /// Smoothing unit to render length unit.
    pub smooth_scale: f32,
}

impl<'a> Columns<'a> {
    pub fn len(&self) -> usize {
        self.pos.len()
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        self.pos[i] * self.length_scale
    }

    #[inline]
    pub fn smoothing(&self, i: usize) -> f32 {
        self.smooth[i] * self.smooth_scale
    }

    /// `qty * mass / rho`, the particle's volume-weighted quantity.
    #[inline]
    pub fn weight(&self, i: usize) -> f32 {
        self.qty[i] * self.mass[i] / self.rho[i]
    }
}

/// The quantity being rendered, resolved to values plus unit.
#[derive(Clone, Copy)]
pub(crate) struct Quantity<'a> {
    pub values: &'a [f32],
    pub unit: Unit,
}

/// Everything the unit bookkeeping needs, gathered once per render.
pub(crate) struct Prepared<'a> {
    pub columns: Columns<'a>,
    pub qty_unit: Unit,
    pub mass_unit: Unit,
    pub rho_unit: Unit,
    pub length_unit: Unit,
}

impl<'a> Prepared<'a> {
    pub fn gather(
        particles: &'a ParticleSet,
        qty: Quantity<'a>,
        smooth_array: Option<&str>,
        length_unit: Option<Unit>,
    ) -> Result<Self, RenderError> {
        particles.validate()?;
        let length_unit = length_unit.unwrap_or(particles.position_unit);
        let smooth = particles.array(smooth_array.unwrap_or(DEFAULT_SMOOTH))?;
        let mass = particles.array("mass")?;
        let rho = particles.array("rho")?;
        if qty.values.len() != particles.count {
            return Err(RenderError::LengthMismatch {
                name: "quantity".to_string(),
                expected: particles.count,
                found: qty.values.len(),
            });
        }
        let columns = Columns {
            pos: &particles.position,
            smooth: &smooth.values,
            mass: &mass.values,
            rho: &rho.values,
            qty: qty.values,
            length_scale: particles.position_unit.ratio(&length_unit)? as f32,
            smooth_scale: smooth.unit.ratio(&length_unit)? as f32,
        };
        Ok(Self {
            columns,
            qty_unit: qty.unit,
            mass_unit: mass.unit,
            rho_unit: rho.unit,
            length_unit,
        })
    }

    /// Scale factor and unit of the rendered cells.
    ///
    /// Raw cells carry `qty * (mass/rho) * length^-h_power`. Without a
    /// target unit the `mass/rho` part is folded into `length^3`.
    pub fn output_units(
        &self,
        h_power: u32,
        out_units: Option<Unit>,
    ) -> Result<(f64, Unit), UnitError> {
        let h_power = h_power as i32;
        match out_units {
            None => {
                let factor =
                    (self.mass_unit / self.rho_unit).ratio(&self.length_unit.powi(3))?;
                Ok((factor, self.qty_unit * self.length_unit.powi(3 - h_power)))
            }
            Some(target) => {
                let natural = self.qty_unit * self.mass_unit
                    / (self.rho_unit * self.length_unit.powi(h_power));
                Ok((natural.ratio(&target)?, target))
            }
        }
    }

    /// Periodic box side in render length units.
    pub fn boxsize(&self, particles: &ParticleSet) -> Option<f32> {
        particles.boxsize.map(|b| b * self.columns.length_scale)
    }
}

/// Decide whether to denoise, rejecting kernels that cannot support it.
pub(crate) fn resolve_denoise(
    requested: Option<bool>,
    particles: &ParticleSet,
    kernel: &dyn Kernel,
) -> Result<bool, RenderError> {
    match requested {
        Some(true) if !kernel.supports_denoise() => {
            Err(RenderError::DenoiseUnsupported(kernel.name()))
        }
        Some(v) => Ok(v),
        None => Ok(kernel.supports_denoise() && particles.grid_derived),
    }
}

/// Render `qty` and, when asked, divide by the same render of a unit field.
fn with_denoise(
    particles: &Arc<ParticleSet>,
    qty: &str,
    denoise: bool,
    render: impl Fn(Quantity<'_>, bool) -> Result<RenderedField, RenderError>,
) -> Result<RenderedField, RenderError> {
    let array = particles.array(qty)?;
    let mut field = render(
        Quantity {
            values: &array.values,
            unit: array.unit,
        },
        true,
    )?;
    if denoise {
        let ones = vec![1.0; particles.count];
        let flat = render(
            Quantity {
                values: &ones,
                unit: Unit::NONE,
            },
            false,
        )?;
        field.divide_by(&flat);
        field.unit = field.unit / flat.unit;
    }
    field.attach(particles);
    Ok(field)
}

/// Render an SPH image of `qty` using the (mass/rho)-weighted scatter scheme.
///
/// With a volumetric kernel this is a slice through `z_plane`; with a
/// projected kernel it is a column integral along z.
pub fn render_image(
    particles: &Arc<ParticleSet>,
    qty: &str,
    geometry: &ImageGeometry,
    kernel: &dyn Kernel,
    options: &ImageOptions,
    config: &SphConfig,
) -> Result<RenderedField, RenderError> {
    geometry.validate()?;
    options.validate(kernel)?;
    let denoise = resolve_denoise(options.denoise, particles, kernel)?;
    let approximate = options
        .approximate_fast
        .unwrap_or(config.approximate_fast_images);
    let threads = config.threads_for(options.threaded);

    with_denoise(particles, qty, denoise, |quantity, convert| {
        let out_units = if convert { options.out_units } else { None };
        image::render(
            particles, quantity, geometry, kernel, options, out_units, approximate, threads,
        )
    })
}

/// Project `qty` onto a 3D voxel grid.
pub fn to_3d_grid(
    particles: &Arc<ParticleSet>,
    qty: &str,
    geometry: &GridGeometry,
    kernel: &dyn Kernel,
    options: &GridOptions,
    config: &SphConfig,
) -> Result<RenderedField, RenderError> {
    geometry.validate()?;
    let denoise = resolve_denoise(options.denoise, particles, kernel)?;
    let approximate = options
        .approximate_fast
        .unwrap_or(config.approximate_fast_images);
    let threads = config.threads_for(options.threaded);

    let start = Instant::now();
    let field = with_denoise(particles, qty, denoise, |quantity, convert| {
        let out_units = if convert { options.out_units } else { None };
        grid::render(
            particles, quantity, geometry, kernel, options, out_units, approximate, threads,
        )
    })?;
    tracing::info!("Render done at {:.2} s", start.elapsed().as_secs_f64());
    Ok(field)
}

/// Render `qty` onto a HEALPix map.
///
/// Volumetric kernels sample a shell at `distance` from the origin; projected
/// kernels integrate along radial skewers out to `distance`.
pub fn render_spherical_image(
    particles: &Arc<ParticleSet>,
    qty: &str,
    nside: usize,
    distance: f32,
    kernel: &dyn Kernel,
    options: &SphericalOptions,
    config: &SphConfig,
) -> Result<RenderedField, RenderError> {
    crate::healpix::check_nside(nside)?;
    if !(distance > 0.0) {
        return Err(RenderError::InvalidGeometry("shell distance must be positive"));
    }
    if !matches!(kernel.h_power(), 2 | 3) {
        return Err(RenderError::UnsupportedKernel {
            h_power: kernel.h_power(),
        });
    }
    let denoise = resolve_denoise(options.denoise, particles, kernel)?;
    let threads = config.threads_for(options.threaded);
    let kstep = options.kstep.unwrap_or(config.kernel_step);
    if !(kstep > 0.0) {
        return Err(RenderError::InvalidGeometry("kstep must be positive"));
    }

    with_denoise(particles, qty, denoise, |quantity, convert| {
        let out_units = if convert { options.out_units } else { None };
        spherical::render(
            particles, quantity, nside, distance, kernel, kstep, options, out_units, threads,
        )
    })
}

/// Optical depth along the sightline through `sightline` (x, y), binned in
/// line-of-sight velocity over the range given by `options`.
pub fn spectra(
    particles: &Arc<ParticleSet>,
    qty: &str,
    sightline: [f32; 2],
    kernel: &dyn Kernel,
    options: &SpectrumOptions,
    config: &SphConfig,
) -> Result<Spectrum, RenderError> {
    let threads = config.threads_for(options.threaded);
    let start = Instant::now();
    let mut spectrum = spectra::render(particles, qty, sightline, kernel, options, threads)?;
    spectrum.tau.attach(particles);
    tracing::info!("Spectrum done at {:.2} s", start.elapsed().as_secs_f64());
    Ok(spectrum)
}
