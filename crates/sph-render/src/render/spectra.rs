//! Absorption spectra along a sightline parallel to z.
//!
//! Each particle within kernel reach of the sightline contributes a column
//! `N = (qty mass / rho) W2(b / h) / h^2`, spread over velocity bins by a
//! thermal Doppler profile centred on its z velocity. Each bin receives the
//! profile's integral over the bin, so the total is independent of the
//! temperature.

use std::f64::consts::PI;

use crate::error::RenderError;
use crate::field::RenderedField;
use crate::kernel::{lookup, Kernel};
use crate::particle::ParticleSet;
use crate::units::Unit;

use super::{threaded, Prepared, Quantity};

const BOLTZMANN: f64 = 1.380649e-16;
const ELECTRON_MASS: f64 = 9.10938188e-28;
const ELECTRON_CHARGE: f64 = 4.803206e-10;
const SPEED_OF_LIGHT: f64 = 2.99792458e10;
/// Rest wavelength (Angstrom) and oscillator strength of the modelled line.
const LINE_WAVELENGTH: f64 = 1031.9261;
const OSCILLATOR_STRENGTH: f64 = 0.13250;

/// Nucleons per atom of each supported element.
const NUCLEONS: [(&str, u32); 12] = [
    ("H", 1),
    ("He", 4),
    ("Li", 6),
    ("Ne", 10),
    ("C", 12),
    ("N", 14),
    ("O", 16),
    ("Mg", 24),
    ("Si", 28),
    ("S", 32),
    ("Ca", 40),
    ("Fe", 56),
];

pub fn nucleons(element: &str) -> Result<u32, RenderError> {
    NUCLEONS
        .iter()
        .find(|(name, _)| *name == element)
        .map(|&(_, n)| n)
        .ok_or_else(|| RenderError::UnknownElement(element.to_string()))
}

#[derive(Clone, Debug)]
pub struct SpectrumOptions {
    /// Lower velocity edge; `-v2` when unset.
    pub v1: Option<f32>,
    pub v2: f32,
    pub nvel: usize,
    pub element: String,
    /// Ionisation stage label, carried for bookkeeping only.
    pub ion: String,
    pub xy_units: Unit,
    pub vel_units: Unit,
    pub smooth_array: Option<String>,
    pub threaded: Option<usize>,
}

impl Default for SpectrumOptions {
    fn default() -> Self {
        Self {
            v1: None,
            v2: 400.0,
            nvel: 200,
            element: "H".to_string(),
            ion: "I".to_string(),
            xy_units: Unit::KPC,
            vel_units: Unit::KM_PER_S,
            smooth_array: None,
            threaded: None,
        }
    }
}

impl SpectrumOptions {
    pub fn velocity_range(&self) -> (f32, f32) {
        (self.v1.unwrap_or(-self.v2), self.v2)
    }
}

/// Optical depth per velocity bin.
#[derive(Clone, Debug)]
pub struct Spectrum {
    /// Bin-centre velocities in `vel_units`.
    pub velocities: Vec<f32>,
    pub tau: RenderedField,
}

pub(crate) fn render(
    particles: &ParticleSet,
    qty: &str,
    sightline: [f32; 2],
    kernel: &dyn Kernel,
    options: &SpectrumOptions,
    threads: usize,
) -> Result<Spectrum, RenderError> {
    if kernel.h_power() != 2 {
        return Err(RenderError::UnsupportedKernel {
            h_power: kernel.h_power(),
        });
    }
    if options.nvel == 0 {
        return Err(RenderError::InvalidGeometry("spectrum needs at least one bin"));
    }
    let (v1, v2) = options.velocity_range();
    if !(v2 > v1) {
        return Err(RenderError::InvalidGeometry("velocity range is empty"));
    }
    let a = nucleons(&options.element)?;

    let array = particles.array(qty)?;
    let prepared = Prepared::gather(
        particles,
        Quantity {
            values: &array.values,
            unit: array.unit,
        },
        options.smooth_array.as_deref(),
        Some(options.xy_units),
    )?;
    let natural = prepared.qty_unit * prepared.mass_unit
        / (prepared.rho_unit * prepared.length_unit.powi(2));
    let column_unit = Unit::M_P.scaled(a as f64) * Unit::CM.powi(-2);
    let conv_ratio = natural.ratio(&column_unit)?;

    let temp = particles.array("temp")?;
    let temp_scale = temp.unit.ratio(&Unit::KELVIN)?;
    let vel_scale = particles.velocity_unit.ratio(&options.vel_units)? as f32;
    let vel_to_cms = options.vel_units.ratio(&(Unit::CM / Unit::S))?;

    let nvel = options.nvel;
    let dvel = (v2 - v1) / nvel as f32;
    let velocities: Vec<f32> = (0..nvel).map(|j| v1 + (j as f32 + 0.5) * dvel).collect();
    let dvel_cms = dvel as f64 * vel_to_cms;
    let particle_mass = a as f64 * Unit::M_P.scale();

    tracing::info!(
        "Computing {} {} spectrum at ({}, {}) over {} bins",
        options.element,
        options.ion,
        sightline[0],
        sightline[1],
        nvel
    );

    let cols = &prepared.columns;
    let samples = kernel.samples();
    let max_d2 = kernel.max_d() * kernel.max_d();
    let mut tau = threaded::render(threads, particles.count, |slice| {
        let mut bins = vec![0.0_f64; nvel];
        for i in slice.indices(cols.len()) {
            let h = cols.smoothing(i);
            if h <= 0.0 {
                continue;
            }
            let p = cols.position(i);
            let dx = p.x - sightline[0];
            let dy = p.y - sightline[1];
            let b2 = (dx * dx + dy * dy) / (h * h);
            if b2 >= max_d2 {
                continue;
            }
            let column = (cols.weight(i) * lookup(samples, b2) / (h * h)) as f64;
            let vz = particles.velocity[i].z * vel_scale;
            let t = temp.values[i] as f64 * temp_scale;

            if t > 0.0 {
                // Gaussian profile integrated over each bin.
                let b_cms = (2.0 * BOLTZMANN * t / particle_mass).sqrt();
                let b = b_cms / vel_to_cms;
                let vz = vz as f64;
                let mut lower = libm::erf((v1 as f64 - vz) / b);
                for (j, bin) in bins.iter_mut().enumerate() {
                    let edge = v1 as f64 + (j + 1) as f64 * dvel as f64;
                    let upper = libm::erf((edge - vz) / b);
                    *bin += column * 0.5 * PI.sqrt() * (upper - lower) / dvel_cms;
                    lower = upper;
                }
            } else {
                // Zero width: the whole line falls in one bin.
                let j = ((vz - v1) / dvel).floor();
                if j >= 0.0 && (j as usize) < nvel {
                    bins[j as usize] += column * PI.sqrt() / dvel_cms;
                }
            }
        }
        let bins = bins.into_iter().map(|v| v as f32).collect();
        Ok(RenderedField::from_vec(bins, &[nvel]))
    })?;

    let tauconst = PI * ELECTRON_CHARGE * ELECTRON_CHARGE / ELECTRON_MASS / SPEED_OF_LIGHT / PI.sqrt();
    let oscwav0 = LINE_WAVELENGTH * OSCILLATOR_STRENGTH * 1e-8;
    tau.scale(tauconst * oscwav0 * conv_ratio);
    tau.unit = Unit::NONE;
    Ok(Spectrum { velocities, tau })
}
