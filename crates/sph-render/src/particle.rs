use std::collections::BTreeMap;
use std::time::Instant;

use glam::Vec3;

use crate::error::RenderError;
use crate::units::Unit;

/// A per-particle scalar array with its physical unit.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleArray {
    pub values: Vec<f32>,
    pub unit: Unit,
}

impl ParticleArray {
    pub fn new(values: Vec<f32>, unit: Unit) -> Self {
        Self { values, unit }
    }
}

/// Source of smoothing lengths and densities for a particle set.
///
/// Implemented by the neighbour tree; renderers only consume the result.
pub trait NeighbourSearch {
    /// Returns `(smooth, rho)` in position units and mass / position^3.
    fn smoothing_and_density(
        &self,
        particles: &ParticleSet,
        n_neighbours: usize,
    ) -> Result<(Vec<f32>, Vec<f32>), RenderError>;
}

/// SoA particle storage
///
/// Every array is positionally aligned: index `i` is the same particle in
/// `position`, `velocity` and all named arrays.
#[derive(Clone, Debug)]
pub struct ParticleSet {
    pub count: usize,
    pub position: Vec<Vec3>,
    pub position_unit: Unit,
    pub velocity: Vec<Vec3>,
    pub velocity_unit: Unit,
    /// Named scalar arrays: `mass`, `rho`, `smooth`, `temp`, quantities.
    arrays: BTreeMap<String, ParticleArray>,
    /// Side of the periodic box, in position units.
    pub boxsize: Option<f32>,
    /// Particles were generated from AMR cells (denoise helps there).
    pub grid_derived: bool,
}

impl ParticleSet {
    /// Particles at the origin, at rest, with unit mass in solar masses.
    pub fn new(count: usize) -> Self {
        let mut arrays = BTreeMap::new();
        arrays.insert(
            "mass".to_string(),
            ParticleArray::new(vec![1.0; count], Unit::MSOL),
        );
        Self {
            count,
            position: vec![Vec3::ZERO; count],
            position_unit: Unit::KPC,
            velocity: vec![Vec3::ZERO; count],
            velocity_unit: Unit::KM_PER_S,
            arrays,
            boxsize: None,
            grid_derived: false,
        }
    }

    pub fn from_positions(position: Vec<Vec3>, unit: Unit) -> Self {
        let mut particles = Self::new(position.len());
        particles.position = position;
        particles.position_unit = unit;
        particles
    }

    pub fn set_array(
        &mut self,
        name: &str,
        values: Vec<f32>,
        unit: Unit,
    ) -> Result<(), RenderError> {
        if values.len() != self.count {
            return Err(RenderError::LengthMismatch {
                name: name.to_string(),
                expected: self.count,
                found: values.len(),
            });
        }
        self.arrays
            .insert(name.to_string(), ParticleArray::new(values, unit));
        Ok(())
    }

    pub fn array(&self, name: &str) -> Result<&ParticleArray, RenderError> {
        self.arrays
            .get(name)
            .ok_or_else(|| RenderError::MissingArray(name.to_string()))
    }

    pub fn has_array(&self, name: &str) -> bool {
        self.arrays.contains_key(name)
    }

    pub fn array_names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Check that every array is aligned with the particle count.
    pub fn validate(&self) -> Result<(), RenderError> {
        let vectors = [("pos", self.position.len()), ("vel", self.velocity.len())];
        let scalars = self.arrays.iter().map(|(k, a)| (k.as_str(), a.values.len()));
        for (name, found) in vectors.into_iter().chain(scalars) {
            if found != self.count {
                return Err(RenderError::LengthMismatch {
                    name: name.to_string(),
                    expected: self.count,
                    found,
                });
            }
        }
        Ok(())
    }

    /// Fill `smooth` and `rho` from the neighbour search unless both exist.
    ///
    /// Density needs smoothing lengths consistent with the neighbour count,
    /// so a stored `smooth` is replaced whenever `rho` has to be computed.
    /// A stored `rho` is kept.
    pub fn ensure_smoothing(
        &mut self,
        search: &dyn NeighbourSearch,
        n_neighbours: usize,
    ) -> Result<(), RenderError> {
        let has_rho = self.has_array("rho");
        if self.has_array("smooth") && has_rho {
            return Ok(());
        }
        tracing::info!("Smoothing with {n_neighbours} nearest neighbours");
        let start = Instant::now();
        let (smooth, rho) = search.smoothing_and_density(self, n_neighbours)?;
        let length_unit = self.position_unit;
        let mass_unit = self.array("mass")?.unit;
        self.set_array("smooth", smooth, length_unit)?;
        if !has_rho {
            self.set_array("rho", rho, mass_unit / length_unit.powi(3))?;
        }
        tracing::info!(
            "Smoothing and density done in {:.3}s",
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}
