use std::sync::{Arc, Weak};

use crate::particle::ParticleSet;
use crate::units::Unit;

/// Dense row-major grid of rendered values.
///
/// Images are `[ny, nx]`, 3D grids `[nx, ny, nz]`, spherical maps and
/// spectra are one-dimensional. The field keeps a non-owning link to the
/// particle set it was rendered from.
#[derive(Clone, Debug)]
pub struct RenderedField {
    data: Vec<f32>,
    shape: Vec<usize>,
    pub unit: Unit,
    sim: Weak<ParticleSet>,
}

impl RenderedField {
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self::from_vec(vec![0.0; len], shape)
    }

    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Self {
        debug_assert_eq!(data.len(), shape.iter().product::<usize>());
        Self {
            data,
            shape: shape.to_vec(),
            unit: Unit::NONE,
            sim: Weak::new(),
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Raw cell bytes, native endian.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Value at a multi-dimensional index, `None` when out of range.
    pub fn get(&self, index: &[usize]) -> Option<f32> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (&i, &n) in index.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        self.data.get(flat).copied()
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// The particle set this field came from, if it is still alive.
    pub fn source(&self) -> Option<Arc<ParticleSet>> {
        self.sim.upgrade()
    }

    pub(crate) fn attach(&mut self, particles: &Arc<ParticleSet>) {
        self.sim = Arc::downgrade(particles);
    }

    pub(crate) fn scale(&mut self, factor: f64) {
        if factor == 1.0 {
            return;
        }
        let factor = factor as f32;
        for v in self.data.iter_mut() {
            *v *= factor;
        }
    }

    pub(crate) fn accumulate(&mut self, other: &RenderedField) {
        debug_assert_eq!(self.shape, other.shape);
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += *b;
        }
    }

    /// Divide cell by cell by a flat-field render of the same geometry.
    /// Cells the flat field never reached become zero.
    pub(crate) fn divide_by(&mut self, flat: &RenderedField) {
        debug_assert_eq!(self.shape, flat.shape);
        for (v, &f) in self.data.iter_mut().zip(&flat.data) {
            *v = if f != 0.0 { *v / f } else { 0.0 };
        }
    }
}
