//! Smoothed-particle-hydrodynamics rendering of particle data.
//!
//! Scatters per-particle quantities through a smoothing kernel onto 2D
//! images, 3D voxel grids, HEALPix maps and velocity-binned absorption
//! spectra. See [`render`] for the entry points.

pub mod config;
pub mod error;
pub mod field;
pub mod healpix;
pub mod kernel;
pub mod particle;
pub mod render;
pub mod units;

pub use config::SphConfig;
pub use error::RenderError;
pub use field::RenderedField;
pub use kernel::{CubicSpline, Kernel, Projected, TopHat, WendlandC2};
pub use particle::{NeighbourSearch, ParticleArray, ParticleSet};
pub use render::{
    render_image, render_spherical_image, spectra, to_3d_grid, GridGeometry, GridOptions,
    ImageGeometry, ImageOptions, Spectrum, SpectrumOptions, SphericalOptions,
};
pub use units::{Unit, UnitError};
