use thiserror::Error;

use crate::units::UnitError;

/// Errors raised by the rendering entry points.
///
/// Every variant is fatal to the render call that produced it; no partial
/// image is ever returned.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Denoising needs the bare volumetric kernel contract.
    #[error("denoising is not supported with the {0} kernel; re-run with denoise disabled")]
    DenoiseUnsupported(&'static str),

    /// Spherical maps need h_power 2 or 3; spectra need a projected kernel.
    #[error("this renderer cannot use a kernel of h_power {h_power}")]
    UnsupportedKernel { h_power: u32 },

    #[error(transparent)]
    Units(#[from] UnitError),

    /// One or more parallel slices produced no output.
    #[error(
        "{failed} of {total} render slices failed; try running again single-threaded to debug the underlying error"
    )]
    ParallelRender { failed: usize, total: usize },

    #[error("particle array '{0}' is not available")]
    MissingArray(String),

    #[error("particle array '{name}' has {found} entries, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid render geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("no nucleon count known for element '{0}'")]
    UnknownElement(String),

    /// HEALPix resolution must be a positive power of two.
    #[error("nside {0} is not a power of two")]
    InvalidNside(usize),

    #[error("could not start render thread pool: {0}")]
    ThreadPool(String),
}
