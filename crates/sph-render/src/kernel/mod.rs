pub mod projected;
pub mod top_hat;
pub mod wendland;

pub use projected::Projected;
pub use top_hat::TopHat;
pub use wendland::WendlandC2;

use std::f32::consts::PI;
use std::sync::OnceLock;

/// Spacing of the lookup table in squared normalised distance.
pub const TABLE_STEP: f32 = 0.02;

/// Number of table entries, covering `d^2` in `[0, 4]`.
pub const TABLE_LEN: usize = 201;

/// Radially symmetric SPH smoothing kernel.
///
/// `value(d, h)` takes the particle-centre distance normalised by the
/// smoothing length and returns the weight in units of `h^-h_power`. It is
/// exactly zero for `d >= max_d`.
pub trait Kernel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Power of `h` normalising the kernel: 3 volumetric, 2 projected.
    fn h_power(&self) -> u32 {
        3
    }

    /// Normalised support radius.
    fn max_d(&self) -> f32 {
        2.0
    }

    fn value(&self, d: f32, h: f32) -> f32;

    /// Kernel sampled at `h = 1` on [`TABLE_LEN`] squared distances.
    /// Built on first use and shared afterwards.
    fn samples(&self) -> &[f32];

    /// Whether a flat-field division is meaningful for this kernel.
    fn supports_denoise(&self) -> bool {
        false
    }
}

/// Compute-once storage for a kernel's lookup table.
///
/// Concurrent first calls race to a single initialisation; every caller
/// sees the same table.
#[derive(Clone, Debug, Default)]
pub struct KernelTable {
    cell: OnceLock<Vec<f32>>,
}

impl KernelTable {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_build(&self, value: impl Fn(f32) -> f32) -> &[f32] {
        self.cell.get_or_init(|| {
            (0..TABLE_LEN)
                .map(|i| value((i as f32 * TABLE_STEP).sqrt()))
                .collect()
        })
    }
}

/// Interpolate a kernel table at squared normalised distance `d2`.
#[inline]
pub fn lookup(samples: &[f32], d2: f32) -> f32 {
    let x = d2 / TABLE_STEP;
    let i = x as usize;
    if i + 1 >= samples.len() {
        return samples.last().copied().unwrap_or(0.0);
    }
    let t = x - i as f32;
    samples[i] * (1.0 - t) + samples[i + 1] * t
}

/// Cubic spline kernel (the default).
///
/// Returns `f(d) / (PI * h^3)` with `f = 1 - 3/2 d^2 + 3/4 d^3` for `d < 1`,
/// `f = (2 - d)^3 / 4` for `1 <= d < 2` and zero beyond.
#[derive(Clone, Debug, Default)]
pub struct CubicSpline {
    table: KernelTable,
}

impl CubicSpline {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Unnormalised cubic spline shape.
#[inline]
pub fn cubic_spline(d: f32) -> f32 {
    if d < 1.0 {
        1.0 - 1.5 * d * d + 0.75 * d * d * d
    } else if d < 2.0 {
        let t = 2.0 - d;
        0.25 * t * t * t
    } else {
        0.0
    }
}

impl Kernel for CubicSpline {
    fn name(&self) -> &'static str {
        "cubic spline"
    }

    fn value(&self, d: f32, h: f32) -> f32 {
        cubic_spline(d) / (PI * h * h * h)
    }

    fn samples(&self) -> &[f32] {
        self.table.get_or_build(|d| self.value(d, 1.0))
    }

    fn supports_denoise(&self) -> bool {
        true
    }
}
