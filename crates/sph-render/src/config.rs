use std::env;
use std::str::FromStr;

/// Process-wide rendering defaults.
///
/// Built once by the caller and handed to every render entry point. Per-call
/// options that are left unset fall back to these values.
#[derive(Clone, Debug, PartialEq)]
pub struct SphConfig {
    /// Render on several threads when a call does not say otherwise.
    pub threaded_image: bool,
    pub number_of_threads: usize,
    /// Use the multi-resolution renderer by default.
    pub approximate_fast_images: bool,
    /// Neighbour count used when smoothing lengths have to be computed.
    pub smooth_particles: usize,
    /// Ring step, in smoothing lengths, for spherical projections.
    pub kernel_step: f32,
}

impl Default for SphConfig {
    fn default() -> Self {
        Self {
            threaded_image: true,
            number_of_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            approximate_fast_images: false,
            smooth_particles: 32,
            kernel_step: 0.5,
        }
    }
}

impl SphConfig {
    /// Defaults overlaid with `SPH_THREADED_IMAGE`, `SPH_NUM_THREADS`,
    /// `SPH_APPROXIMATE_FAST_IMAGES` and `SPH_SMOOTH_PARTICLES`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = read_var("SPH_THREADED_IMAGE") {
            config.threaded_image = v;
        }
        if let Some(v) = read_var("SPH_NUM_THREADS") {
            config.number_of_threads = v;
        }
        if let Some(v) = read_var("SPH_APPROXIMATE_FAST_IMAGES") {
            config.approximate_fast_images = v;
        }
        if let Some(v) = read_var("SPH_SMOOTH_PARTICLES") {
            config.smooth_particles = v;
        }
        config
    }

    /// Thread count to use when a call leaves threading unspecified.
    /// Zero means single-threaded.
    pub fn default_threads(&self) -> usize {
        if self.threaded_image {
            self.number_of_threads
        } else {
            0
        }
    }

    /// Resolve a per-call thread request against the defaults.
    pub fn threads_for(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or_else(|| self.default_threads())
    }
}

fn read_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("ignoring {name}={raw:?}: not a valid value");
            None
        }
    }
}
