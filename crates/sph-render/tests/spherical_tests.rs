use std::f64::consts::PI;
use std::sync::Arc;

use glam::Vec3;
use sph_render::healpix::{nside2npix, pix2vec};
use sph_render::render::ring_weights;
use sph_render::{
    render_spherical_image, CubicSpline, Kernel, ParticleSet, Projected, RenderError, SphConfig,
    SphericalOptions, Unit,
};

fn particle_at(position: Vec3, h: f32) -> Arc<ParticleSet> {
    let mut p = ParticleSet::from_positions(vec![position], Unit::KPC);
    p.set_array("smooth", vec![h], Unit::KPC).unwrap();
    p.set_array("rho", vec![1.0], Unit::MSOL / Unit::KPC.powi(3))
        .unwrap();
    Arc::new(p)
}

fn options() -> SphericalOptions {
    SphericalOptions {
        threaded: Some(0),
        ..Default::default()
    }
}

#[test]
fn test_ring_weights_reproduce_kernel_integral() {
    let kernel = Projected::new(CubicSpline::new());
    let (ds, weights) = ring_weights(&kernel, 0.5);
    assert_eq!(ds, vec![0.5, 1.0, 1.5, 2.0]);
    let total: f32 = ds
        .iter()
        .zip(&weights)
        .map(|(&d, &w)| w * std::f32::consts::PI * d * d)
        .sum();
    assert!((total - 1.0).abs() < 2e-2, "stacked discs integrate to {total}");
    assert!(weights.iter().all(|&w| w >= 0.0), "kernel is monotone: {weights:?}");
}

#[test]
fn test_shell_peaks_at_particle_direction() {
    let nside = 16;
    let target = 1000;
    let direction = pix2vec(nside, target).as_vec3();
    let particles = particle_at(direction * 10.0, 1.0);
    let map = render_spherical_image(
        &particles,
        "rho",
        nside,
        10.0,
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    assert_eq!(map.shape(), &[nside2npix(nside)]);
    let at_target = map.data()[target];
    assert!(at_target > 0.0);
    assert_eq!(map.max(), at_target, "brightest pixel should face the particle");
}

#[test]
fn test_particle_away_from_shell_is_ignored() {
    let particles = particle_at(Vec3::new(0.0, 20.0, 0.0), 1.0);
    let map = render_spherical_image(
        &particles,
        "rho",
        8,
        10.0,
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    assert_eq!(map.sum(), 0.0);
}

#[test]
fn test_projected_skewers_conserve_weight() {
    let nside = 128;
    let distance = 20.0_f32;
    let particles = particle_at(Vec3::new(distance, 0.0, 0.0), 1.0);
    let map = render_spherical_image(
        &particles,
        "rho",
        nside,
        30.0,
        &Projected::new(CubicSpline::new()),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    let pixel_area = 4.0 * PI / nside2npix(nside) as f64;
    let total = map.sum() * pixel_area * (distance as f64).powi(2);
    assert!((total - 1.0).abs() < 0.05, "skewer map integrates to {total}");
}

#[test]
fn test_projected_ignores_particles_beyond_distance() {
    let particles = particle_at(Vec3::new(40.0, 0.0, 0.0), 1.0);
    let map = render_spherical_image(
        &particles,
        "rho",
        8,
        30.0,
        &Projected::new(CubicSpline::new()),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    assert_eq!(map.sum(), 0.0);
}

struct FourDimensional(CubicSpline);

impl Kernel for FourDimensional {
    fn name(&self) -> &'static str {
        "4d"
    }

    fn h_power(&self) -> u32 {
        4
    }

    fn value(&self, d: f32, h: f32) -> f32 {
        self.0.value(d, h)
    }

    fn samples(&self) -> &[f32] {
        self.0.samples()
    }
}

#[test]
fn test_unknown_kernel_dimension_rejected() {
    let particles = particle_at(Vec3::new(10.0, 0.0, 0.0), 1.0);
    let result = render_spherical_image(
        &particles,
        "rho",
        8,
        10.0,
        &FourDimensional(CubicSpline::new()),
        &options(),
        &SphConfig::default(),
    );
    assert!(matches!(
        result,
        Err(RenderError::UnsupportedKernel { h_power: 4 })
    ));
}

#[test]
fn test_invalid_nside_rejected() {
    let particles = particle_at(Vec3::new(10.0, 0.0, 0.0), 1.0);
    let result = render_spherical_image(
        &particles,
        "rho",
        6,
        10.0,
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    );
    assert!(matches!(result, Err(RenderError::InvalidNside(6))));
}

/// Particles scattered in a thick shell of radius `r` around the origin.
fn shell_of_particles(n: usize, r: f32) -> ParticleSet {
    let positions = (0..n)
        .map(|i| {
            let t = i as f32;
            let z = (t * 0.754_877_7).fract() * 2.0 - 1.0;
            let phi = (t * 0.569_840_3).fract() * std::f32::consts::TAU;
            let radius = r + ((t * 0.414_213_6).fract() - 0.5) * 2.0;
            let s = (1.0 - z * z).sqrt();
            Vec3::new(s * phi.cos(), s * phi.sin(), z) * radius
        })
        .collect();
    let mut p = ParticleSet::from_positions(positions, Unit::KPC);
    p.set_array("smooth", (0..n).map(|i| 1.0 + 0.5 * (i % 3) as f32).collect(), Unit::KPC)
        .unwrap();
    p.set_array("rho", vec![1.0; n], Unit::MSOL / Unit::KPC.powi(3))
        .unwrap();
    p
}

#[test]
fn test_threaded_shell_matches_single_thread() {
    let particles = Arc::new(shell_of_particles(400, 10.0));
    let kernel = CubicSpline::new();
    let single = render_spherical_image(
        &particles,
        "rho",
        8,
        10.0,
        &kernel,
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    let threaded = render_spherical_image(
        &particles,
        "rho",
        8,
        10.0,
        &kernel,
        &SphericalOptions {
            threaded: Some(4),
            ..Default::default()
        },
        &SphConfig::default(),
    )
    .unwrap();

    let peak = single.max();
    assert!(peak > 0.0);
    for (a, b) in single.data().iter().zip(threaded.data()) {
        assert!(
            (a - b).abs() <= peak * 1e-5,
            "threaded pixel {b} differs from single-threaded {a}"
        );
    }
}

#[test]
fn test_denoised_shell_recovers_uniform_field() {
    let n = 400;
    let mut p = shell_of_particles(n, 10.0);
    p.set_array("temp", vec![7.0; n], Unit::KELVIN).unwrap();
    let particles = Arc::new(p);
    let map = render_spherical_image(
        &particles,
        "temp",
        8,
        10.0,
        &CubicSpline::new(),
        &SphericalOptions {
            denoise: Some(true),
            ..options()
        },
        &SphConfig::default(),
    )
    .unwrap();

    let covered: Vec<f32> = map.data().iter().copied().filter(|&v| v != 0.0).collect();
    assert!(!covered.is_empty(), "shell should cover some pixels");
    for v in covered {
        assert!((v - 7.0).abs() < 1e-3, "denoised pixel {v}, expected 7");
    }
    assert_eq!(map.unit, Unit::KELVIN);
}
