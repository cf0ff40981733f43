use std::sync::Arc;

use glam::Vec3;
use sph_render::{
    to_3d_grid, CubicSpline, GridGeometry, GridOptions, ParticleSet, RenderError, SphConfig, Unit,
    WendlandC2,
};

fn cloud(positions: Vec<Vec3>, h: f32) -> ParticleSet {
    let n = positions.len();
    let mut p = ParticleSet::from_positions(positions, Unit::KPC);
    p.set_array("smooth", vec![h; n], Unit::KPC).unwrap();
    p.set_array("rho", vec![1.0; n], Unit::MSOL / Unit::KPC.powi(3))
        .unwrap();
    p
}

fn options() -> GridOptions {
    GridOptions {
        threaded: Some(0),
        ..Default::default()
    }
}

#[test]
fn test_grid_conserves_weight() {
    let particles = Arc::new(cloud(vec![Vec3::new(0.02, -0.03, 0.01); 10], 0.1));
    let geometry = GridGeometry::cube(1.0, 20);
    let grid = to_3d_grid(
        &particles,
        "rho",
        &geometry,
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    let cell = geometry.voxel_size();
    let total = grid.sum() * (cell.x * cell.y * cell.z) as f64;
    assert!((total - 10.0).abs() < 1e-3, "grid integrates to {total}, expected 10");
    assert_eq!(grid.shape(), &[20, 20, 20]);
    assert!(!grid.unit.is_dimensionless());
    assert_eq!(grid.unit.dims(), (Unit::MSOL / Unit::KPC.powi(3)).dims());
}

#[test]
fn test_grid_voxel_layout() {
    // Centre of voxel (15, 9, 9); the kernel reaches no other voxel centre.
    let particles = Arc::new(cloud(vec![Vec3::new(0.55, -0.05, -0.05)], 0.04));
    let grid = to_3d_grid(
        &particles,
        "rho",
        &GridGeometry::cube(1.0, 20),
        &WendlandC2::new(),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    let v = grid.get(&[15, 9, 9]).unwrap();
    assert!((v - 1000.0).abs() < 1.0, "voxel holds {v}, expected 1000");
    assert_eq!(grid.get(&[9, 9, 15]), Some(0.0));
}

#[test]
fn test_grid_wraps_in_all_axes() {
    let mut particles = cloud(vec![Vec3::new(0.0, 0.0, 0.97)], 0.1);
    particles.boxsize = Some(2.0);
    let particles = Arc::new(particles);
    let geometry = GridGeometry::cube(1.0, 10);
    let grid = to_3d_grid(
        &particles,
        "rho",
        &geometry,
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    let bottom: f32 = (0..10)
        .flat_map(|ix| (0..10).map(move |iy| (ix, iy)))
        .map(|(ix, iy)| grid.get(&[ix, iy, 0]).unwrap())
        .sum();
    assert!(bottom > 0.0, "particle near +z should wrap to the bottom layer");
    let cell = geometry.voxel_size();
    let total = grid.sum() * (cell.x * cell.y * cell.z) as f64;
    assert!((total - 1.0).abs() < 1e-3, "wrapped grid integrates to {total}");
}

#[test]
fn test_enclosing_geometry() {
    let positions = vec![
        Vec3::new(-1.0, 0.5, 2.0),
        Vec3::new(3.0, -2.0, 0.0),
        Vec3::new(0.0, 1.0, -4.0),
    ];
    let geometry = GridGeometry::enclosing(&positions, 8, 4, 2);
    assert_eq!(geometry.min, Vec3::new(-1.0, -2.0, -4.0));
    assert_eq!(geometry.max, Vec3::new(3.0, 1.0, 2.0));
    assert_eq!(geometry.shape(), [8, 4, 2]);
    assert_eq!(geometry.voxel_size(), Vec3::new(0.5, 0.75, 3.0));
}

#[test]
fn test_resolution_follows_softening() {
    let mut particles = cloud(vec![Vec3::ZERO; 3], 0.1);
    assert!(matches!(
        GridGeometry::resolved_by_softening(&particles, Vec3::splat(-1.0), Vec3::splat(1.0)),
        Err(RenderError::MissingArray(name)) if name == "eps"
    ));

    particles
        .set_array("eps", vec![0.5, 0.25, 1.0], Unit::KPC)
        .unwrap();
    let geometry =
        GridGeometry::resolved_by_softening(&particles, Vec3::splat(-1.0), Vec3::splat(1.0))
            .unwrap();
    assert_eq!(geometry.shape(), [8, 8, 8]);
    assert_eq!(geometry.voxel_size(), Vec3::splat(0.25));

    particles
        .set_array("eps", vec![0.5, 0.0, 1.0], Unit::KPC)
        .unwrap();
    assert!(matches!(
        GridGeometry::resolved_by_softening(&particles, Vec3::splat(-1.0), Vec3::splat(1.0)),
        Err(RenderError::InvalidGeometry(_))
    ));
}

#[test]
fn test_empty_grid_rejected() {
    let particles = Arc::new(cloud(vec![Vec3::ZERO], 0.1));
    let result = to_3d_grid(
        &particles,
        "rho",
        &GridGeometry::cube(1.0, 0),
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    );
    assert!(matches!(result, Err(RenderError::InvalidGeometry(_))));
}

#[test]
fn test_grid_threaded_and_fast_agree_for_small_particles() {
    let positions: Vec<Vec3> = (0..200)
        .map(|i| {
            let t = i as f32;
            Vec3::new(
                (t * 0.7548777).fract() - 0.5,
                (t * 0.5698403).fract() - 0.5,
                (t * 0.4143).fract() - 0.5,
            )
        })
        .collect();
    let particles = Arc::new(cloud(positions, 0.02));
    let geometry = GridGeometry::cube(1.0, 80);
    let single = to_3d_grid(
        &particles,
        "rho",
        &geometry,
        &CubicSpline::new(),
        &options(),
        &SphConfig::default(),
    )
    .unwrap();
    let fast = to_3d_grid(
        &particles,
        "rho",
        &geometry,
        &CubicSpline::new(),
        &GridOptions {
            threaded: Some(4),
            approximate_fast: Some(true),
            ..Default::default()
        },
        &SphConfig::default(),
    )
    .unwrap();
    let peak = single.max();
    for (a, b) in single.data().iter().zip(fast.data()) {
        assert!((a - b).abs() <= peak * 1e-5, "voxel {b} vs {a}");
    }
}
