//! HEALPix pixelisation of the sphere, RING ordering.
//!
//! Only what the spherical renderer needs: pixel centres, the pixel
//! containing a direction, and the pixels whose centres fall inside a disc.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::DVec3;

use crate::error::RenderError;

pub fn nside2npix(nside: usize) -> usize {
    12 * nside * nside
}

pub fn check_nside(nside: usize) -> Result<(), RenderError> {
    if nside == 0 || !nside.is_power_of_two() {
        return Err(RenderError::InvalidNside(nside));
    }
    Ok(())
}

/// One iso-latitude ring. Pixel `j` of the ring sits at
/// `phi = (j + shift) * 2 PI / npix`.
#[derive(Clone, Copy, Debug)]
struct Ring {
    first: usize,
    npix: usize,
    z: f64,
    shift: f64,
}

/// Ring `i`, counted from the north pole, `1 <= i <= 4 nside - 1`.
fn ring(nside: usize, i: usize) -> Ring {
    let ns = nside as f64;
    let ncap = 2 * nside * (nside - 1);
    if i < nside {
        Ring {
            first: 2 * i * (i - 1),
            npix: 4 * i,
            z: 1.0 - (i * i) as f64 / (3.0 * ns * ns),
            shift: 0.5,
        }
    } else if i <= 3 * nside {
        Ring {
            first: ncap + (i - nside) * 4 * nside,
            npix: 4 * nside,
            z: 4.0 / 3.0 - 2.0 * i as f64 / (3.0 * ns),
            shift: if (i + nside) % 2 == 1 { 0.0 } else { 0.5 },
        }
    } else {
        let k = 4 * nside - i;
        Ring {
            first: nside2npix(nside) - 2 * k * (k + 1),
            npix: 4 * k,
            z: -(1.0 - (k * k) as f64 / (3.0 * ns * ns)),
            shift: 0.5,
        }
    }
}

fn isqrt(v: usize) -> usize {
    let mut r = (v as f64).sqrt() as usize;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

fn ring_of_pixel(nside: usize, ipix: usize) -> usize {
    let npix = nside2npix(nside);
    let ncap = 2 * nside * (nside - 1);
    if ipix < ncap {
        (1 + isqrt(1 + 2 * ipix)) >> 1
    } else if ipix < npix - ncap {
        (ipix - ncap) / (4 * nside) + nside
    } else {
        let ip = npix - ipix;
        4 * nside - ((1 + isqrt(2 * ip - 1)) >> 1)
    }
}

/// Unit vector through the centre of pixel `ipix`.
pub fn pix2vec(nside: usize, ipix: usize) -> DVec3 {
    let r = ring(nside, ring_of_pixel(nside, ipix));
    let j = ipix - r.first;
    let phi = (j as f64 + r.shift) * TAU / r.npix as f64;
    let sin_theta = (1.0 - r.z * r.z).max(0.0).sqrt();
    DVec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), r.z)
}

/// Pixel containing direction `v` (need not be normalised).
pub fn vec2pix(nside: usize, v: DVec3) -> usize {
    let len = v.length();
    let z = if len > 0.0 { v.z / len } else { 1.0 };
    let phi = v.y.atan2(v.x);
    let ns = nside as i64;
    let za = z.abs();
    let tt = (phi / FRAC_PI_2).rem_euclid(4.0);

    if za <= 2.0 / 3.0 {
        let nl4 = 4 * ns;
        let temp1 = ns as f64 * (0.5 + tt);
        let temp2 = ns as f64 * z * 0.75;
        let jp = (temp1 - temp2) as i64;
        let jm = (temp1 + temp2) as i64;
        let ir = ns + 1 + jp - jm;
        let kshift = 1 - (ir & 1);
        let t1 = jp + jm - ns + kshift + 1 + 2 * nl4;
        let ip = (t1 >> 1) % nl4;
        let ncap = 2 * ns * (ns - 1);
        (ncap + (ir - 1) * nl4 + ip) as usize
    } else {
        let tp = tt - tt.floor();
        let tmp = ns as f64 * (3.0 * (1.0 - za)).sqrt();
        let jp = (tp * tmp) as i64;
        let jm = ((1.0 - tp) * tmp) as i64;
        let ir = jp + jm + 1;
        let ip = ((tt * ir as f64) as i64).min(4 * ir - 1);
        if z > 0.0 {
            (2 * ir * (ir - 1) + ip) as usize
        } else {
            (nside2npix(nside) as i64 - 2 * ir * (ir + 1) + ip) as usize
        }
    }
}

/// Append to `out` every pixel whose centre lies within angular `radius`
/// of `centre`.
pub fn query_disc(nside: usize, centre: DVec3, radius: f64, out: &mut Vec<usize>) {
    if radius >= PI {
        out.extend(0..nside2npix(nside));
        return;
    }
    let c = centre.normalize_or_zero();
    if c == DVec3::ZERO {
        return;
    }
    let z0 = c.z.clamp(-1.0, 1.0);
    let phi0 = c.y.atan2(c.x);
    let theta0 = z0.acos();
    let sin_t0 = (1.0 - z0 * z0).max(0.0).sqrt();
    let cos_r = radius.cos();

    let z_hi = (theta0 - radius).max(0.0).cos();
    let z_lo = (theta0 + radius).min(PI).cos();

    for i in 1..4 * nside {
        let r = ring(nside, i);
        if r.z > z_hi + 1e-12 || r.z < z_lo - 1e-12 {
            continue;
        }
        let sin_t = (1.0 - r.z * r.z).max(0.0).sqrt();
        let denom = sin_t * sin_t0;
        let dphi = if denom < 1e-12 {
            PI
        } else {
            let x = (cos_r - r.z * z0) / denom;
            if x >= 1.0 {
                continue;
            }
            x.max(-1.0).acos()
        };

        if dphi >= PI {
            out.extend(r.first..r.first + r.npix);
            continue;
        }
        let step = TAU / r.npix as f64;
        let lo = ((phi0 - dphi) / step - r.shift).ceil() as i64;
        let hi = ((phi0 + dphi) / step - r.shift).floor() as i64;
        for j in lo..=hi {
            out.push(r.first + j.rem_euclid(r.npix as i64) as usize);
        }
    }
}
