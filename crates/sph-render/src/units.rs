//! Minimal dimensional algebra for rendered fields.
//!
//! A [`Unit`] is a scale factor relative to cgs base units together with
//! integer exponents of length, mass, time and temperature. Renderers only
//! ever need products, quotients, integer powers and the conversion ratio
//! between two units of the same dimension.

use std::fmt;
use std::ops::{Div, Mul};

use thiserror::Error;

const BASE_NAMES: [&str; 4] = ["cm", "g", "s", "K"];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit {
    scale: f64,
    dims: [i8; 4],
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("cannot convert {from} to {to}: dimensions differ")]
pub struct UnitError {
    pub from: Unit,
    pub to: Unit,
}

impl Unit {
    pub const NONE: Self = Self::new(1.0, [0, 0, 0, 0]);
    pub const CM: Self = Self::new(1.0, [1, 0, 0, 0]);
    pub const KPC: Self = Self::new(3.085_677_581_491_367e21, [1, 0, 0, 0]);
    pub const G: Self = Self::new(1.0, [0, 1, 0, 0]);
    pub const MSOL: Self = Self::new(1.988_92e33, [0, 1, 0, 0]);
    pub const S: Self = Self::new(1.0, [0, 0, 1, 0]);
    pub const KM_PER_S: Self = Self::new(1.0e5, [1, 0, -1, 0]);
    pub const KELVIN: Self = Self::new(1.0, [0, 0, 0, 1]);
    /// Proton mass.
    pub const M_P: Self = Self::new(1.672_621_58e-24, [0, 1, 0, 0]);

    pub const fn new(scale: f64, dims: [i8; 4]) -> Self {
        Self { scale, dims }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn dims(&self) -> [i8; 4] {
        self.dims
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dims == [0; 4]
    }

    /// The same unit multiplied by a pure number (e.g. `16 m_p`).
    pub fn scaled(self, factor: f64) -> Self {
        Self::new(self.scale * factor, self.dims)
    }

    pub fn powi(self, n: i32) -> Self {
        let mut dims = self.dims;
        for d in dims.iter_mut() {
            *d = (*d as i32 * n) as i8;
        }
        Self::new(self.scale.powi(n), dims)
    }

    /// Factor converting a value in `self` into a value in `target`.
    pub fn ratio(&self, target: &Unit) -> Result<f64, UnitError> {
        if self.dims != target.dims {
            return Err(UnitError {
                from: *self,
                to: *target,
            });
        }
        Ok(self.scale / target.scale)
    }
}

impl Default for Unit {
    fn default() -> Self {
        Self::NONE
    }
}

impl Mul for Unit {
    type Output = Unit;

    fn mul(self, rhs: Unit) -> Unit {
        let mut dims = self.dims;
        for (d, r) in dims.iter_mut().zip(rhs.dims) {
            *d += r;
        }
        Unit::new(self.scale * rhs.scale, dims)
    }
}

impl Div for Unit {
    type Output = Unit;

    fn div(self, rhs: Unit) -> Unit {
        self * rhs.powi(-1)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6e}", self.scale)?;
        for (name, power) in BASE_NAMES.iter().zip(self.dims) {
            match power {
                0 => {}
                1 => write!(f, " {name}")?,
                p => write!(f, " {name}^{p}")?,
            }
        }
        Ok(())
    }
}
