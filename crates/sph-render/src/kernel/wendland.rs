use std::f32::consts::PI;

use super::{Kernel, KernelTable};

/// Wendland C2 (quintic) kernel, as used by EAGLE.
///
/// `W(d, h) = 21 / (16 * PI * h^3) * (1 - d/2)^4 * (2d + 1)` for `d < 2`.
#[derive(Clone, Debug, Default)]
pub struct WendlandC2 {
    table: KernelTable,
}

impl WendlandC2 {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Kernel for WendlandC2 {
    fn name(&self) -> &'static str {
        "Wendland C2"
    }

    fn value(&self, d: f32, h: f32) -> f32 {
        if d >= 2.0 {
            return 0.0;
        }
        let t = 1.0 - 0.5 * d;
        let f = t * t * t * t * (2.0 * d + 1.0);
        21.0 * f / (16.0 * PI * h * h * h)
    }

    fn samples(&self) -> &[f32] {
        self.table.get_or_build(|d| self.value(d, 1.0))
    }
}
