use std::f32::consts::PI;

use super::{Kernel, KernelTable};

/// Uniform-density sphere of radius `max_d * h`.
#[derive(Clone, Debug, Default)]
pub struct TopHat {
    table: KernelTable,
}

impl TopHat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closed-form height of the kernel at `h = 1`: `3 / (4 PI max_d^3)`.
    pub fn normalization(&self) -> f32 {
        let r = self.max_d();
        3.0 / (4.0 * PI * r * r * r)
    }
}

impl Kernel for TopHat {
    fn name(&self) -> &'static str {
        "top-hat"
    }

    fn value(&self, d: f32, h: f32) -> f32 {
        if d < self.max_d() {
            self.normalization() / (h * h * h)
        } else {
            0.0
        }
    }

    fn samples(&self) -> &[f32] {
        self.table.get_or_build(|d| self.value(d, 1.0))
    }
}
