use super::{CubicSpline, Kernel, KernelTable};

/// Simpson intervals used for the line-of-sight integral. Must be even.
const INTEGRATION_STEPS: usize = 200;

/// A volumetric kernel integrated along one axis.
///
/// `value(d, h) = 2 * integral_0^max_d K(sqrt(z^2 + d^2), 1) dz / h^2`, the
/// column weight of a particle seen at projected distance `d * h`.
#[derive(Clone, Debug, Default)]
pub struct Projected<K = CubicSpline> {
    inner: K,
    table: KernelTable,
}

impl<K: Kernel> Projected<K> {
    pub fn new(inner: K) -> Self {
        Self {
            inner,
            table: KernelTable::new(),
        }
    }

    fn column(&self, d: f32) -> f32 {
        let max_d = self.inner.max_d();
        if d >= max_d {
            return 0.0;
        }
        let zmax = ((max_d * max_d - d * d) as f64).sqrt();
        let step = zmax / INTEGRATION_STEPS as f64;
        let d2 = (d as f64) * (d as f64);
        let f = |z: f64| self.inner.value((z * z + d2).sqrt() as f32, 1.0) as f64;

        let mut sum = f(0.0) + f(zmax);
        for i in 1..INTEGRATION_STEPS {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight * f(i as f64 * step);
        }
        (2.0 * sum * step / 3.0) as f32
    }
}

impl<K: Kernel> Kernel for Projected<K> {
    fn name(&self) -> &'static str {
        "projected"
    }

    fn h_power(&self) -> u32 {
        2
    }

    fn max_d(&self) -> f32 {
        self.inner.max_d()
    }

    fn value(&self, d: f32, h: f32) -> f32 {
        self.column(d) / (h * h)
    }

    fn samples(&self) -> &[f32] {
        self.table.get_or_build(|d| self.column(d))
    }
}
