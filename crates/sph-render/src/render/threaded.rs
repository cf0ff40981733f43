//! Particle-parallel rendering.
//!
//! The particle list is split into interleaved slices, one per thread, each
//! rendered into its own buffer. Buffers are summed in slice order so a
//! given thread count always produces the same floating-point result.

use std::panic::{catch_unwind, AssertUnwindSafe};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::RenderError;
use crate::field::RenderedField;

use super::Slice;

/// Render `n_particles` particles with `threads` workers.
///
/// `rasterize` is called once per slice. A slice that panics or returns an
/// error leaves its slot empty and is logged; if any slot is empty the whole
/// render fails with [`RenderError::ParallelRender`] rather than returning a
/// partial sum. With a single thread the slice result is returned as is.
pub fn render(
    threads: usize,
    n_particles: usize,
    rasterize: impl Fn(Slice) -> Result<RenderedField, RenderError> + Sync,
) -> Result<RenderedField, RenderError> {
    let threads = threads.max(1).min(n_particles.max(1));
    if threads == 1 {
        return rasterize(Slice::ALL);
    }
    tracing::debug!("Splitting {} particles over {} threads", n_particles, threads);

    let run = |k: usize| {
        catch_unwind(AssertUnwindSafe(|| {
            rasterize(Slice {
                start: k,
                step: threads,
            })
        }))
    };

    #[cfg(feature = "parallel")]
    let slots: Vec<_> = {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| RenderError::ThreadPool(e.to_string()))?;
        pool.install(|| (0..threads).into_par_iter().map(run).collect())
    };

    #[cfg(not(feature = "parallel"))]
    let slots: Vec<_> = (0..threads).map(run).collect();

    let mut failed = 0;
    let mut parts = Vec::with_capacity(threads);
    for (k, slot) in slots.into_iter().enumerate() {
        match slot {
            Ok(Ok(field)) => parts.push(field),
            Ok(Err(e)) => {
                tracing::error!("Render slice {} of {} failed: {}", k, threads, e);
                failed += 1;
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Render slice {} of {} failed: {}", k, threads, msg);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        return Err(RenderError::ParallelRender {
            failed,
            total: threads,
        });
    }

    let mut parts = parts.into_iter();
    let Some(mut total) = parts.next() else {
        return Err(RenderError::ParallelRender {
            failed: threads,
            total: threads,
        });
    };
    for part in parts {
        total.accumulate(&part);
    }
    Ok(total)
}
