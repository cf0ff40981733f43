/// Offsets at which every particle is replicated so that a periodic box
/// wraps across an axis spanning `lo..hi`.
///
/// Without a box there is a single zero offset. Otherwise the offsets are
/// `-n b, ..., 0, ..., n b` with `n = round((hi - lo) / 2b) + 1`.
pub fn wrapping_offsets(boxsize: Option<f32>, lo: f32, hi: f32) -> Vec<f32> {
    match boxsize {
        Some(b) if b > 0.0 => {
            let n = ((hi - lo) / (2.0 * b)).round() as i32 + 1;
            (-n..=n).map(|k| k as f32 * b).collect()
        }
        _ => vec![0.0],
    }
}
