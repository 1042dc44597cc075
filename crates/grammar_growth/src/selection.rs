//! Random draws and index selection shared by growth and resampling.
//!
//! - [rand01]: uniform draw in `[0, 1)` from any [rand::RngCore].
//! - [pick_uniform]: uniform index into a queue of the given length.
//! - [pick_weighted]: index drawn proportionally to a slice of weights (multinomial).
//! - [pick_lowest]: index of the minimum value under a total order.
use rand::RngCore;

/// Generate a random float in the range `[0, 1)` with 53 bits of precision.
#[inline]
pub fn rand01(rng: &mut dyn RngCore) -> f64 {
    (rng.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// Uniform index in `0..len`, or `None` for an empty range.
#[inline]
pub fn pick_uniform(len: usize, rng: &mut dyn RngCore) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let idx = (rand01(rng) * len as f64) as usize;
    Some(idx.min(len - 1))
}

/// Draws an index proportionally to `weights`, whose sum is `total`.
///
/// A roll in `[0, total)` is reduced by each weight in order until it becomes
/// non-positive. If the roll survives the whole scan, which only happens when
/// `total` overstates the actual sum through rounding, the last index is chosen.
pub fn pick_weighted(weights: &[f64], total: f64, rng: &mut dyn RngCore) -> Option<usize> {
    if weights.is_empty() {
        return None;
    }

    let mut roll = rand01(rng) * total;
    for (i, w) in weights.iter().enumerate() {
        roll -= w;
        if roll <= 0.0 {
            return Some(i);
        }
    }

    Some(weights.len() - 1)
}

/// Index of the smallest value, comparing with [`f64::total_cmp`].
pub fn pick_lowest<I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    values
        .into_iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}
