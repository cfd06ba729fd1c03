// Swing - delays odd subdivisions within each pair

use crate::sequencer::timeline::Tick;

/// Straight timing (no swing)
pub const STRAIGHT: f64 = 0.5;

/// Classic triplet-feel shuffle ratio
pub const SHUFFLE: f64 = 0.67;

/// Upper bound for the swing ratio (exclusive 1.0)
pub const MAX_RATIO: f64 = 0.95;

/// Clamp a swing ratio into [0.5, 0.95]; non-finite values mean straight
pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(STRAIGHT, MAX_RATIO)
    } else {
        STRAIGHT
    }
}

/// Delay applied to subdivision `index` of length `subdivision`
///
/// Even subdivisions are never moved; odd ones move later by `(r - 0.5) * 2 * subdivision`.
pub fn swing_offset(index: u64, subdivision: Tick, ratio: f64) -> Tick {
    if index % 2 == 0 {
        return 0;
    }
    let ratio = clamp_ratio(ratio);
    ((ratio - STRAIGHT) * 2.0 * subdivision as f64).round() as Tick
}

/// Swing a tick offset inside a bar on a `subdivision` grid
///
/// Only offsets landing exactly on an odd grid line move.
pub fn swing_position(offset: Tick, subdivision: Tick, ratio: f64) -> Tick {
    if subdivision == 0 || offset % subdivision != 0 {
        return offset;
    }
    offset + swing_offset(offset / subdivision, subdivision, ratio)
}
