//! Object divergence: one source becomes a centre source and two side sources
//! offset in azimuth, weighted so that the weights always sum to one.

use arrayvec::ArrayVec;

use crate::geometry::{
    cartesian_to_polar, polar_to_cartesian, rotate, rotation_matrix, CartesianPosition,
    PolarPosition,
};
use crate::metadata::ObjectDivergence;

pub const MAX_DIVERGED_SOURCES: usize = 3;

/// Virtual source directions paired with their power weights.
pub type DivergedSources = ArrayVec<(PolarPosition, f64), MAX_DIVERGED_SOURCES>;

/// Returns `(centre, side)` weights for a divergence value in `0.0..=1.0`.
#[inline]
pub fn divergence_weights(value: f64) -> (f64, f64) {
    ((1.0 - value) / (1.0 + value), value / (1.0 + value))
}

/// Splits `direction` into the virtual sources described by `divergence`.
///
/// With no divergence the direction is returned unchanged with weight 1.
/// Otherwise the result is `[centre, left, right]`, all at the source
/// distance. At full divergence the centre weight is zero but the centre
/// source is still returned.
pub fn diverged_positions_and_gains(
    divergence: &ObjectDivergence,
    direction: &PolarPosition,
) -> DivergedSources {
    let x = divergence.value;
    let mut sources = DivergedSources::new();
    if x == 0.0 {
        sources.push((*direction, 1.0));
        return sources;
    }

    let (centre_weight, side_weight) = divergence_weights(x);
    let d = direction.distance;

    // Local frame: x forward, y left, z up.
    let to_local = |offset: f64| {
        let c = polar_to_cartesian(&PolarPosition::new(offset, 0.0, d));
        [c.y, -c.x, c.z]
    };
    let local = [
        [d, 0.0, 0.0],
        to_local(x * divergence.azimuth_range),
        to_local(-x * divergence.azimuth_range),
    ];
    let weights = [centre_weight, side_weight, side_weight];

    let rotation = rotation_matrix(direction.azimuth, -direction.elevation, 0.0);
    for (point, weight) in local.into_iter().zip(weights) {
        let r = rotate(&rotation, point);
        let position = cartesian_to_polar(&CartesianPosition::new(-r[1], r[0], r[2]));
        sources.push((position, weight));
    }
    sources
}
