use crate::geometry::{polar_to_cartesian, PolarPosition};
use crate::layout::Layout;
use crate::metadata::ChannelLock;

const TIE_TOLERANCE: f64 = 1e-6;

pub trait ChannelLockHandler {
    /// Returns the direction to pan to, snapped onto a loudspeaker when the
    /// lock request applies.
    fn handle(&self, lock: &ChannelLock, direction: PolarPosition) -> PolarPosition;
}

/// Ignores lock requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannelLock;

impl ChannelLockHandler for NoChannelLock {
    #[inline]
    fn handle(&self, _lock: &ChannelLock, direction: PolarPosition) -> PolarPosition {
        direction
    }
}

/// Snaps to the closest active loudspeaker within the requested distance.
///
/// Distances are measured between unit vectors, so `max_distance` ranges from
/// `0.0` (exact match only) to `2.0` (always lock).
#[derive(Debug, Clone)]
pub struct NearestChannelLock {
    positions: Vec<PolarPosition>,
}

impl NearestChannelLock {
    pub fn new(layout: &Layout) -> Self {
        Self {
            positions: layout.active_positions(),
        }
    }
}

impl ChannelLockHandler for NearestChannelLock {
    fn handle(&self, lock: &ChannelLock, direction: PolarPosition) -> PolarPosition {
        let Some(max_distance) = lock.max_distance else {
            return direction;
        };
        let source = polar_to_cartesian(&direction.with_distance(1.0));

        let mut best: Option<(f64, &PolarPosition)> = None;
        for position in &self.positions {
            let speaker = polar_to_cartesian(&position.with_distance(1.0));
            let distance = ((source.x - speaker.x).powi(2)
                + (source.y - speaker.y).powi(2)
                + (source.z - speaker.z).powi(2))
            .sqrt();
            if distance > max_distance + TIE_TOLERANCE {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_distance, current)) => {
                    if distance < best_distance - TIE_TOLERANCE {
                        true
                    } else if distance > best_distance + TIE_TOLERANCE {
                        false
                    } else {
                        prefer(position, current)
                    }
                }
            };
            if better {
                best = Some((distance, position));
            }
        }

        match best {
            Some((_, position)) => PolarPosition {
                azimuth: position.azimuth,
                elevation: position.elevation,
                distance: direction.distance,
            },
            None => direction,
        }
    }
}

/// Tie-break between equally distant loudspeakers: lower absolute elevation,
/// then lower absolute azimuth. Earlier channels win remaining ties.
fn prefer(candidate: &PolarPosition, current: &PolarPosition) -> bool {
    let (ce, ee) = (candidate.elevation.abs(), current.elevation.abs());
    if (ce - ee).abs() > TIE_TOLERANCE {
        return ce < ee;
    }
    let (ca, ea) = (candidate.azimuth.abs(), current.azimuth.abs());
    ca < ea - TIE_TOLERANCE
}
