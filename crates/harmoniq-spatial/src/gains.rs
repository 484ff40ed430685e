//! Per-direction loudspeaker gains.
//!
//! [`GainCalculator`] is the seam the panner calls once per virtual source.
//! [`VbapGainCalculator`] is the bundled implementation: pairwise panning
//! around a horizontal ring, or triplet panning when the caller supplies the
//! loudspeaker triangulation.

use crate::error::{Result, SpatialError};
use crate::geometry::{angular_distance, polar_to_cartesian, wrap_azimuth, PolarPosition};
use crate::layout::Layout;

/// Channels within this many degrees of the horizon count as horizontal.
pub const HORIZONTAL_TOLERANCE: f64 = 1.0;

const GAIN_TOLERANCE: f64 = 1e-6;
const DET_EPSILON: f64 = 1e-9;

pub trait GainCalculator {
    /// Length of every gain vector this calculator writes.
    fn active_channel_count(&self) -> usize;

    /// Writes one gain per non-LFE channel for a source in `direction`.
    fn calculate_gains(&self, direction: &PolarPosition, gains: &mut [f64]);
}

#[derive(Debug, Clone)]
enum Region {
    Pair {
        channels: [usize; 2],
        inverse: [[f64; 2]; 2],
    },
    Triplet {
        channels: [usize; 3],
        inverse: [[f64; 3]; 3],
    },
}

impl Region {
    /// Unnormalised gains, or `None` when the direction lies outside.
    fn gains(&self, unit: &[f64; 3]) -> Option<([usize; 3], [f64; 3], usize)> {
        match self {
            Region::Pair { channels, inverse } => {
                let mut g = [0.0; 3];
                for (j, value) in g.iter_mut().take(2).enumerate() {
                    *value = unit[0] * inverse[0][j] + unit[1] * inverse[1][j];
                }
                if g[0] < -GAIN_TOLERANCE || g[1] < -GAIN_TOLERANCE {
                    return None;
                }
                Some(([channels[0], channels[1], 0], g, 2))
            }
            Region::Triplet { channels, inverse } => {
                let mut g = [0.0; 3];
                for (j, value) in g.iter_mut().enumerate() {
                    *value = (0..3).map(|i| unit[i] * inverse[i][j]).sum();
                }
                if g.iter().any(|value| *value < -GAIN_TOLERANCE) {
                    return None;
                }
                Some((*channels, g, 3))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct VbapGainCalculator {
    positions: Vec<PolarPosition>,
    regions: Vec<Region>,
    horizontal: bool,
}

impl VbapGainCalculator {
    /// Pairwise panning for layouts whose active channels all sit on the
    /// horizon.
    pub fn new(layout: &Layout) -> Result<Self> {
        let positions = layout.active_positions();
        if positions
            .iter()
            .any(|p| p.elevation.abs() > HORIZONTAL_TOLERANCE)
        {
            return Err(SpatialError::UnsupportedLayout(format!(
                "'{}' has elevated channels; build the calculator with triplets",
                layout.name
            )));
        }

        let mut order: Vec<usize> = (0..positions.len()).collect();
        order.sort_by(|&a, &b| {
            wrap_azimuth(positions[a].azimuth).total_cmp(&wrap_azimuth(positions[b].azimuth))
        });

        let mut regions = Vec::new();
        if order.len() >= 2 {
            for (k, &first) in order.iter().enumerate() {
                let second = order[(k + 1) % order.len()];
                let span = (wrap_azimuth(positions[second].azimuth)
                    - wrap_azimuth(positions[first].azimuth))
                .rem_euclid(360.0);
                // wider arcs cannot be spanned by two vectors
                if span >= 180.0 - GAIN_TOLERANCE {
                    continue;
                }
                let a = horizontal_unit(&positions[first]);
                let b = horizontal_unit(&positions[second]);
                let inverse = invert2([[a[0], a[1]], [b[0], b[1]]])
                    .ok_or(SpatialError::DegenerateRegion(regions.len()))?;
                regions.push(Region::Pair {
                    channels: [first, second],
                    inverse,
                });
            }
        }

        Ok(Self {
            positions,
            regions,
            horizontal: true,
        })
    }

    /// Triplet panning over an explicit triangulation. Indices refer to the
    /// active (non-LFE) channels of `layout`.
    pub fn with_triplets(layout: &Layout, triplets: &[[usize; 3]]) -> Result<Self> {
        let positions = layout.active_positions();
        let count = positions.len();
        let mut regions = Vec::with_capacity(triplets.len());
        for (index, triplet) in triplets.iter().enumerate() {
            if let Some(&bad) = triplet.iter().find(|&&channel| channel >= count) {
                return Err(SpatialError::ChannelIndexOutOfRange { index: bad, count });
            }
            let rows = triplet.map(|channel| {
                polar_to_cartesian(&positions[channel].with_distance(1.0)).to_array()
            });
            let inverse = invert3(rows).ok_or(SpatialError::DegenerateRegion(index))?;
            regions.push(Region::Triplet {
                channels: *triplet,
                inverse,
            });
        }
        Ok(Self {
            positions,
            regions,
            horizontal: false,
        })
    }

    fn nearest_channel(&self, direction: &PolarPosition) -> usize {
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (index, position) in self.positions.iter().enumerate() {
            let distance = angular_distance(direction, position);
            if distance < best_distance - GAIN_TOLERANCE {
                best = index;
                best_distance = distance;
            }
        }
        best
    }
}

impl GainCalculator for VbapGainCalculator {
    fn active_channel_count(&self) -> usize {
        self.positions.len()
    }

    fn calculate_gains(&self, direction: &PolarPosition, gains: &mut [f64]) {
        debug_assert_eq!(gains.len(), self.positions.len());
        gains.fill(0.0);
        if gains.len() == 1 {
            gains[0] = 1.0;
            return;
        }

        let unit = if self.horizontal {
            let h = horizontal_unit(direction);
            if h[0].hypot(h[1]) < GAIN_TOLERANCE {
                // overhead or underneath a ring: spread evenly
                let even = 1.0 / (gains.len() as f64).sqrt();
                gains.fill(even);
                return;
            }
            h
        } else {
            polar_to_cartesian(&direction.with_distance(1.0)).to_array()
        };

        for region in &self.regions {
            let Some((channels, raw, used)) = region.gains(&unit) else {
                continue;
            };
            let clamped = raw.map(|g| g.max(0.0));
            let norm = clamped[..used].iter().map(|g| g * g).sum::<f64>().sqrt();
            if norm < DET_EPSILON {
                continue;
            }
            for k in 0..used {
                gains[channels[k]] = clamped[k] / norm;
            }
            return;
        }

        gains[self.nearest_channel(direction)] = 1.0;
    }
}

/// Unit vector of the direction projected onto the horizontal plane, as
/// `[x, y, 0]`. Zero-length when the direction points straight up or down.
fn horizontal_unit(direction: &PolarPosition) -> [f64; 3] {
    let c = polar_to_cartesian(&direction.with_distance(1.0));
    let len = c.x.hypot(c.y);
    if len < GAIN_TOLERANCE {
        return [0.0; 3];
    }
    [c.x / len, c.y / len, 0.0]
}

fn invert2(m: [[f64; 2]; 2]) -> Option<[[f64; 2]; 2]> {
    let det = m[0][0] * m[1][1] - m[0][1] * m[1][0];
    if det.abs() < DET_EPSILON {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [m[1][1] * inv, -m[0][1] * inv],
        [-m[1][0] * inv, m[0][0] * inv],
    ])
}

fn invert3(m: [[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = (0..3)
        .map(|i| {
            let (j, k) = ((i + 1) % 3, (i + 2) % 3);
            m[0][i] * (m[1][j] * m[2][k] - m[1][k] * m[2][j])
        })
        .sum::<f64>();
    if det.abs() < DET_EPSILON {
        return None;
    }
    let inv = 1.0 / det;
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, value) in row.iter_mut().enumerate() {
            *value = (m[(j + 1) % 3][(i + 1) % 3] * m[(j + 2) % 3][(i + 2) % 3]
                - m[(j + 1) % 3][(i + 2) % 3] * m[(j + 2) % 3][(i + 1) % 3])
                * inv;
        }
    }
    Some(out)
}
