use crate::geometry::{angular_distance, PolarPosition};
use crate::layout::Layout;
use crate::metadata::PolarExclusionZone;

const TIE_TOLERANCE: f64 = 1e-6;

pub trait ZoneExclusionHandler {
    /// Rewrites `gains` in place so that loudspeakers inside any of `zones`
    /// are silent. The vector length never changes.
    fn handle(&mut self, zones: &[PolarExclusionZone], gains: &mut [f64]);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoZoneExclusion;

impl ZoneExclusionHandler for NoZoneExclusion {
    #[inline]
    fn handle(&mut self, _zones: &[PolarExclusionZone], _gains: &mut [f64]) {}
}

/// Moves the power of excluded loudspeakers onto their closest remaining
/// neighbours.
///
/// When a zone set would exclude every loudspeaker it is ignored. The
/// neighbour table and scratch buffers are built once per layout, so
/// handling a zone set does not allocate.
#[derive(Debug, Clone)]
pub struct ExclusionDownmix {
    positions: Vec<PolarPosition>,
    /// Other channels of every channel with their angular distance, nearest
    /// first.
    neighbours: Vec<Vec<(usize, f64)>>,
    excluded: Vec<bool>,
    power: Vec<f64>,
}

impl ExclusionDownmix {
    pub fn new(layout: &Layout) -> Self {
        let positions = layout.active_positions();
        let neighbours = positions
            .iter()
            .enumerate()
            .map(|(channel, source)| {
                let mut row: Vec<(usize, f64)> = positions
                    .iter()
                    .enumerate()
                    .filter(|&(other, _)| other != channel)
                    .map(|(other, position)| (other, angular_distance(source, position)))
                    .collect();
                row.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                row
            })
            .collect();
        let count = positions.len();
        Self {
            positions,
            neighbours,
            excluded: vec![false; count],
            power: vec![0.0; count],
        }
    }

    pub fn excluded(&self, zones: &[PolarExclusionZone]) -> Vec<bool> {
        self.positions
            .iter()
            .map(|position| zones.iter().any(|zone| zone.contains(position)))
            .collect()
    }
}

impl ZoneExclusionHandler for ExclusionDownmix {
    fn handle(&mut self, zones: &[PolarExclusionZone], gains: &mut [f64]) {
        debug_assert_eq!(gains.len(), self.positions.len());
        if zones.is_empty() {
            return;
        }
        for (out, position) in self.excluded.iter_mut().zip(&self.positions) {
            *out = zones.iter().any(|zone| zone.contains(position));
        }
        let remaining = self.excluded.iter().filter(|&&e| !e).count();
        if remaining == 0 || remaining == self.excluded.len() {
            return;
        }

        let excluded = &self.excluded;
        let power = &mut self.power;
        power.fill(0.0);
        for (channel, gain) in gains.iter().enumerate() {
            let p = gain * gain;
            if !excluded[channel] {
                power[channel] += p;
                continue;
            }
            if p == 0.0 {
                continue;
            }

            let kept = self.neighbours[channel]
                .iter()
                .filter(|&&(other, _)| !excluded[other]);
            // at least one channel remains, checked above
            let Some(&(_, nearest)) = kept.clone().next() else {
                continue;
            };
            let ties = kept
                .clone()
                .take_while(|&&(_, d)| d <= nearest + TIE_TOLERANCE)
                .count();
            let share = p / ties as f64;
            for &(other, _) in kept.take(ties) {
                power[other] += share;
            }
        }

        for (gain, p) in gains.iter_mut().zip(power.iter()) {
            *gain = p.sqrt();
        }
    }
}
