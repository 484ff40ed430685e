//! Point source panner.
//!
//! Turns one frame of object metadata and mono input into contributions on a
//! direct and a diffuse bus for every non-LFE loudspeaker. Gains are only
//! recomputed when the metadata changes; a change with a jump position ramps
//! linearly from the current gains over the requested number of samples. A
//! ramp longer than a frame carries on into the following frames.
//!
//! One panner serves one object. It keeps the gains it applied last, so frames
//! of an object must be fed in order and never shared between panners.

use arrayvec::ArrayVec;

use crate::channel_lock::{ChannelLockHandler, NearestChannelLock};
use crate::divergence::{diverged_positions_and_gains, MAX_DIVERGED_SOURCES};
use crate::error::{Result, SpatialError};
use crate::gains::{GainCalculator, VbapGainCalculator};
use crate::geometry::cartesian_to_polar;
use crate::layout::Layout;
use crate::metadata::ObjectMetadata;
use crate::pan::{power_sum, DirectDiffuse};
use crate::zone_exclusion::{ExclusionDownmix, ZoneExclusionHandler};

/// Progress through a jump interpolation, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ramp {
    length: usize,
    done: usize,
}

impl Ramp {
    fn fraction(&self) -> f64 {
        self.done as f64 / self.length as f64
    }
}

pub struct PointSourcePanner<
    G = VbapGainCalculator,
    L = NearestChannelLock,
    Z = ExclusionDownmix,
> {
    layout: Layout,
    gain_calculator: G,
    channel_lock: L,
    zone_exclusion: Z,
    /// Gains held once any running ramp has finished.
    target: Vec<f64>,
    /// Gains the running ramp started from.
    ramp_from: Vec<f64>,
    ramp: Option<Ramp>,
    position_gains: [Vec<f64>; MAX_DIVERGED_SOURCES],
    last_metadata: Option<ObjectMetadata>,
}

impl PointSourcePanner {
    /// Panner with the bundled gain calculator, channel lock and zone
    /// exclusion for a horizontal layout.
    pub fn for_layout(layout: &Layout) -> Result<Self> {
        Self::new(
            layout.clone(),
            VbapGainCalculator::new(layout)?,
            NearestChannelLock::new(layout),
            ExclusionDownmix::new(layout),
        )
    }
}

impl<G, L, Z> PointSourcePanner<G, L, Z>
where
    G: GainCalculator,
    L: ChannelLockHandler,
    Z: ZoneExclusionHandler,
{
    pub fn new(
        layout: Layout,
        gain_calculator: G,
        channel_lock: L,
        zone_exclusion: Z,
    ) -> Result<Self> {
        layout.validate()?;
        let active = layout.active_channel_count();
        let got = gain_calculator.active_channel_count();
        if got != active {
            return Err(SpatialError::ChannelMismatch {
                expected: active,
                got,
            });
        }
        Ok(Self {
            layout,
            gain_calculator,
            channel_lock,
            zone_exclusion,
            target: vec![0.0; active],
            ramp_from: vec![0.0; active],
            ramp: None,
            position_gains: std::array::from_fn(|_| vec![0.0; active]),
            last_metadata: None,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn active_channel_count(&self) -> usize {
        self.target.len()
    }

    /// Gains for the latest metadata, one per non-LFE channel. While a jump
    /// ramp is running these are the gains it is moving towards.
    pub fn gains(&self) -> &[f64] {
        &self.target
    }

    /// Whether a jump ramp is still running into the next frame.
    pub fn is_interpolating(&self) -> bool {
        self.ramp.is_some()
    }

    pub fn is_first_frame(&self) -> bool {
        self.last_metadata.is_none()
    }

    /// Forgets all state, as if the panner had just been built.
    pub fn reset(&mut self) {
        self.target.fill(0.0);
        self.ramp_from.fill(0.0);
        self.ramp = None;
        self.last_metadata = None;
    }

    /// Pans `input` and *adds* the result to `direct` and `diffuse`, starting
    /// at `output_offset` in every bus.
    ///
    /// Both bus slices need one entry per layout channel (LFE channels are
    /// left untouched) and each bus needs at least
    /// `output_offset + input.len()` samples.
    ///
    /// # Panics
    ///
    /// Panics if a bus slice has the wrong channel count or a bus is too
    /// short.
    pub fn process_accumul<B: AsMut<[f32]>>(
        &mut self,
        metadata: &ObjectMetadata,
        input: &[f32],
        direct: &mut [B],
        diffuse: &mut [B],
        output_offset: usize,
    ) {
        let channels = self.layout.channel_count();
        assert_eq!(direct.len(), channels, "direct bus count must match the layout");
        assert_eq!(diffuse.len(), channels, "diffuse bus count must match the layout");

        if self.last_metadata.as_ref() != Some(metadata) {
            self.capture_ramp_start();
            self.compute_target(metadata);
            let length = metadata.jump_position.interpolation_length;
            self.ramp = (metadata.jump_position.flag && !self.is_first_frame() && length > 0)
                .then_some(Ramp { length, done: 0 });
        }

        let coefficients = DirectDiffuse::from_diffuse(metadata.diffuse);
        let range = output_offset..output_offset + input.len();
        for (active, channel) in self.layout.active_indices().enumerate() {
            let to = self.target[active] as f32;
            let gain = match self.ramp {
                Some(ramp) => GainRamp {
                    from: self.ramp_from[active] as f32,
                    to,
                    offset: ramp.done,
                    length: ramp.length,
                },
                None => GainRamp::hold(to),
            };
            accumulate(
                input,
                gain,
                coefficients,
                &mut direct[channel].as_mut()[range.clone()],
                &mut diffuse[channel].as_mut()[range.clone()],
            );
        }

        if let Some(ramp) = self.ramp.as_mut() {
            ramp.done += input.len();
        }
        if self.ramp.is_some_and(|ramp| ramp.done >= ramp.length) {
            self.ramp = None;
        }
        match &mut self.last_metadata {
            Some(last) => last.clone_from(metadata),
            None => self.last_metadata = Some(metadata.clone()),
        }
    }

    /// Stores the gains at the current position so a new ramp starts without
    /// a step, even when the previous ramp has not finished.
    fn capture_ramp_start(&mut self) {
        match self.ramp {
            Some(ramp) => {
                let t = ramp.fraction();
                for (from, to) in self.ramp_from.iter_mut().zip(&self.target) {
                    *from = t * *to + (1.0 - t) * *from;
                }
            }
            None => self.ramp_from.copy_from_slice(&self.target),
        }
    }

    fn compute_target(&mut self, metadata: &ObjectMetadata) {
        // cartesian metadata is panned on the polar path
        let direction = if metadata.cartesian {
            cartesian_to_polar(&metadata.cartesian_position)
        } else {
            metadata.polar_position
        };
        let direction = self.channel_lock.handle(&metadata.channel_lock, direction);

        let sources = diverged_positions_and_gains(&metadata.object_divergence, &direction);
        let mut weights = ArrayVec::<f64, MAX_DIVERGED_SOURCES>::new();
        for ((position, weight), gains) in sources.iter().zip(self.position_gains.iter_mut()) {
            self.gain_calculator.calculate_gains(position, gains);
            weights.push(*weight);
        }
        power_sum(&weights, &self.position_gains[..sources.len()], &mut self.target);

        self.zone_exclusion
            .handle(&metadata.zone_exclusion_polar, &mut self.target);
        for gain in &mut self.target {
            *gain *= metadata.gain;
        }

        tracing::debug!(
            track = metadata.track_index,
            sources = sources.len(),
            gains = ?self.target,
            "point source gains updated"
        );
    }
}

/// Linear gain ramp seen from the start of one frame.
#[derive(Debug, Clone, Copy)]
struct GainRamp {
    from: f32,
    to: f32,
    /// Ramp samples already played in earlier frames.
    offset: usize,
    length: usize,
}

impl GainRamp {
    fn hold(gain: f32) -> Self {
        Self {
            from: gain,
            to: gain,
            offset: 0,
            length: 0,
        }
    }

    #[inline]
    fn at(&self, index: usize) -> f32 {
        let position = self.offset + index;
        if position < self.length {
            let t = position as f32 / self.length as f32;
            t * self.to + (1.0 - t) * self.from
        } else {
            self.to
        }
    }
}

#[inline]
fn accumulate(
    input: &[f32],
    gain: GainRamp,
    coefficients: DirectDiffuse,
    direct: &mut [f32],
    diffuse: &mut [f32],
) {
    for (index, ((&x, d), f)) in input
        .iter()
        .zip(direct.iter_mut())
        .zip(diffuse.iter_mut())
        .enumerate()
    {
        let sample = x * gain.at(index);
        *d += sample * coefficients.direct;
        *f += sample * coefficients.diffuse;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel_lock::NoChannelLock;
    use crate::geometry::PolarPosition;
    use crate::layout::Channel;
    use crate::metadata::JumpPosition;
    use crate::zone_exclusion::NoZoneExclusion;

    /// Hands out a fixed gain vector per azimuth sign.
    struct Fixed {
        left: Vec<f64>,
        right: Vec<f64>,
    }

    impl GainCalculator for Fixed {
        fn active_channel_count(&self) -> usize {
            self.left.len()
        }

        fn calculate_gains(&self, direction: &PolarPosition, gains: &mut [f64]) {
            let source = if direction.azimuth >= 0.0 {
                &self.left
            } else {
                &self.right
            };
            gains.copy_from_slice(source);
        }
    }

    fn two_channel() -> PointSourcePanner<Fixed, NoChannelLock, NoZoneExclusion> {
        let layout = Layout::new(
            "pair",
            vec![Channel::new("L", 30.0, 0.0), Channel::new("R", -30.0, 0.0)],
        )
        .unwrap();
        let calc = Fixed {
            left: vec![1.0, 0.0],
            right: vec![0.0, 1.0],
        };
        PointSourcePanner::new(layout, calc, NoChannelLock, NoZoneExclusion).unwrap()
    }

    fn buses(channels: usize, frames: usize) -> Vec<Vec<f32>> {
        vec![vec![0.0; frames]; channels]
    }

    #[test]
    fn rejects_mismatched_gain_calculator() {
        let layout = Layout::from_name("0+5+0").unwrap();
        let calc = Fixed {
            left: vec![1.0, 0.0],
            right: vec![0.0, 1.0],
        };
        assert!(matches!(
            PointSourcePanner::new(layout, calc, NoChannelLock, NoZoneExclusion),
            Err(SpatialError::ChannelMismatch { expected: 5, got: 2 })
        ));
    }

    #[test]
    fn first_frame_snaps_even_with_jump() {
        let mut panner = two_channel();
        let metadata = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0))
            .with_jump(JumpPosition::interpolate(4));
        let mut direct = buses(2, 4);
        let mut diffuse = buses(2, 4);
        assert!(panner.is_first_frame());
        panner.process_accumul(&metadata, &[1.0; 4], &mut direct, &mut diffuse, 0);
        assert_eq!(direct[0], vec![1.0; 4]);
        assert_eq!(direct[1], vec![0.0; 4]);
        assert!(!panner.is_first_frame());
    }

    #[test]
    fn default_metadata_still_computes_on_first_frame() {
        let mut panner = two_channel();
        let mut direct = buses(2, 2);
        let mut diffuse = buses(2, 2);
        panner.process_accumul(&ObjectMetadata::default(), &[1.0; 2], &mut direct, &mut diffuse, 0);
        assert_eq!(panner.gains(), &[1.0, 0.0]);
    }

    #[test]
    fn interpolates_towards_new_gains() {
        let mut panner = two_channel();
        let right = ObjectMetadata::at(PolarPosition::new(-30.0, 0.0, 1.0));
        let mut direct = buses(2, 4);
        let mut diffuse = buses(2, 4);
        panner.process_accumul(&right, &[1.0; 4], &mut direct, &mut diffuse, 0);
        assert_eq!(panner.gains(), &[0.0, 1.0]);

        let left = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0))
            .with_jump(JumpPosition::interpolate(2));
        let mut direct = buses(2, 4);
        let mut diffuse = buses(2, 4);
        panner.process_accumul(&left, &[1.0; 4], &mut direct, &mut diffuse, 0);
        assert_eq!(direct[0], vec![0.0, 0.5, 1.0, 1.0]);
        assert_eq!(direct[1], vec![1.0, 0.5, 0.0, 0.0]);
        assert_eq!(panner.gains(), &[1.0, 0.0]);
    }

    #[test]
    fn ramp_longer_than_a_frame_carries_over() {
        let mut panner = two_channel();
        let mut direct = buses(2, 2);
        let mut diffuse = buses(2, 2);
        let right = ObjectMetadata::at(PolarPosition::new(-30.0, 0.0, 1.0));
        panner.process_accumul(&right, &[1.0; 2], &mut direct, &mut diffuse, 0);

        let left = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0))
            .with_jump(JumpPosition::interpolate(4));
        let mut direct = buses(2, 6);
        let mut diffuse = buses(2, 6);
        for offset in [0, 2, 4] {
            panner.process_accumul(&left, &[1.0; 2], &mut direct, &mut diffuse, offset);
            if offset == 0 {
                assert!(panner.is_interpolating());
            }
        }
        assert_eq!(direct[0], vec![0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
        assert_eq!(direct[1], vec![1.0, 0.75, 0.5, 0.25, 0.0, 0.0]);
        assert!(!panner.is_interpolating());
        assert_eq!(panner.gains(), &[1.0, 0.0]);
    }

    #[test]
    fn new_jump_mid_ramp_starts_from_current_gains() {
        let mut panner = two_channel();
        let mut direct = buses(2, 4);
        let mut diffuse = buses(2, 4);
        let right = ObjectMetadata::at(PolarPosition::new(-30.0, 0.0, 1.0));
        panner.process_accumul(&right, &[1.0; 2], &mut direct, &mut diffuse, 0);

        let left = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0))
            .with_jump(JumpPosition::interpolate(4));
        let mut direct = buses(2, 4);
        let mut diffuse = buses(2, 4);
        panner.process_accumul(&left, &[1.0; 2], &mut direct, &mut diffuse, 0);

        // halfway through: both channels sit at 0.5
        let back = right.clone().with_jump(JumpPosition::interpolate(2));
        panner.process_accumul(&back, &[1.0; 2], &mut direct, &mut diffuse, 2);
        assert_eq!(direct[0], vec![0.0, 0.25, 0.5, 0.25]);
        assert_eq!(direct[1], vec![1.0, 0.75, 0.5, 0.75]);
        assert!(!panner.is_interpolating());
    }

    #[test]
    fn snapping_cancels_a_running_ramp() {
        let mut panner = two_channel();
        let mut direct = buses(2, 4);
        let mut diffuse = buses(2, 4);
        let right = ObjectMetadata::at(PolarPosition::new(-30.0, 0.0, 1.0));
        panner.process_accumul(&right, &[1.0; 2], &mut direct, &mut diffuse, 0);
        let left = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0))
            .with_jump(JumpPosition::interpolate(8));
        panner.process_accumul(&left, &[1.0; 2], &mut direct, &mut diffuse, 0);
        assert!(panner.is_interpolating());

        let mut direct = buses(2, 2);
        let mut diffuse = buses(2, 2);
        panner.process_accumul(&right, &[1.0; 2], &mut direct, &mut diffuse, 0);
        assert!(!panner.is_interpolating());
        assert_eq!(direct[1], vec![1.0, 1.0]);
    }

    #[test]
    fn accumulates_at_offset_and_skips_lfe() {
        let layout = Layout::new(
            "pair+lfe",
            vec![
                Channel::new("L", 30.0, 0.0),
                Channel::lfe("LFE"),
                Channel::new("R", -30.0, 0.0),
            ],
        )
        .unwrap();
        let calc = Fixed {
            left: vec![0.5, 0.25],
            right: vec![0.0, 1.0],
        };
        let mut panner =
            PointSourcePanner::new(layout, calc, NoChannelLock, NoZoneExclusion).unwrap();
        let mut direct = vec![vec![1.0f32; 6]; 3];
        let mut diffuse = buses(3, 6);
        let metadata = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0)).with_gain(2.0);
        panner.process_accumul(&metadata, &[1.0; 3], &mut direct, &mut diffuse, 2);

        assert_eq!(direct[0], vec![1.0, 1.0, 2.0, 2.0, 2.0, 1.0]);
        assert_eq!(direct[1], vec![1.0; 6]);
        assert_eq!(direct[2], vec![1.0, 1.0, 1.5, 1.5, 1.5, 1.0]);
        assert!(diffuse.iter().flatten().all(|s| *s == 0.0));
    }

    #[test]
    fn diffuse_splits_constant_power() {
        let mut panner = two_channel();
        let mut direct = buses(2, 1);
        let mut diffuse = buses(2, 1);
        let metadata = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0)).with_diffuse(0.25);
        panner.process_accumul(&metadata, &[1.0], &mut direct, &mut diffuse, 0);
        let power = direct[0][0].powi(2) + diffuse[0][0].powi(2);
        assert!((power - 1.0).abs() < 1e-6);
        assert!((diffuse[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn divergence_power_sums_sources() {
        let mut panner = two_channel();
        let mut direct = buses(2, 1);
        let mut diffuse = buses(2, 1);
        // centre straight ahead lands on the left table, sides go left and right
        let metadata = ObjectMetadata::at(PolarPosition::new(0.0, 0.0, 1.0))
            .with_divergence(crate::metadata::ObjectDivergence::new(1.0, 30.0));
        panner.process_accumul(&metadata, &[1.0], &mut direct, &mut diffuse, 0);
        let expected = 0.5f64.sqrt();
        assert!((panner.gains()[0] - expected).abs() < 1e-12);
        assert!((panner.gains()[1] - expected).abs() < 1e-12);
    }

    #[test]
    fn reset_returns_to_first_frame() {
        let mut panner = two_channel();
        let mut direct = buses(2, 1);
        let mut diffuse = buses(2, 1);
        panner.process_accumul(&ObjectMetadata::default(), &[1.0], &mut direct, &mut diffuse, 0);
        panner.reset();
        assert!(panner.is_first_frame());
        assert!(!panner.is_interpolating());
        assert_eq!(panner.gains(), &[0.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "direct bus count")]
    fn wrong_bus_count_panics() {
        let mut panner = two_channel();
        let mut direct = buses(1, 1);
        let mut diffuse = buses(2, 1);
        panner.process_accumul(&ObjectMetadata::default(), &[1.0], &mut direct, &mut diffuse, 0);
    }
}
