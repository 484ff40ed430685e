//! Per-frame object metadata consumed by the point source panner.
//!
//! Every block derives `PartialEq` so the panner can compare a frame against
//! the previous one field by field and skip the gain calculation when nothing
//! changed.

use serde::{Deserialize, Serialize};

use crate::geometry::{inside_angle_range, CartesianPosition, PolarPosition};

const ZONE_TOLERANCE: f64 = 1e-6;

/// Spreads a source into a centre and two side virtual sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectDivergence {
    /// Amount of divergence in `0.0..=1.0`.
    pub value: f64,
    /// Azimuth offset of the side sources at full divergence, in degrees.
    pub azimuth_range: f64,
    /// Offset used by cartesian metadata. The polar path ignores it.
    pub position_range: f64,
}

impl ObjectDivergence {
    pub fn new(value: f64, azimuth_range: f64) -> Self {
        Self {
            value,
            azimuth_range,
            ..Self::default()
        }
    }
}

impl Default for ObjectDivergence {
    fn default() -> Self {
        Self {
            value: 0.0,
            azimuth_range: 180.0,
            position_range: 1.0,
        }
    }
}

/// Requests that the object snaps to the nearest loudspeaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLock {
    /// Largest distance between unit vectors that still locks. `None` disables
    /// locking.
    pub max_distance: Option<f64>,
}

impl ChannelLock {
    pub fn within(max_distance: f64) -> Self {
        Self {
            max_distance: Some(max_distance),
        }
    }
}

/// A region of the sphere whose loudspeakers must not be used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarExclusionZone {
    pub min_azimuth: f64,
    pub max_azimuth: f64,
    pub min_elevation: f64,
    pub max_elevation: f64,
}

impl PolarExclusionZone {
    pub fn new(min_azimuth: f64, max_azimuth: f64, min_elevation: f64, max_elevation: f64) -> Self {
        Self {
            min_azimuth,
            max_azimuth,
            min_elevation,
            max_elevation,
        }
    }

    /// Bounds are inclusive. The azimuth range runs anticlockwise from
    /// `min_azimuth` to `max_azimuth` and may wrap through the rear.
    pub fn contains(&self, position: &PolarPosition) -> bool {
        let elevation = position.elevation;
        if elevation < self.min_elevation - ZONE_TOLERANCE
            || elevation > self.max_elevation + ZONE_TOLERANCE
        {
            return false;
        }
        // azimuth is meaningless at the poles
        if elevation.abs() >= 90.0 - ZONE_TOLERANCE {
            return true;
        }
        inside_angle_range(
            position.azimuth,
            self.min_azimuth,
            self.max_azimuth,
            ZONE_TOLERANCE,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpPosition {
    pub flag: bool,
    /// Length of the gain crossfade in samples.
    pub interpolation_length: usize,
}

impl JumpPosition {
    pub fn interpolate(interpolation_length: usize) -> Self {
        Self {
            flag: true,
            interpolation_length,
        }
    }
}

/// One frame of panning input for an object track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectMetadata {
    pub track_index: usize,
    /// When set, `cartesian_position` is converted to polar and panned on the
    /// polar path.
    pub cartesian: bool,
    pub cartesian_position: CartesianPosition,
    pub polar_position: PolarPosition,
    pub object_divergence: ObjectDivergence,
    pub channel_lock: ChannelLock,
    pub zone_exclusion_polar: Vec<PolarExclusionZone>,
    /// Linear gain applied after panning.
    pub gain: f64,
    /// Diffuseness in `0.0..=1.0`.
    pub diffuse: f64,
    pub jump_position: JumpPosition,
}

impl ObjectMetadata {
    pub fn at(polar_position: PolarPosition) -> Self {
        Self {
            polar_position,
            ..Self::default()
        }
    }

    pub fn at_cartesian(cartesian_position: CartesianPosition) -> Self {
        Self {
            cartesian: true,
            cartesian_position,
            ..Self::default()
        }
    }

    pub fn with_track(mut self, track_index: usize) -> Self {
        self.track_index = track_index;
        self
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_diffuse(mut self, diffuse: f64) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_divergence(mut self, divergence: ObjectDivergence) -> Self {
        self.object_divergence = divergence;
        self
    }

    pub fn with_channel_lock(mut self, channel_lock: ChannelLock) -> Self {
        self.channel_lock = channel_lock;
        self
    }

    pub fn with_exclusion_zone(mut self, zone: PolarExclusionZone) -> Self {
        self.zone_exclusion_polar.push(zone);
        self
    }

    pub fn with_jump(mut self, jump_position: JumpPosition) -> Self {
        self.jump_position = jump_position;
        self
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ObjectMetadata {
    fn default() -> Self {
        Self {
            track_index: 0,
            cartesian: false,
            cartesian_position: CartesianPosition::default(),
            polar_position: PolarPosition::default(),
            object_divergence: ObjectDivergence::default(),
            channel_lock: ChannelLock::default(),
            zone_exclusion_polar: Vec::new(),
            gain: 1.0,
            diffuse: 0.0,
            jump_position: JumpPosition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_compare_equal() {
        let a = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0)).with_gain(0.5);
        let b = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0)).with_gain(0.5);
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_diffuse(0.1));
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let metadata = ObjectMetadata::from_json(
            r#"{ "polar_position": { "azimuth": -30.0 }, "diffuse": 0.25 }"#,
        )
        .expect("metadata");
        assert_eq!(metadata.polar_position, PolarPosition::new(-30.0, 0.0, 1.0));
        assert_eq!(metadata.gain, 1.0);
        assert_eq!(metadata.diffuse, 0.25);
        assert_eq!(metadata.object_divergence.azimuth_range, 180.0);
        assert!(metadata.channel_lock.max_distance.is_none());
    }

    #[test]
    fn exclusion_zone_bounds() {
        let rear = PolarExclusionZone::new(100.0, -100.0, -10.0, 10.0);
        assert!(rear.contains(&PolarPosition::new(110.0, 0.0, 1.0)));
        assert!(rear.contains(&PolarPosition::new(-110.0, 0.0, 1.0)));
        assert!(rear.contains(&PolarPosition::new(180.0, 10.0, 1.0)));
        assert!(!rear.contains(&PolarPosition::new(30.0, 0.0, 1.0)));
        assert!(!rear.contains(&PolarPosition::new(180.0, 30.0, 1.0)));

        let top = PolarExclusionZone::new(-180.0, 180.0, 70.0, 90.0);
        assert!(top.contains(&PolarPosition::new(12.0, 90.0, 1.0)));
    }
}
