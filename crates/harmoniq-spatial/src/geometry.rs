//! Coordinate conversions and rotations.
//!
//! Positions follow the ADM convention: `x` points right, `y` to the front and
//! `z` up. Azimuth is measured in degrees anticlockwise from the front when
//! seen from above, so `+90°` is hard left and `-90°` hard right.

use serde::{Deserialize, Serialize};

/// A direction and distance in degrees/degrees/linear units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarPosition {
    pub azimuth: f64,
    pub elevation: f64,
    pub distance: f64,
}

impl PolarPosition {
    #[inline]
    pub const fn new(azimuth: f64, elevation: f64, distance: f64) -> Self {
        Self {
            azimuth,
            elevation,
            distance,
        }
    }

    #[inline]
    pub fn with_distance(self, distance: f64) -> Self {
        Self { distance, ..self }
    }

    #[inline]
    pub fn to_cartesian(&self) -> CartesianPosition {
        polar_to_cartesian(self)
    }
}

impl Default for PolarPosition {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartesianPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CartesianPosition {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn from_array([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    #[inline]
    pub fn dot(&self, other: &CartesianPosition) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn to_polar(&self) -> PolarPosition {
        cartesian_to_polar(self)
    }
}

impl Default for CartesianPosition {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }
}

/// Row-major 3x3 rotation matrix.
pub type RotationMatrix = [[f64; 3]; 3];

#[inline]
pub fn polar_to_cartesian(polar: &PolarPosition) -> CartesianPosition {
    let azimuth = polar.azimuth.to_radians();
    let elevation = polar.elevation.to_radians();
    CartesianPosition {
        x: -azimuth.sin() * elevation.cos() * polar.distance,
        y: azimuth.cos() * elevation.cos() * polar.distance,
        z: elevation.sin() * polar.distance,
    }
}

#[inline]
pub fn cartesian_to_polar(cartesian: &CartesianPosition) -> PolarPosition {
    let CartesianPosition { x, y, z } = *cartesian;
    PolarPosition {
        azimuth: -x.atan2(y).to_degrees(),
        elevation: z.atan2((x * x + y * y).sqrt()).to_degrees(),
        distance: cartesian.norm(),
    }
}

/// Yaw-pitch-roll rotation (applied roll first, then pitch, then yaw), all in
/// degrees.
pub fn rotation_matrix(yaw: f64, pitch: f64, roll: f64) -> RotationMatrix {
    let (sy, cy) = yaw.to_radians().sin_cos();
    let (sp, cp) = pitch.to_radians().sin_cos();
    let (sr, cr) = roll.to_radians().sin_cos();
    [
        [cy * cp, cy * sp * sr - sy * cr, cy * sp * cr + sy * sr],
        [sy * cp, sy * sp * sr + cy * cr, sy * sp * cr - cy * sr],
        [-sp, cp * sr, cp * cr],
    ]
}

#[inline]
pub fn rotate(matrix: &RotationMatrix, vector: [f64; 3]) -> [f64; 3] {
    let mut out = [0.0; 3];
    for (row, value) in matrix.iter().zip(out.iter_mut()) {
        *value = row[0] * vector[0] + row[1] * vector[1] + row[2] * vector[2];
    }
    out
}

/// Great-circle angle between two directions in degrees. Distances are ignored.
pub fn angular_distance(a: &PolarPosition, b: &PolarPosition) -> f64 {
    let ua = polar_to_cartesian(&a.with_distance(1.0));
    let ub = polar_to_cartesian(&b.with_distance(1.0));
    ua.dot(&ub).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Whether `angle` lies on the arc running anticlockwise from `start` to `end`.
///
/// Arcs of 360° or more contain every angle.
pub fn inside_angle_range(angle: f64, start: f64, end: f64, tol: f64) -> bool {
    if end - start >= 360.0 - tol {
        return true;
    }
    let width = (end - start).rem_euclid(360.0);
    let offset = (angle - start + tol).rem_euclid(360.0);
    offset <= width + 2.0 * tol
}

/// Wraps an azimuth into `(-180, 180]`.
#[inline]
pub fn wrap_azimuth(azimuth: f64) -> f64 {
    let wrapped = (azimuth + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}
