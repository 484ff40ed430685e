/// Constant-power split between the direct and diffuse buses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectDiffuse {
    pub direct: f32,
    pub diffuse: f32,
}

impl DirectDiffuse {
    #[inline]
    pub fn from_diffuse(diffuse: f64) -> Self {
        Self {
            direct: (1.0 - diffuse).sqrt() as f32,
            diffuse: diffuse.sqrt() as f32,
        }
    }
}

/// Combines several gain vectors in the power domain:
/// `out[i] = sqrt(sum_j weights[j] * gains[j][i]^2)`.
#[inline]
pub fn power_sum<G: AsRef<[f64]>>(weights: &[f64], gains: &[G], out: &mut [f64]) {
    debug_assert_eq!(weights.len(), gains.len());
    for (channel, value) in out.iter_mut().enumerate() {
        let power: f64 = weights
            .iter()
            .zip(gains)
            .map(|(weight, source)| {
                let g = source.as_ref()[channel];
                weight * g * g
            })
            .sum();
        *value = power.sqrt();
    }
}
