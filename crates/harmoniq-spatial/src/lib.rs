//! Harmoniq Spatial
//! ================
//! Object-based panning for Harmoniq Studio. Each audio object carries a
//! frame of metadata (position, divergence, gain, diffuseness, channel lock,
//! exclusion zones, jump position); the [`PointSourcePanner`] turns it into
//! per-loudspeaker gains and accumulates the panned signal onto a direct and a
//! diffuse bus, crossfading gains sample-accurately when the metadata asks
//! for it. The [`ObjectRenderer`] mixes many objects and decorrelates the
//! diffuse bus before the two buses are summed.
//!
//! ```
//! use harmoniq_spatial::{Layout, ObjectMetadata, PointSourcePanner, PolarPosition};
//!
//! let layout = Layout::from_name("0+5+0").unwrap();
//! let mut panner = PointSourcePanner::for_layout(&layout).unwrap();
//! let mut direct = vec![vec![0.0f32; 64]; layout.channel_count()];
//! let mut diffuse = vec![vec![0.0f32; 64]; layout.channel_count()];
//!
//! let metadata = ObjectMetadata::at(PolarPosition::new(30.0, 0.0, 1.0));
//! panner.process_accumul(&metadata, &[0.5; 64], &mut direct, &mut diffuse, 0);
//! assert!((direct[0][0] - 0.5).abs() < 1e-6);
//! ```

pub mod channel_lock;
pub mod config;
pub mod decorrelate;
pub mod divergence;
pub mod error;
pub mod gains;
pub mod geometry;
pub mod layout;
pub mod metadata;
pub mod pan;
pub mod panner;
pub mod renderer;
pub mod zone_exclusion;

pub use channel_lock::{ChannelLockHandler, NearestChannelLock, NoChannelLock};
pub use config::{LayoutSpec, RendererConfig};
pub use decorrelate::Decorrelator;
pub use divergence::{diverged_positions_and_gains, DivergedSources};
pub use error::{Result, SpatialError};
pub use gains::{GainCalculator, VbapGainCalculator};
pub use geometry::{CartesianPosition, PolarPosition};
pub use layout::{Channel, Layout};
pub use metadata::{
    ChannelLock, JumpPosition, ObjectDivergence, ObjectMetadata, PolarExclusionZone,
};
pub use panner::PointSourcePanner;
pub use renderer::ObjectRenderer;
pub use zone_exclusion::{ExclusionDownmix, NoZoneExclusion, ZoneExclusionHandler};

/// Runs arbitrary JSON metadata through a 5.0 panner and checks the output
/// stays finite.
#[cfg(feature = "fuzzing")]
pub fn fuzz_process_metadata(data: &[u8]) {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(mut metadata) = serde_json::from_str::<ObjectMetadata>(text) else {
        return;
    };
    // keep inside the ranges the panner accepts
    metadata.diffuse = metadata.diffuse.clamp(0.0, 1.0);
    metadata.object_divergence.value = metadata.object_divergence.value.clamp(0.0, 1.0);
    metadata.gain = metadata.gain.clamp(0.0, 4.0);
    let finite_position = [
        metadata.polar_position.azimuth,
        metadata.polar_position.elevation,
        metadata.polar_position.distance,
        metadata.cartesian_position.x,
        metadata.cartesian_position.y,
        metadata.cartesian_position.z,
        metadata.object_divergence.azimuth_range,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !finite_position || metadata.diffuse.is_nan() || metadata.gain.is_nan() {
        return;
    }

    let Ok(layout) = Layout::from_name("0+5+0") else {
        return;
    };
    let Ok(mut panner) = PointSourcePanner::for_layout(&layout) else {
        return;
    };
    let mut direct = vec![vec![0.0f32; 32]; layout.channel_count()];
    let mut diffuse = vec![vec![0.0f32; 32]; layout.channel_count()];
    let input = [0.5f32; 32];
    panner.process_accumul(&metadata, &input, &mut direct, &mut diffuse, 0);
    panner.process_accumul(&metadata, &input, &mut direct, &mut diffuse, 0);
    assert!(direct.iter().chain(&diffuse).flatten().all(|s| s.is_finite()));
}
