//! Mixes object tracks onto a loudspeaker layout.
//!
//! The renderer owns one [`PointSourcePanner`] per object track and a pair of
//! direct/diffuse buses. Objects are accumulated with
//! [`ObjectRenderer::add_object`] and the block is collected with
//! [`ObjectRenderer::render`], which decorrelates the diffuse bus, delays the
//! direct bus to match, sums them and clears the buses for the next block.

use crate::config::RendererConfig;
use crate::decorrelate::{Decorrelator, COMPENSATION_DELAY};
use crate::error::{Result, SpatialError};
use crate::layout::Layout;
use crate::metadata::ObjectMetadata;
use crate::panner::PointSourcePanner;

struct ObjectTrack {
    index: usize,
    panner: PointSourcePanner,
    warned_cartesian: bool,
}

pub struct ObjectRenderer {
    layout: Layout,
    block_size: usize,
    tracks: Vec<ObjectTrack>,
    direct: Vec<Vec<f32>>,
    diffuse: Vec<Vec<f32>>,
    decorrelator: Option<Decorrelator>,
}

impl ObjectRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self> {
        config.validate()?;
        let layout = config.layout.resolve()?;
        let tracks = config
            .object_tracks
            .iter()
            .map(|&index| {
                Ok(ObjectTrack {
                    index,
                    panner: PointSourcePanner::for_layout(&layout)?,
                    warned_cartesian: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let decorrelator = config
            .decorrelate
            .then(|| Decorrelator::new(&layout, config.block_size))
            .transpose()?;

        tracing::info!(
            layout = %layout.name,
            channels = layout.channel_count(),
            objects = tracks.len(),
            block_size = config.block_size,
            decorrelate = config.decorrelate,
            "object renderer ready"
        );

        let channels = layout.channel_count();
        Ok(Self {
            block_size: config.block_size,
            tracks,
            direct: vec![vec![0.0; config.block_size]; channels],
            diffuse: vec![vec![0.0; config.block_size]; channels],
            decorrelator,
            layout,
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Samples by which the direct path lags its input.
    pub fn latency(&self) -> usize {
        if self.decorrelator.is_some() {
            COMPENSATION_DELAY
        } else {
            0
        }
    }

    pub fn direct(&self) -> &[Vec<f32>] {
        &self.direct
    }

    pub fn diffuse(&self) -> &[Vec<f32>] {
        &self.diffuse
    }

    /// Pans one block of an object track onto the buses.
    pub fn add_object(&mut self, input: &[f32], metadata: &ObjectMetadata) -> Result<()> {
        if input.len() > self.block_size {
            return Err(SpatialError::BlockTooLarge {
                block_size: self.block_size,
                got: input.len(),
            });
        }
        let track = self
            .tracks
            .iter_mut()
            .find(|track| track.index == metadata.track_index)
            .ok_or(SpatialError::UnknownTrack(metadata.track_index))?;

        if metadata.cartesian && !track.warned_cartesian {
            tracing::warn!(
                track = track.index,
                "cartesian object metadata is rendered on the polar path"
            );
            track.warned_cartesian = true;
        }

        track
            .panner
            .process_accumul(metadata, input, &mut self.direct, &mut self.diffuse, 0);
        Ok(())
    }

    /// Writes one block of `direct + diffuse` into the first `block_size`
    /// samples of every output channel (overwriting them) and clears the
    /// buses.
    ///
    /// Nothing is written or cleared when the output has the wrong channel
    /// count or a channel is shorter than the block.
    pub fn render<B: AsMut<[f32]>>(&mut self, output: &mut [B]) -> Result<()> {
        if output.len() != self.layout.channel_count() {
            return Err(SpatialError::ChannelMismatch {
                expected: self.layout.channel_count(),
                got: output.len(),
            });
        }
        for (channel, out) in output.iter_mut().enumerate() {
            let got = out.as_mut().len();
            if got < self.block_size {
                return Err(SpatialError::OutputTooShort {
                    channel,
                    expected: self.block_size,
                    got,
                });
            }
        }

        if let Some(decorrelator) = &mut self.decorrelator {
            decorrelator.process(&mut self.direct, &mut self.diffuse)?;
        }
        for ((out, direct), diffuse) in output
            .iter_mut()
            .zip(self.direct.iter_mut())
            .zip(self.diffuse.iter_mut())
        {
            let out = &mut out.as_mut()[..self.block_size];
            for ((sample, d), f) in out.iter_mut().zip(direct.iter()).zip(diffuse.iter()) {
                *sample = d + f;
            }
            direct.fill(0.0);
            diffuse.fill(0.0);
        }
        Ok(())
    }

    /// Clears the buses and the decorrelator and returns every panner to its
    /// first-frame state.
    pub fn reset(&mut self) {
        for bus in self.direct.iter_mut().chain(self.diffuse.iter_mut()) {
            bus.fill(0.0);
        }
        if let Some(decorrelator) = &mut self.decorrelator {
            decorrelator.reset();
        }
        for track in &mut self.tracks {
            track.panner.reset();
            track.warned_cartesian = false;
        }
    }
}
