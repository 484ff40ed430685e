//! Loudspeaker layouts.
//!
//! A layout is an ordered list of channels. Output buses are indexed by layout
//! position; gain vectors only cover the non-LFE ("active") channels, in the
//! same order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};
use crate::geometry::PolarPosition;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub polar_position: PolarPosition,
    #[serde(default)]
    pub is_lfe: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>, azimuth: f64, elevation: f64) -> Self {
        Self {
            name: name.into(),
            polar_position: PolarPosition::new(azimuth, elevation, 1.0),
            is_lfe: false,
        }
    }

    pub fn lfe(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            polar_position: PolarPosition::new(45.0, -30.0, 1.0),
            is_lfe: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Layout {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Result<Self> {
        let layout = Self {
            name: name.into(),
            channels,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Builds one of the nominal BS.2051 layouts by its `M+U+B` name.
    pub fn from_name(name: &str) -> Result<Self> {
        let channels = match name {
            "0+2+0" => vec![Channel::new("M+030", 30.0, 0.0), Channel::new("M-030", -30.0, 0.0)],
            "0+4+0" => vec![
                Channel::new("M+045", 45.0, 0.0),
                Channel::new("M-045", -45.0, 0.0),
                Channel::new("M+135", 135.0, 0.0),
                Channel::new("M-135", -135.0, 0.0),
            ],
            "0+5+0" => vec![
                Channel::new("M+030", 30.0, 0.0),
                Channel::new("M-030", -30.0, 0.0),
                Channel::new("M+000", 0.0, 0.0),
                Channel::lfe("LFE1"),
                Channel::new("M+110", 110.0, 0.0),
                Channel::new("M-110", -110.0, 0.0),
            ],
            "0+7+0" => vec![
                Channel::new("M+030", 30.0, 0.0),
                Channel::new("M-030", -30.0, 0.0),
                Channel::new("M+000", 0.0, 0.0),
                Channel::lfe("LFE1"),
                Channel::new("M+090", 90.0, 0.0),
                Channel::new("M-090", -90.0, 0.0),
                Channel::new("M+135", 135.0, 0.0),
                Channel::new("M-135", -135.0, 0.0),
            ],
            other => return Err(SpatialError::UnknownLayout(other.to_string())),
        };
        Self::new(name, channels)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let layout: Layout = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(SpatialError::EmptyLayout);
        }
        if self.active_channel_count() == 0 {
            return Err(SpatialError::NoActiveChannels);
        }
        let mut seen = HashSet::with_capacity(self.channels.len());
        for channel in &self.channels {
            if !seen.insert(channel.name.as_str()) {
                return Err(SpatialError::DuplicateChannel(channel.name.clone()));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn active_channel_count(&self) -> usize {
        self.channels.iter().filter(|channel| !channel.is_lfe).count()
    }

    pub fn active_channels(&self) -> impl Iterator<Item = &Channel> + '_ {
        self.channels.iter().filter(|channel| !channel.is_lfe)
    }

    /// Layout positions of the non-LFE channels, in order.
    pub fn active_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, channel)| !channel.is_lfe)
            .map(|(index, _)| index)
    }

    pub fn active_positions(&self) -> Vec<PolarPosition> {
        self.active_channels()
            .map(|channel| channel.polar_position)
            .collect()
    }

    pub fn without_lfe(&self) -> Layout {
        Layout {
            name: self.name.clone(),
            channels: self.active_channels().cloned().collect(),
        }
    }
}
