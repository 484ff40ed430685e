use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpatialError};
use crate::layout::Layout;

pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Either a nominal layout name such as `"0+5+0"` or a full custom layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayoutSpec {
    Named(String),
    Custom(Layout),
}

impl LayoutSpec {
    pub fn resolve(&self) -> Result<Layout> {
        match self {
            LayoutSpec::Named(name) => Layout::from_name(name),
            LayoutSpec::Custom(layout) => {
                layout.validate()?;
                Ok(layout.clone())
            }
        }
    }
}

impl From<Layout> for LayoutSpec {
    fn from(layout: Layout) -> Self {
        LayoutSpec::Custom(layout)
    }
}

/// Shared configuration for an [`ObjectRenderer`](crate::renderer::ObjectRenderer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    pub layout: LayoutSpec,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Track indices that carry objects; each gets its own panner.
    #[serde(default)]
    pub object_tracks: Vec<usize>,
    /// Run the diffuse bus through the decorrelation filters and delay the
    /// direct bus to match.
    #[serde(default = "default_decorrelate")]
    pub decorrelate: bool,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_decorrelate() -> bool {
    true
}

impl RendererConfig {
    pub fn new(layout: impl Into<LayoutSpec>, block_size: usize) -> Self {
        Self {
            layout: layout.into(),
            block_size,
            object_tracks: Vec::new(),
            decorrelate: true,
        }
    }

    pub fn named(layout: &str, block_size: usize) -> Self {
        Self::new(LayoutSpec::Named(layout.to_string()), block_size)
    }

    pub fn with_object_track(mut self, track_index: usize) -> Self {
        self.object_tracks.push(track_index);
        self
    }

    /// Sums the buses as they are, without decorrelation or delay.
    pub fn without_decorrelation(mut self) -> Self {
        self.decorrelate = false;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: RendererConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SpatialError::invalid_config("block size must be greater than zero"));
        }
        let mut seen = HashSet::with_capacity(self.object_tracks.len());
        for track in &self.object_tracks {
            if !seen.insert(*track) {
                return Err(SpatialError::invalid_config(format!(
                    "object track {track} listed twice"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_layout_with_defaults() {
        let config = RendererConfig::from_json(r#"{ "layout": "0+5+0", "object_tracks": [0, 3] }"#)
            .expect("config");
        assert_eq!(config.layout, LayoutSpec::Named("0+5+0".into()));
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.object_tracks, vec![0, 3]);
        assert!(config.decorrelate);
        assert_eq!(config.layout.resolve().unwrap().active_channel_count(), 5);
    }

    #[test]
    fn parses_custom_layout() {
        let config = RendererConfig::from_json(
            r#"{
                "layout": {
                    "name": "wide",
                    "channels": [
                        { "name": "L", "polar_position": { "azimuth": 60.0 } },
                        { "name": "R", "polar_position": { "azimuth": -60.0 } }
                    ]
                },
                "block_size": 64,
                "decorrelate": false
            }"#,
        )
        .expect("config");
        let layout = config.layout.resolve().expect("layout");
        assert_eq!(layout.name, "wide");
        assert_eq!(config.block_size, 64);
        assert!(!config.decorrelate);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            RendererConfig::from_json(r#"{ "layout": "0+2+0", "block_size": 0 }"#),
            Err(SpatialError::InvalidConfig(_))
        ));
        assert!(matches!(
            RendererConfig::from_json(r#"{ "layout": "0+2+0", "object_tracks": [1, 1] }"#),
            Err(SpatialError::InvalidConfig(_))
        ));
        assert!(matches!(
            RendererConfig::from_json(r#"{ "block_size": 32 }"#),
            Err(SpatialError::Json(_))
        ));
        assert!(matches!(
            RendererConfig::named("7.1.4", 32).layout.resolve(),
            Err(SpatialError::UnknownLayout(_))
        ));
    }
}
