use thiserror::Error;

/// Errors raised while building layouts, panners and renderers.
///
/// Per-frame processing never fails; these only surface at construction or
/// when the renderer is handed input it was not configured for.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("layout has no channels")]
    EmptyLayout,
    #[error("layout has no non-LFE channels")]
    NoActiveChannels,
    #[error("duplicate channel name '{0}' in layout")]
    DuplicateChannel(String),
    #[error("unknown layout '{0}'")]
    UnknownLayout(String),
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),
    #[error("channel count mismatch: expected {expected}, got {got}")]
    ChannelMismatch { expected: usize, got: usize },
    #[error("channel index {index} out of range for {count} channels")]
    ChannelIndexOutOfRange { index: usize, count: usize },
    #[error("panning region {0} has collinear or coplanar loudspeakers")]
    DegenerateRegion(usize),
    #[error("no panner registered for object track {0}")]
    UnknownTrack(usize),
    #[error("block of {got} samples exceeds the configured block size of {block_size}")]
    BlockTooLarge { block_size: usize, got: usize },
    #[error("output channel {channel} holds {got} samples, the block needs {expected}")]
    OutputTooShort {
        channel: usize,
        expected: usize,
        got: usize,
    },
    #[error("invalid renderer config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
}

impl SpatialError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SpatialError::InvalidConfig(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SpatialError>;
