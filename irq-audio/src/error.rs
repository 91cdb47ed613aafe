//! Audio bridge errors

use thiserror::Error;

/// Which catalog sequence an index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    /// Sample rate list
    SampleRate,
    /// Sample size list
    SampleSize,
    /// Channel count list
    Channels,
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::SampleRate => f.write_str("sample rate"),
            FormatKind::SampleSize => f.write_str("sample size"),
            FormatKind::Channels => f.write_str("channel count"),
        }
    }
}

/// Errors raised while configuring or opening the audio output
#[derive(Debug, Error)]
pub enum AudioError {
    /// The host has no output device
    #[error("no audio output device available")]
    NoDevice,

    /// The host refused to open the device
    #[error("cannot open audio: {0}")]
    DeviceOpen(String),

    /// The output stream could not be built
    #[error("failed to build audio stream: {0}")]
    StreamBuild(String),

    /// The output stream could not be started
    #[error("failed to play audio stream: {0}")]
    Play(String),

    /// The device only offers sample formats the bridge cannot feed
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// A catalog index is out of range
    #[error("invalid {kind} index {index} (catalog has {len} entries)")]
    InvalidFormatIndex {
        /// Sequence the index was meant for
        kind: FormatKind,
        /// Offending index
        index: usize,
        /// Length of the sequence
        len: usize,
    },

    /// Configuration values out of range
    #[error("invalid audio configuration: {0}")]
    InvalidConfig(String),

    /// Configuration text could not be parsed
    #[error("failed to parse audio configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A WAV file could not be read or decoded
    #[error("failed to load WAV: {0}")]
    Wav(#[from] hound::Error),

    /// Audio is disabled (`nosound`)
    #[error("audio is disabled")]
    Disabled,
}

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuild(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::Play(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::DeviceOpen(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for AudioError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        AudioError::DeviceOpen(err.to_string())
    }
}
