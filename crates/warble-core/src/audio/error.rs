//! Audio backend error types

use thiserror::Error;

/// Errors from device selection and stream setup
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No default audio output device")]
    NoDefaultDevice,

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to query device configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    /// Device reported configs, but none we can use
    #[error("No usable output configuration: {0}")]
    NoUsableConfig(String),

    #[error("Failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
