//! Audio backend configuration
//!
//! Device selection, buffer size and sample rate preferences, plus which
//! processing stage the player builds.

use serde::{Deserialize, Serialize};

use crate::timestretch::StageKind;

/// Largest device buffer we request (frames); matches the output block
pub const MAX_BUFFER_SIZE: u32 = crate::types::BLOCK_SIZE as u32;

/// Smallest device buffer we request (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Default sample rate for the audio system (48kHz)
///
/// If the device doesn't support it, the stream falls back to the device's
/// maximum supported rate and files are resampled during loading.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the system choose the buffer size
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to 64..=8192)
    Fixed(u32),
}

impl BufferSize {
    /// Buffer size in frames, or None for the system default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some((*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)),
        }
    }

    /// Latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, JACK,
/// CoreAudio...) so devices from different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    /// Display label including the host if known
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,

    /// Preferred buffer size
    pub buffer_size: BufferSize,

    /// Preferred sample rate (None = 48kHz if supported)
    pub sample_rate: Option<u32>,

    /// Processing stage between source and output
    pub stage: StageKind,
}

impl AudioConfig {
    /// Sample rate to request from the device
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_clamped() {
        assert_eq!(BufferSize::Default.as_frames(), None);
        assert_eq!(BufferSize::Fixed(16).as_frames(), Some(64));
        assert_eq!(BufferSize::Fixed(512).as_frames(), Some(512));
        assert_eq!(BufferSize::Fixed(100_000).as_frames(), Some(8192));
    }

    #[test]
    fn test_latency_ms() {
        let latency = BufferSize::Fixed(480).latency_ms(48000).unwrap();
        assert!((latency - 10.0).abs() < 1e-4);
        assert_eq!(BufferSize::Default.latency_ms(48000), None);
    }

    #[test]
    fn test_target_rate() {
        let mut config = AudioConfig::default();
        assert_eq!(config.target_sample_rate(), DEFAULT_SAMPLE_RATE);

        config.sample_rate = Some(44100);
        assert_eq!(config.target_sample_rate(), 44100);
    }

    #[test]
    fn test_device_label() {
        let mut id = DeviceId {
            name: "hw:0,0".to_string(),
            host: None,
        };
        assert_eq!(id.display_label(), "hw:0,0");

        id.host = Some("ALSA".to_string());
        assert_eq!(id.display_label(), "[ALSA] hw:0,0");
    }

    #[test]
    fn test_device_from_yaml() {
        let config: AudioConfig = serde_yaml::from_str("device:\n  name: hw:0,0\n  host: ALSA\n").unwrap();
        let device = config.device.unwrap();
        assert_eq!(device.display_label(), "[ALSA] hw:0,0");
    }

    #[test]
    fn test_yaml_uses_defaults_for_missing_fields() {
        let config: AudioConfig = serde_yaml::from_str("stage: bypass\n").unwrap();
        assert_eq!(config.stage, StageKind::Bypass);
        assert_eq!(config.buffer_size, BufferSize::Default);
        assert_eq!(config.device, None);
    }
}
