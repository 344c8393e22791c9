//! Player configuration
//!
//! Stored as YAML in the user's config directory, by default
//! `~/.config/warble/config.yaml` on Linux. Every section and field has a
//! default, so partial files are fine.
//!
//! ```yaml
//! audio:
//!   device:
//!     name: default
//!     host: ALSA
//!   buffer_size: Default
//!   sample_rate: 48000
//!   stage: stretch
//! playback:
//!   pitch: 1.0
//!   tempo: 1.0
//!   volume: 0.5
//!   poll_interval_ms: 1000
//!   autoplay: true
//! ```

mod io;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::{PlayerParams, DEFAULT_VOLUME};

pub use io::{load_config, save_config};

/// Directory name under the platform config dir
pub const APP_DIR: &str = "warble";

/// Config file name inside [`APP_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarbleConfig {
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
}

impl WarbleConfig {
    /// Load from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        let mut config: Self = load_config(path);
        config.playback.sanitize();
        config
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        save_config(self, path)
    }
}

/// Playback section: initial slider values and timer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Pitch multiplier restored at startup
    pub pitch: f64,
    /// Tempo multiplier restored at startup
    pub tempo: f64,
    /// Output gain restored at startup
    pub volume: f64,
    /// Seek slider refresh period while playing
    pub poll_interval_ms: u64,
    /// Start playing as soon as a file has loaded
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            tempo: 1.0,
            volume: DEFAULT_VOLUME,
            poll_interval_ms: 1000,
            autoplay: true,
        }
    }
}

impl PlaybackConfig {
    /// Initial engine parameters
    pub fn params(&self) -> PlayerParams {
        PlayerParams {
            pitch: self.pitch,
            tempo: self.tempo,
            volume: self.volume,
        }
    }

    /// Remember the current engine parameters
    pub fn remember(&mut self, params: PlayerParams) {
        self.pitch = params.pitch;
        self.tempo = params.tempo;
        self.volume = params.volume;
        self.sanitize();
    }

    /// Replace non-finite values and a zero poll interval with defaults
    fn sanitize(&mut self) {
        let defaults = Self::default();
        if !self.pitch.is_finite() {
            self.pitch = defaults.pitch;
        }
        if !self.tempo.is_finite() {
            self.tempo = defaults.tempo;
        }
        if !self.volume.is_finite() {
            self.volume = defaults.volume;
        }
        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = defaults.poll_interval_ms;
        }
    }
}

/// Default config file path
///
/// `<config_dir>/warble/config.yaml`, or `./warble/config.yaml` when the
/// platform has no config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}
