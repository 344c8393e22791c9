//! Transport controller - the UI-side handle on a playing buffer
//!
//! Play, pause and seek go through the command queue; pitch, tempo and
//! volume are written straight into [`PlayerAtomics`] and picked up by
//! the engine at the next block. Nothing here blocks.

use std::sync::Arc;

use crate::audio_file::DecodedBuffer;
use crate::timestretch::{AnyStage, StageKind};
use crate::types::PlayState;

use super::{
    command_channel, event_channel, fraction_to_frame, AudioEngine, BufferSource, CommandSender,
    EngineCommand, PlayerAtomics, PlayerEvent,
};

/// Engine type built for a decoded file
pub type PlayerEngine = AudioEngine<AnyStage<BufferSource>>;

/// Initial parameter values for a new player
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerParams {
    pub pitch: f64,
    pub tempo: f64,
    pub volume: f64,
}

impl Default for PlayerParams {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            tempo: 1.0,
            volume: super::atomics::DEFAULT_VOLUME,
        }
    }
}

/// Everything the audio thread needs to run a player
pub struct EngineHalf {
    pub engine: PlayerEngine,
    pub commands: rtrb::Consumer<EngineCommand>,
}

pub struct Transport {
    commands: CommandSender,
    events: rtrb::Consumer<PlayerEvent>,
    atomics: Arc<PlayerAtomics>,
    total_frames: usize,
    sample_rate: u32,
}

impl Transport {
    /// Build the audio-thread engine and its transport for `buffer`
    ///
    /// The source starts at frame 0 with the driver stopped.
    pub fn build(buffer: Arc<DecodedBuffer>, kind: StageKind, params: PlayerParams) -> (EngineHalf, Transport) {
        let atomics = Arc::new(PlayerAtomics::new());
        atomics.set_pitch(params.pitch);
        atomics.set_tempo(params.tempo);
        atomics.set_volume(params.volume);

        let total_frames = buffer.total_frames();
        let sample_rate = buffer.sample_rate();
        let source = BufferSource::new(buffer).with_atomics(atomics.clone());
        let stage = AnyStage::new(kind, source, sample_rate);

        let (cmd_tx, cmd_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let engine = AudioEngine::new(stage, atomics.clone(), event_tx);

        log::debug!(
            "Transport built: {} frames @ {} Hz, stage {:?}",
            total_frames,
            sample_rate,
            kind
        );

        (
            EngineHalf {
                engine,
                commands: cmd_rx,
            },
            Transport {
                commands: CommandSender::new(cmd_tx),
                events: event_rx,
                atomics,
                total_frames,
                sample_rate,
            },
        )
    }

    fn send(&mut self, cmd: EngineCommand) {
        if let Err(cmd) = self.commands.send(cmd) {
            log::warn!("Command queue full, dropping {:?}", cmd);
        }
    }

    pub fn play(&mut self) {
        self.send(EngineCommand::Play);
    }

    pub fn pause(&mut self) {
        self.send(EngineCommand::Pause);
    }

    /// Seek to `percent` (0..=100) of the buffer
    ///
    /// Returns the target frame. Any state the stage buffered is discarded
    /// when the engine applies the seek.
    pub fn seek_percent(&mut self, percent: f64) -> usize {
        let frame = fraction_to_frame(percent / 100.0, self.total_frames);
        self.send(EngineCommand::Seek { frame });
        frame
    }

    pub fn pitch(&self) -> f64 {
        self.atomics.pitch()
    }

    pub fn set_pitch(&self, pitch: f64) {
        self.atomics.set_pitch(pitch);
    }

    pub fn tempo(&self) -> f64 {
        self.atomics.tempo()
    }

    pub fn set_tempo(&self, tempo: f64) {
        self.atomics.set_tempo(tempo);
    }

    pub fn volume(&self) -> f64 {
        self.atomics.volume()
    }

    pub fn set_volume(&self, volume: f64) {
        self.atomics.set_volume(volume);
    }

    /// Source cursor in frames, as of the last rendered block
    pub fn duration_val(&self) -> u64 {
        self.atomics.source_position()
    }

    /// Length of the buffer in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.total_frames as f64 / self.sample_rate as f64
    }

    /// Seconds elapsed as last published by the frame source
    pub fn elapsed_seconds(&self) -> f64 {
        self.atomics.elapsed_seconds()
    }

    /// Source cursor as a fraction of the buffer (0.0..=1.0)
    pub fn progress(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.duration_val() as f64 / self.total_frames as f64).min(1.0)
    }

    pub fn play_state(&self) -> PlayState {
        self.atomics.play_state()
    }

    /// Next pending notification from the audio thread
    pub fn poll_event(&mut self) -> Option<PlayerEvent> {
        self.events.pop().ok()
    }
}
