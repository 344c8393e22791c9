//! Audio engine - the state owned by the audio thread
//!
//! Wraps the playback driver and its stage, applies queued commands and
//! parameter changes at block boundaries, renders into the device's
//! interleaved buffer and publishes state back to the UI through
//! [`PlayerAtomics`].

use std::sync::Arc;

use crate::timestretch::ShiftingStage;
use crate::types::{PlayState, Sample, BLOCK_SIZE};

use super::{EngineCommand, PlaybackDriver, PlayerAtomics, PlayerEvent};

/// Parameter values last forwarded to the stage
#[derive(Debug, Clone, Copy, PartialEq)]
struct AppliedParams {
    pitch: f64,
    tempo: f64,
    volume: f64,
}

pub struct AudioEngine<P: ShiftingStage> {
    driver: PlaybackDriver<P>,
    atomics: Arc<PlayerAtomics>,
    applied: AppliedParams,
    /// Pre-allocated per-channel scratch for interleaving into the device buffer
    left: Vec<Sample>,
    right: Vec<Sample>,
}

impl<P: ShiftingStage> AudioEngine<P> {
    /// Create an engine around `stage`
    ///
    /// The current atomics values are forwarded to the stage immediately.
    pub fn new(stage: P, atomics: Arc<PlayerAtomics>, events: rtrb::Producer<PlayerEvent>) -> Self {
        let mut engine = Self {
            driver: PlaybackDriver::new(stage, events),
            atomics,
            applied: AppliedParams {
                pitch: f64::NAN,
                tempo: f64::NAN,
                volume: f64::NAN,
            },
            left: vec![0.0; BLOCK_SIZE],
            right: vec![0.0; BLOCK_SIZE],
        };
        engine.apply_parameters();
        engine.publish_state();
        engine
    }

    pub fn driver(&self) -> &PlaybackDriver<P> {
        &self.driver
    }

    /// Apply all pending commands from the UI (lock-free)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.apply_command(cmd);
        }
    }

    pub fn apply_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Play => self.driver.play(),
            EngineCommand::Pause => self.driver.pause(),
            EngineCommand::Seek { frame } => self.driver.stage_mut().set_source_position(frame),
        }
        self.publish_state();
    }

    /// Forward parameters the UI changed since the last block
    ///
    /// Compared by bit pattern so NaN written by the UI is forwarded once,
    /// not on every block.
    pub fn apply_parameters(&mut self) {
        let pitch = self.atomics.pitch();
        if pitch.to_bits() != self.applied.pitch.to_bits() {
            self.driver.stage_mut().set_pitch(pitch);
            self.applied.pitch = pitch;
        }

        let tempo = self.atomics.tempo();
        if tempo.to_bits() != self.applied.tempo.to_bits() {
            self.driver.stage_mut().set_tempo(tempo);
            self.applied.tempo = tempo;
        }

        let volume = self.atomics.volume();
        if volume.to_bits() != self.applied.volume.to_bits() {
            self.driver.set_volume(volume as Sample);
            self.applied.volume = volume;
        }
    }

    /// Render one callback into separate channel buffers
    pub fn render(&mut self, left: &mut [Sample], right: &mut [Sample]) -> usize {
        self.apply_parameters();
        let produced = self.driver.process(left, right);
        self.publish_state();
        produced
    }

    /// Render one callback into an interleaved device buffer with `channels` channels
    ///
    /// Channels beyond the first two are silenced; a mono device gets the left channel.
    pub fn process(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }

        self.apply_parameters();

        let total_frames = data.len() / channels;
        let mut offset = 0;
        while offset < total_frames {
            let frames = (total_frames - offset).min(BLOCK_SIZE);
            let (left, right) = (&mut self.left[..frames], &mut self.right[..frames]);
            self.driver.process(left, right);

            let out = &mut data[offset * channels..(offset + frames) * channels];
            for (i, frame) in out.chunks_mut(channels).enumerate() {
                frame[0] = self.left[i];
                if channels > 1 {
                    frame[1] = self.right[i];
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
            offset += frames;
        }

        self.publish_state();
    }

    fn publish_state(&self) {
        self.atomics
            .set_source_position(self.driver.stage().source_position());
        self.atomics.set_play_state(self.driver.state());
    }

    /// Current driver state
    pub fn play_state(&self) -> PlayState {
        self.driver.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::DecodedBuffer;
    use crate::engine::{command_channel, event_channel, BufferSource};
    use crate::timestretch::Bypass;

    fn engine(frames: usize) -> (AudioEngine<Bypass<BufferSource>>, Arc<PlayerAtomics>, rtrb::Consumer<PlayerEvent>) {
        let atomics = Arc::new(PlayerAtomics::new());
        let buffer = DecodedBuffer::from_channels(vec![0.5; frames], vec![0.25; frames], 48000);
        let source = BufferSource::new(Arc::new(buffer)).with_atomics(atomics.clone());
        let (tx, rx) = event_channel();
        (AudioEngine::new(Bypass::new(source), atomics.clone(), tx), atomics, rx)
    }

    #[test]
    fn test_parameters_forwarded_before_next_block() {
        let (mut engine, atomics, _events) = engine(1000);
        atomics.set_pitch(1.25);
        atomics.set_tempo(0.8);

        let mut left = vec![0.0; 16];
        let mut right = vec![0.0; 16];
        engine.render(&mut left, &mut right);

        assert_eq!(engine.driver().stage().pitch(), 1.25);
        assert_eq!(engine.driver().stage().tempo(), 0.8);
    }

    #[test]
    fn test_commands_applied_in_order() {
        let (mut engine, atomics, _events) = engine(480000);
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Seek { frame: 1234 }).unwrap();
        tx.push(EngineCommand::Seek { frame: 240000 }).unwrap();
        tx.push(EngineCommand::Play).unwrap();

        engine.process_commands(&mut rx);

        assert_eq!(engine.play_state(), PlayState::Running);
        assert_eq!(atomics.source_position(), 240000);
        assert_eq!(atomics.play_state(), PlayState::Running);
    }

    #[test]
    fn test_interleaved_output_with_extra_channels() {
        let (mut engine, atomics, _events) = engine(1000);
        atomics.set_volume(1.0);
        engine.apply_command(EngineCommand::Play);

        let mut data = vec![9.0; 4 * 8];
        engine.process(&mut data, 4);

        for frame in data.chunks(4) {
            assert_eq!(frame, &[0.5, 0.25, 0.0, 0.0]);
        }
        assert_eq!(atomics.source_position(), 8);
    }

    #[test]
    fn test_mono_device_gets_left_channel() {
        let (mut engine, atomics, _events) = engine(1000);
        atomics.set_volume(1.0);
        engine.apply_command(EngineCommand::Play);

        let mut data = vec![0.0; 8];
        engine.process(&mut data, 1);

        assert!(data.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_stop_events_reach_consumer() {
        let (mut engine, _atomics, mut events) = engine(10);
        engine.apply_command(EngineCommand::Play);

        let mut data = vec![0.0; 2 * 64];
        engine.process(&mut data, 2);
        engine.process(&mut data, 2);

        assert_eq!(events.pop(), Ok(PlayerEvent::Stop));
    }

    #[test]
    fn test_position_published_while_running() {
        let (mut engine, atomics, _events) = engine(96000);
        engine.apply_command(EngineCommand::Seek { frame: 48000 });
        engine.apply_command(EngineCommand::Play);

        let mut data = vec![0.0; 2 * 480];
        engine.process(&mut data, 2);

        assert_eq!(atomics.elapsed_seconds(), 1.0);
        assert_eq!(atomics.source_position(), 48480);
    }
}
