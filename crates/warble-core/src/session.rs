//! Player session - one loaded file and its output stream
//!
//! A session owns the transport, the running output stream and the poll
//! flag for one file. Loading another file means dropping this session
//! (which stops its stream) and starting a new one; nothing outlives it.
//!
//! Loading happens in two steps so the heavy part can run off the UI
//! thread: [`Session::prepare`] decodes and resamples (the result is
//! `Send`), [`Session::start`] opens the stream on the calling thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::audio::{open_output, output_sample_rate, start_stream, AudioConfig, AudioError, AudioHandle};
use crate::audio_file::{AudioFileError, DecodedBuffer};
use crate::engine::{EngineHalf, PlayerEvent, PlayerParams, Transport};
use crate::timestretch::StageKind;

/// Errors raised while loading a file into a new session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    File(#[from] AudioFileError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// A decoded file ready to be played, already at the device rate
#[derive(Debug, Clone)]
pub struct PreparedFile {
    pub path: PathBuf,
    pub buffer: Arc<DecodedBuffer>,
}

impl PreparedFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

pub struct Session {
    transport: Transport,
    /// None for sessions driven without an output stream
    audio: Option<AudioHandle>,
    path: Option<PathBuf>,
    playing: bool,
    /// Whether the position poll timer should tick
    poll_active: bool,
}

impl Session {
    /// Decode `path` and convert it to the rate the configured device runs at
    ///
    /// Blocking; call it from a worker thread.
    pub fn prepare(path: &Path, audio: &AudioConfig) -> Result<PreparedFile, SessionError> {
        let device_rate = output_sample_rate(audio)?;
        let buffer = DecodedBuffer::open(path)?.resampled(device_rate)?;
        Ok(PreparedFile {
            path: path.to_path_buf(),
            buffer: Arc::new(buffer),
        })
    }

    /// Open the output stream and start a stopped session for `file`
    pub fn start(file: PreparedFile, audio: &AudioConfig, params: PlayerParams) -> Result<Self, SessionError> {
        let target = open_output(audio)?;

        let buffer = if file.buffer.sample_rate() != target.sample_rate() {
            log::warn!(
                "Device rate changed to {}Hz since decoding, resampling again",
                target.sample_rate()
            );
            let owned = Arc::try_unwrap(file.buffer).unwrap_or_else(|shared| (*shared).clone());
            Arc::new(owned.resampled(target.sample_rate())?)
        } else {
            file.buffer
        };

        let (half, transport) = Transport::build(buffer, audio.stage, params);
        let handle = start_stream(target, half)?;

        log::info!(
            "Session started for {:?} ({:.1}s)",
            file.path,
            transport.duration()
        );

        Ok(Self {
            transport,
            audio: Some(handle),
            path: Some(file.path),
            playing: false,
            poll_active: false,
        })
    }

    /// Session without an output stream; the caller drives the engine half
    pub fn detached(buffer: Arc<DecodedBuffer>, stage: StageKind, params: PlayerParams) -> (Self, EngineHalf) {
        let (half, transport) = Transport::build(buffer, stage, params);
        let session = Self {
            transport,
            audio: None,
            path: None,
            playing: false,
            poll_active: false,
        };
        (session, half)
    }

    /// Start playback; returns false if already playing
    ///
    /// Drops any `Stop` still queued from before, so it can't pause the
    /// playback started here.
    pub fn play(&mut self) -> bool {
        if self.playing {
            return false;
        }
        while self.transport.poll_event().is_some() {}
        self.transport.play();
        self.playing = true;
        self.poll_active = true;
        true
    }

    /// Pause playback; returns false if already paused
    pub fn pause(&mut self) -> bool {
        if !self.playing {
            return false;
        }
        self.transport.pause();
        self.playing = false;
        self.poll_active = false;
        true
    }

    /// Drain notifications from the audio thread
    ///
    /// A `Stop` pauses the session and stops the poll timer. Returns true
    /// if playback ended during this call.
    pub fn handle_events(&mut self) -> bool {
        let mut ended = false;
        while let Some(event) = self.transport.poll_event() {
            match event {
                PlayerEvent::Stop => {
                    if self.pause() {
                        log::info!("End of stream reached, pausing");
                        ended = true;
                    }
                }
            }
        }
        ended
    }

    /// Seek to `percent` of the file; returns the target frame
    pub fn seek_percent(&mut self, percent: f64) -> usize {
        self.transport.seek_percent(percent)
    }

    pub fn set_pitch(&self, pitch: f64) {
        self.transport.set_pitch(pitch);
    }

    pub fn set_tempo(&self, tempo: f64) {
        self.transport.set_tempo(tempo);
    }

    pub fn set_volume(&self, volume: f64) {
        self.transport.set_volume(volume);
    }

    /// Current pitch/tempo/volume
    pub fn params(&self) -> PlayerParams {
        PlayerParams {
            pitch: self.transport.pitch(),
            tempo: self.transport.tempo(),
            volume: self.transport.volume(),
        }
    }

    /// Seek slider position as a fraction of the file (0.0..=1.0)
    ///
    /// Source cursor over total frames, i.e. `duration_val / rate / duration`
    /// at the buffer's own rate.
    pub fn position_fraction(&self) -> f64 {
        self.transport.progress()
    }

    pub fn elapsed(&self) -> f64 {
        self.transport.elapsed_seconds()
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn poll_active(&self) -> bool {
        self.poll_active
    }

    pub fn audio(&self) -> Option<&AudioHandle> {
        self.audio.as_ref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pause();
        if let Some(path) = &self.path {
            log::info!("Releasing session for {:?}", path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PlayState, BLOCK_SIZE};

    fn ten_seconds() -> (Session, EngineHalf) {
        let buffer = DecodedBuffer::silence(480000, 48000);
        Session::detached(Arc::new(buffer), StageKind::Bypass, PlayerParams::default())
    }

    fn render(half: &mut EngineHalf) {
        half.engine.process_commands(&mut half.commands);
        let mut data = vec![0.0; 2 * BLOCK_SIZE];
        half.engine.process(&mut data, 2);
    }

    #[test]
    fn test_play_pause_are_idempotent() {
        let (mut session, mut half) = ten_seconds();

        assert!(!session.pause());
        assert!(session.play());
        assert!(!session.play());
        assert!(session.poll_active());

        render(&mut half);
        assert_eq!(half.engine.play_state(), PlayState::Running);

        assert!(session.pause());
        assert!(!session.pause());
        assert!(!session.poll_active());

        render(&mut half);
        assert_eq!(half.engine.play_state(), PlayState::Stopped);
    }

    #[test]
    fn test_stop_event_pauses_session() {
        let (mut session, mut half) = ten_seconds();
        session.seek_percent(100.0);
        session.play();
        render(&mut half);
        render(&mut half);

        assert!(session.handle_events());
        assert!(!session.is_playing());
        assert!(!session.poll_active());

        // Driver picks up the pause on the next block and goes quiet
        render(&mut half);
        assert!(!session.handle_events());
    }

    #[test]
    fn test_queued_stop_does_not_pause_replay() {
        let (mut session, mut half) = ten_seconds();
        session.seek_percent(100.0);
        session.play();
        render(&mut half);

        assert!(session.handle_events());

        // A callback already in flight renders once more before it sees the pause
        let mut data = vec![0.0; 2 * BLOCK_SIZE];
        half.engine.process(&mut data, 2);

        session.seek_percent(0.0);
        assert!(session.play());
        render(&mut half);

        assert!(!session.handle_events());
        assert!(session.is_playing());
        assert_eq!(half.engine.play_state(), PlayState::Running);
    }

    #[test]
    fn test_position_fraction_uses_buffer_rate() {
        let buffer = DecodedBuffer::silence(441000, 44100);
        let (mut session, mut half) =
            Session::detached(Arc::new(buffer), StageKind::Bypass, PlayerParams::default());
        session.seek_percent(25.0);
        session.play();
        render(&mut half);

        assert_eq!(session.elapsed(), 2.5);
        let expected = (110250 + BLOCK_SIZE) as f64 / 441000.0;
        assert!((session.position_fraction() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_params_round_trip_through_transport() {
        let (session, _half) = ten_seconds();
        session.set_pitch(1.1);
        session.set_tempo(0.9);
        session.set_volume(0.3);

        assert_eq!(
            session.params(),
            PlayerParams {
                pitch: 1.1,
                tempo: 0.9,
                volume: 0.3
            }
        );
    }

    #[test]
    fn test_duration_available_immediately() {
        let (session, _half) = ten_seconds();
        assert_eq!(session.duration(), 10.0);
        assert_eq!(session.position_fraction(), 0.0);
        assert!(session.audio().is_none());
    }

    #[test]
    fn test_prepared_file_name() {
        let file = PreparedFile {
            path: PathBuf::from("/music/song.flac"),
            buffer: Arc::new(DecodedBuffer::silence(1, 48000)),
        };
        assert_eq!(file.file_name(), "song.flac");
    }
}
