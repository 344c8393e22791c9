//! Processing stage - pitch and tempo shifting
//!
//! The playback driver treats the stage as an opaque pull-based producer
//! ([`FrameProducer`]). The transport additionally needs to set pitch and
//! tempo and to reposition the underlying source ([`ShiftingStage`]).
//!
//! [`StretchStage`] wraps signalsmith-stretch. [`Bypass`] forwards source
//! frames unchanged and is selectable from the config when no shifting is
//! wanted. [`AnyStage`] picks one of them at runtime without boxing.

use serde::{Deserialize, Serialize};
use signalsmith_stretch::Stretch;

use crate::engine::FrameSource;
use crate::types::{Sample, BLOCK_SIZE, CHANNELS};

/// Highest tempo the stretch stage can feed at full rate
///
/// The feed buffer is pre-allocated for `BLOCK_SIZE * MAX_FEED_TEMPO`
/// source frames; faster tempos are capped to that many frames per block.
pub const MAX_FEED_TEMPO: f64 = 4.0;

/// Pull-based producer of interleaved stereo frames
pub trait FrameProducer: Send {
    /// Write up to `max_frames` transformed frames into `output`
    ///
    /// Returns the number of frames written (`<= max_frames`). Zero signals
    /// permanent exhaustion until the source is repositioned.
    fn extract(&mut self, output: &mut [Sample], max_frames: usize) -> usize;
}

/// A frame producer with pitch/tempo controls over a repositionable source
pub trait ShiftingStage: FrameProducer {
    fn pitch(&self) -> f64;

    /// Pitch multiplier (1.0 = unchanged). Not validated.
    fn set_pitch(&mut self, pitch: f64);

    fn tempo(&self) -> f64;

    /// Tempo multiplier (1.0 = unchanged). Not validated.
    fn set_tempo(&mut self, tempo: f64);

    /// Cursor of the underlying frame source
    fn source_position(&self) -> usize;

    /// Reposition the underlying frame source and discard buffered audio
    fn set_source_position(&mut self, frame: usize);

    /// Total frames of the underlying frame source
    fn total_frames(&self) -> usize;
}

/// Convert a pitch multiplier to semitones
///
/// Returns `None` for multipliers with no defined transposition (zero,
/// negative, NaN, infinite).
pub fn pitch_to_semitones(pitch: f64) -> Option<f64> {
    let semitones = 12.0 * pitch.log2();
    semitones.is_finite().then_some(semitones)
}

/// Source frames to pull for `max_frames` output frames at `tempo`
///
/// At least one frame (so a non-positive or NaN tempo still makes progress),
/// at most `capacity`.
pub fn feed_frames(max_frames: usize, tempo: f64, capacity: usize) -> usize {
    let wanted = (max_frames as f64 * tempo).round();
    let wanted = if wanted.is_nan() || wanted < 1.0 { 1 } else { wanted.min(capacity as f64) as usize };
    wanted.clamp(1, capacity.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StretchState {
    /// Source still has frames
    Streaming,
    /// Source ran dry; serving the flushed tail
    Draining,
    /// Tail served; extract returns zero
    Exhausted,
}

/// Pitch/tempo stage backed by signalsmith-stretch
///
/// Tempo is applied by feeding `round(max_frames * tempo)` source frames
/// for every `max_frames` output frames; the library derives the stretch
/// ratio from the input/output length ratio. Pitch is applied as a
/// transposition in semitones.
pub struct StretchStage<S: FrameSource> {
    stretcher: Stretch,
    source: S,
    pitch: f64,
    tempo: f64,
    /// Pre-allocated interleaved feed buffer
    feed: Vec<Sample>,
    /// Pre-allocated interleaved tail, filled by `flush` on exhaustion
    tail: Vec<Sample>,
    tail_pos: usize,
    state: StretchState,
}

impl<S: FrameSource> StretchStage<S> {
    /// Create a stage pulling from `source` at `sample_rate`
    pub fn new(source: S, sample_rate: u32) -> Self {
        let stretcher = Stretch::preset_default(CHANNELS as u32, sample_rate);
        let tail_frames = stretcher.output_latency();
        let feed_frames = (BLOCK_SIZE as f64 * MAX_FEED_TEMPO) as usize;

        Self {
            stretcher,
            source,
            pitch: 1.0,
            tempo: 1.0,
            feed: vec![0.0; feed_frames * CHANNELS],
            tail: vec![0.0; tail_frames * CHANNELS],
            tail_pos: 0,
            state: StretchState::Streaming,
        }
    }

    fn feed_capacity(&self) -> usize {
        self.feed.len() / CHANNELS
    }

    fn begin_drain(&mut self) {
        self.tail.fill(0.0);
        self.stretcher.flush(&mut self.tail[..]);
        self.tail_pos = 0;
        self.state = StretchState::Draining;
    }

    fn drain(&mut self, output: &mut [Sample], max_frames: usize) -> usize {
        let remaining = self.tail.len() / CHANNELS - self.tail_pos;
        let count = remaining.min(max_frames);
        if count == 0 {
            self.state = StretchState::Exhausted;
            return 0;
        }

        let start = self.tail_pos * CHANNELS;
        output[..count * CHANNELS].copy_from_slice(&self.tail[start..start + count * CHANNELS]);
        self.tail_pos += count;
        count
    }
}

impl<S: FrameSource> FrameProducer for StretchStage<S> {
    fn extract(&mut self, output: &mut [Sample], max_frames: usize) -> usize {
        let max_frames = max_frames.min(output.len() / CHANNELS);

        match self.state {
            StretchState::Exhausted => return 0,
            StretchState::Draining => return self.drain(output, max_frames),
            StretchState::Streaming => {}
        }

        if max_frames == 0 {
            return 0;
        }

        let wanted = feed_frames(max_frames, self.tempo, self.feed_capacity());
        let got = self.source.extract(&mut self.feed[..wanted * CHANNELS], wanted);

        if got == wanted {
            let out = &mut output[..max_frames * CHANNELS];
            out.fill(0.0);
            self.stretcher.process(&self.feed[..wanted * CHANNELS], out);
            return max_frames;
        }

        // Source ran dry inside this request: stretch what arrived into a
        // proportionally shorter output, then switch to the flushed tail
        let produced = if got > 0 {
            let frames = ((got as f64 / wanted as f64) * max_frames as f64).round() as usize;
            let frames = frames.clamp(1, max_frames);
            let out = &mut output[..frames * CHANNELS];
            out.fill(0.0);
            self.stretcher.process(&self.feed[..got * CHANNELS], out);
            frames
        } else {
            0
        };

        self.begin_drain();

        if produced > 0 {
            produced
        } else {
            self.drain(output, max_frames)
        }
    }
}

impl<S: FrameSource> ShiftingStage for StretchStage<S> {
    fn pitch(&self) -> f64 {
        self.pitch
    }

    fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch;
        // None for tonality_limit means no limit on formant preservation
        if let Some(semitones) = pitch_to_semitones(pitch) {
            self.stretcher.set_transpose_factor_semitones(semitones as f32, None);
        }
    }

    fn tempo(&self) -> f64 {
        self.tempo
    }

    fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
    }

    fn source_position(&self) -> usize {
        self.source.position()
    }

    fn set_source_position(&mut self, frame: usize) {
        self.source.set_position(frame);
        self.stretcher.reset();
        self.tail_pos = 0;
        self.state = StretchState::Streaming;
    }

    fn total_frames(&self) -> usize {
        self.source.total_frames()
    }
}

/// Stage that forwards source frames unchanged
///
/// Pitch and tempo are stored so the transport reads back what it set,
/// but they have no effect on the audio.
pub struct Bypass<S: FrameSource> {
    source: S,
    pitch: f64,
    tempo: f64,
}

impl<S: FrameSource> Bypass<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pitch: 1.0,
            tempo: 1.0,
        }
    }
}

impl<S: FrameSource> FrameProducer for Bypass<S> {
    fn extract(&mut self, output: &mut [Sample], max_frames: usize) -> usize {
        self.source.extract(output, max_frames)
    }
}

impl<S: FrameSource> ShiftingStage for Bypass<S> {
    fn pitch(&self) -> f64 {
        self.pitch
    }

    fn set_pitch(&mut self, pitch: f64) {
        self.pitch = pitch;
    }

    fn tempo(&self) -> f64 {
        self.tempo
    }

    fn set_tempo(&mut self, tempo: f64) {
        self.tempo = tempo;
    }

    fn source_position(&self) -> usize {
        self.source.position()
    }

    fn set_source_position(&mut self, frame: usize) {
        self.source.set_position(frame);
    }

    fn total_frames(&self) -> usize {
        self.source.total_frames()
    }
}

/// Which processing stage to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Independent pitch and tempo via signalsmith-stretch
    #[default]
    Stretch,
    /// Source frames unchanged; pitch and tempo are stored but ignored
    Bypass,
}

/// Runtime-selected stage (enum dispatch, no allocation in the callback)
pub enum AnyStage<S: FrameSource> {
    Stretch(StretchStage<S>),
    Bypass(Bypass<S>),
}

impl<S: FrameSource> AnyStage<S> {
    pub fn new(kind: StageKind, source: S, sample_rate: u32) -> Self {
        match kind {
            StageKind::Stretch => AnyStage::Stretch(StretchStage::new(source, sample_rate)),
            StageKind::Bypass => AnyStage::Bypass(Bypass::new(source)),
        }
    }

    pub fn kind(&self) -> StageKind {
        match self {
            AnyStage::Stretch(_) => StageKind::Stretch,
            AnyStage::Bypass(_) => StageKind::Bypass,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $stage:ident => $body:expr) => {
        match $self {
            AnyStage::Stretch($stage) => $body,
            AnyStage::Bypass($stage) => $body,
        }
    };
}

impl<S: FrameSource> FrameProducer for AnyStage<S> {
    fn extract(&mut self, output: &mut [Sample], max_frames: usize) -> usize {
        dispatch!(self, stage => stage.extract(output, max_frames))
    }
}

impl<S: FrameSource> ShiftingStage for AnyStage<S> {
    fn pitch(&self) -> f64 {
        dispatch!(self, stage => stage.pitch())
    }

    fn set_pitch(&mut self, pitch: f64) {
        dispatch!(self, stage => stage.set_pitch(pitch))
    }

    fn tempo(&self) -> f64 {
        dispatch!(self, stage => stage.tempo())
    }

    fn set_tempo(&mut self, tempo: f64) {
        dispatch!(self, stage => stage.set_tempo(tempo))
    }

    fn source_position(&self) -> usize {
        dispatch!(self, stage => stage.source_position())
    }

    fn set_source_position(&mut self, frame: usize) {
        dispatch!(self, stage => stage.set_source_position(frame))
    }

    fn total_frames(&self) -> usize {
        dispatch!(self, stage => stage.total_frames())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::DecodedBuffer;
    use crate::engine::BufferSource;
    use std::sync::Arc;

    fn sine_source(frames: usize) -> BufferSource {
        let left: Vec<f32> = (0..frames)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / 48000.0).sin() * 0.5)
            .collect();
        let right = left.clone();
        BufferSource::new(Arc::new(DecodedBuffer::from_channels(left, right, 48000)))
    }

    fn drain_all<P: FrameProducer>(stage: &mut P, block: usize) -> usize {
        let mut out = vec![0.0; block * CHANNELS];
        let mut total = 0;
        for _ in 0..10_000 {
            let n = stage.extract(&mut out, block);
            if n == 0 {
                return total;
            }
            assert!(n <= block);
            total += n;
        }
        panic!("stage never exhausted");
    }

    #[test]
    fn test_pitch_to_semitones() {
        assert_eq!(pitch_to_semitones(1.0), Some(0.0));
        assert!((pitch_to_semitones(2.0).unwrap() - 12.0).abs() < 1e-12);
        assert!((pitch_to_semitones(0.5).unwrap() + 12.0).abs() < 1e-12);
        assert_eq!(pitch_to_semitones(0.0), None);
        assert_eq!(pitch_to_semitones(-1.0), None);
        assert_eq!(pitch_to_semitones(f64::NAN), None);
    }

    #[test]
    fn test_feed_frames() {
        assert_eq!(feed_frames(1000, 1.0, 32768), 1000);
        assert_eq!(feed_frames(1000, 1.5, 32768), 1500);
        assert_eq!(feed_frames(1000, 0.5, 32768), 500);
        assert_eq!(feed_frames(8192, 10.0, 32768), 32768);
        assert_eq!(feed_frames(1000, 0.0, 32768), 1);
        assert_eq!(feed_frames(1000, -2.0, 32768), 1);
        assert_eq!(feed_frames(1000, f64::NAN, 32768), 1);
    }

    #[test]
    fn test_stretch_consumes_source_at_tempo() {
        let mut stage = StretchStage::new(sine_source(48000 * 5), 48000);
        let mut out = vec![0.0; 1024 * CHANNELS];

        stage.set_tempo(2.0);
        assert_eq!(stage.extract(&mut out, 1024), 1024);
        assert_eq!(stage.source_position(), 2048);

        stage.set_tempo(0.5);
        assert_eq!(stage.extract(&mut out, 1024), 1024);
        assert_eq!(stage.source_position(), 2048 + 512);
    }

    #[test]
    fn test_stretch_pitch_does_not_change_consumption() {
        let mut stage = StretchStage::new(sine_source(48000), 48000);
        let mut out = vec![0.0; 512 * CHANNELS];

        stage.set_pitch(1.5);
        assert_eq!(stage.pitch(), 1.5);
        stage.extract(&mut out, 512);
        assert_eq!(stage.source_position(), 512);
        assert!(out.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_stretch_accepts_degenerate_parameters() {
        let mut stage = StretchStage::new(sine_source(4800), 48000);
        let mut out = vec![0.0; 256 * CHANNELS];

        stage.set_pitch(0.0);
        stage.set_tempo(0.0);
        assert_eq!(stage.pitch(), 0.0);
        assert_eq!(stage.tempo(), 0.0);
        assert_eq!(stage.extract(&mut out, 256), 256);
        assert_eq!(stage.source_position(), 1);
    }

    #[test]
    fn test_stretch_exhausts_and_stays_exhausted() {
        let mut stage = StretchStage::new(sine_source(10_000), 48000);

        let produced = drain_all(&mut stage, 4096);
        assert!(produced >= 10_000);
        assert_eq!(stage.source_position(), 10_000);

        let mut out = vec![0.0; 4096 * CHANNELS];
        for _ in 0..3 {
            assert_eq!(stage.extract(&mut out, 4096), 0);
        }
    }

    #[test]
    fn test_stretch_seek_revives_exhausted_stage() {
        let mut stage = StretchStage::new(sine_source(10_000), 48000);
        drain_all(&mut stage, 4096);

        stage.set_source_position(5_000);
        assert_eq!(stage.source_position(), 5_000);

        let mut out = vec![0.0; 1024 * CHANNELS];
        assert_eq!(stage.extract(&mut out, 1024), 1024);
        assert_eq!(stage.source_position(), 6_024);
    }

    #[test]
    fn test_stretch_partial_block_at_end() {
        let mut stage = StretchStage::new(sine_source(1_500), 48000);
        let mut out = vec![0.0; 1024 * CHANNELS];

        assert_eq!(stage.extract(&mut out, 1024), 1024);
        // 476 frames left of the 1024 wanted
        assert_eq!(stage.extract(&mut out, 1024), 476);
        assert_eq!(stage.source_position(), 1_500);
    }

    #[test]
    fn test_bypass_passes_frames_through() {
        let mut stage = Bypass::new(sine_source(100));
        let mut out = vec![0.0; 50 * CHANNELS];

        stage.set_pitch(2.0);
        stage.set_tempo(3.0);
        assert_eq!(stage.extract(&mut out, 50), 50);
        assert_eq!(stage.source_position(), 50);
        assert_eq!(stage.pitch(), 2.0);
        assert_eq!(stage.tempo(), 3.0);
        assert_eq!(drain_all(&mut stage, 32), 50);
    }

    #[test]
    fn test_any_stage_dispatches() {
        let mut stage = AnyStage::Bypass(Bypass::new(sine_source(100)));
        stage.set_source_position(90);
        assert_eq!(stage.total_frames(), 100);
        let mut out = vec![0.0; 20 * CHANNELS];
        assert_eq!(stage.extract(&mut out, 20), 10);
        assert_eq!(stage.source_position(), 100);
    }

    #[test]
    fn test_any_stage_built_from_kind() {
        let stage = AnyStage::new(StageKind::Bypass, sine_source(100), 48000);
        assert_eq!(stage.kind(), StageKind::Bypass);

        let stage = AnyStage::new(StageKind::default(), sine_source(100), 48000);
        assert_eq!(stage.kind(), StageKind::Stretch);
    }
}
