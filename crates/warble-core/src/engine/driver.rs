//! Playback driver - bridges output callbacks to the processing stage
//!
//! Two states: `Stopped` (detached: renders silence, pulls nothing) and
//! `Running` (attached: pulls one block per callback). On a block where
//! the stage returns no frames the driver emits [`PlayerEvent::Stop`]
//! and stays `Running`; the owner of the event queue decides whether to
//! pause.

use crate::timestretch::FrameProducer;
use crate::types::{PlayState, Sample, StereoBuffer, BLOCK_SIZE};

use super::atomics::DEFAULT_VOLUME;
use super::PlayerEvent;

pub struct PlaybackDriver<P: FrameProducer> {
    stage: P,
    state: PlayState,
    volume: Sample,
    /// Pre-allocated output block, handed to the stage as interleaved f32
    block: StereoBuffer,
    events: rtrb::Producer<PlayerEvent>,
}

impl<P: FrameProducer> PlaybackDriver<P> {
    pub fn new(stage: P, events: rtrb::Producer<PlayerEvent>) -> Self {
        Self {
            stage,
            state: PlayState::Stopped,
            volume: DEFAULT_VOLUME as Sample,
            block: StereoBuffer::silence(BLOCK_SIZE),
            events,
        }
    }

    /// Stopped → Running
    pub fn play(&mut self) {
        self.state = PlayState::Running;
    }

    /// Running → Stopped
    pub fn pause(&mut self) {
        self.state = PlayState::Stopped;
    }

    #[inline]
    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn set_volume(&mut self, volume: Sample) {
        self.volume = volume;
    }

    pub fn stage(&self) -> &P {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut P {
        &mut self.stage
    }

    /// Render one output callback into separate channel buffers
    ///
    /// Callbacks larger than [`BLOCK_SIZE`] are served one block at a time.
    /// Returns the number of frames the stage produced.
    pub fn process(&mut self, left: &mut [Sample], right: &mut [Sample]) -> usize {
        let n_frames = left.len().min(right.len());

        if self.state == PlayState::Stopped {
            left.fill(0.0);
            right.fill(0.0);
            return 0;
        }

        let mut produced = 0;
        let mut offset = 0;
        while offset < n_frames {
            let frames = (n_frames - offset).min(BLOCK_SIZE);
            let written = self.render_block(
                &mut left[offset..offset + frames],
                &mut right[offset..offset + frames],
            );
            produced += written;
            offset += frames;
        }
        produced
    }

    fn render_block(&mut self, left: &mut [Sample], right: &mut [Sample]) -> usize {
        let frames = left.len();
        self.block.set_len_from_capacity(frames);

        let written = self.stage.extract(self.block.as_interleaved_mut(), frames).min(frames);
        if written == 0 {
            // Full queue means the UI already has pending Stop events
            let _ = self.events.push(PlayerEvent::Stop);
        }

        self.block.deinterleave_into(written, self.volume, left, right);
        written
    }
}
