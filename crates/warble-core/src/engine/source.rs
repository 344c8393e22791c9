//! Frame source - pull interface over a decoded buffer
//!
//! The processing stage pulls interleaved stereo frames from here at its
//! own pace. The source owns the cursor; the only other writer is an
//! explicit seek, which is applied on the same (audio) thread between
//! blocks, so no synchronization is needed around it.

use std::sync::Arc;

use crate::audio_file::DecodedBuffer;
use crate::types::{Sample, CHANNELS};

use super::PlayerAtomics;

/// Pull-based producer of interleaved stereo frames
pub trait FrameSource: Send {
    /// Write up to `frames` interleaved stereo frames into `target`
    ///
    /// Returns the number of frames written. Zero means the source is
    /// exhausted; it keeps returning zero until repositioned.
    fn extract(&mut self, target: &mut [Sample], frames: usize) -> usize;

    /// Current cursor in frames
    fn position(&self) -> usize;

    /// Overwrite the cursor (clamped to `total_frames`)
    fn set_position(&mut self, frame: usize);

    /// Total number of frames available
    fn total_frames(&self) -> usize;
}

/// Convert a seek fraction (0.0..=1.0) to a frame offset
///
/// `round(fraction * total_frames)`, clamped to `0..=total_frames`.
/// NaN maps to 0.
pub fn fraction_to_frame(fraction: f64, total_frames: usize) -> usize {
    let frame = (fraction * total_frames as f64).round();
    if frame.is_nan() || frame <= 0.0 {
        0
    } else {
        (frame as usize).min(total_frames)
    }
}

/// Frame source reading from an in-memory [`DecodedBuffer`]
pub struct BufferSource {
    buffer: Arc<DecodedBuffer>,
    cursor: usize,
    atomics: Option<Arc<PlayerAtomics>>,
}

impl BufferSource {
    pub fn new(buffer: Arc<DecodedBuffer>) -> Self {
        Self {
            buffer,
            cursor: 0,
            atomics: None,
        }
    }

    /// Publish a position update to `atomics` on every extract
    pub fn with_atomics(mut self, atomics: Arc<PlayerAtomics>) -> Self {
        self.atomics = Some(atomics);
        self
    }

    /// Frames left before exhaustion
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buffer.total_frames() - self.cursor
    }
}

impl FrameSource for BufferSource {
    fn extract(&mut self, target: &mut [Sample], frames: usize) -> usize {
        // Cursor before this block, so the last report lags the end by one block
        if let Some(ref atomics) = self.atomics {
            atomics.publish_position(self.cursor, self.buffer.sample_rate());
        }

        let count = frames.min(self.remaining()).min(target.len() / CHANNELS);
        let start = self.cursor;
        let left = &self.buffer.left()[start..start + count];
        let right = &self.buffer.right()[start..start + count];

        for (frame, (&l, &r)) in target.chunks_exact_mut(CHANNELS).zip(left.iter().zip(right)) {
            frame[0] = l;
            frame[1] = r;
        }

        self.cursor += count;
        count
    }

    #[inline]
    fn position(&self) -> usize {
        self.cursor
    }

    fn set_position(&mut self, frame: usize) {
        self.cursor = frame.min(self.buffer.total_frames());
    }

    #[inline]
    fn total_frames(&self) -> usize {
        self.buffer.total_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BLOCK_SIZE;

    fn ramp_source(frames: usize, sample_rate: u32) -> BufferSource {
        let left: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        let right: Vec<f32> = (0..frames).map(|i| -(i as f32)).collect();
        BufferSource::new(Arc::new(DecodedBuffer::from_channels(left, right, sample_rate)))
    }

    #[test]
    fn test_extract_within_remaining_returns_exact_count() {
        let mut source = ramp_source(1000, 48000);
        let mut target = vec![0.0; 2 * 300];

        for n in [1, 10, 100, 289] {
            let before = source.position();
            assert_eq!(source.extract(&mut target, n), n);
            assert_eq!(source.position(), before + n);
        }
    }

    #[test]
    fn test_extract_interleaves_from_cursor() {
        let mut source = ramp_source(100, 48000);
        source.set_position(10);
        let mut target = vec![0.0; 6];

        source.extract(&mut target, 3);

        assert_eq!(target, vec![10.0, -10.0, 11.0, -11.0, 12.0, -12.0]);
    }

    #[test]
    fn test_extract_past_end_returns_remaining() {
        let mut source = ramp_source(500, 48000);
        source.set_position(450);
        let mut target = vec![0.0; 2 * 200];

        assert_eq!(source.extract(&mut target, 200), 50);
        assert_eq!(source.position(), 500);
    }

    #[test]
    fn test_exhaustion_is_idempotent_until_seek() {
        let mut source = ramp_source(480000, 48000);
        source.set_position(480000 - 100);
        let mut target = vec![0.0; 2 * BLOCK_SIZE];

        assert_eq!(source.extract(&mut target, BLOCK_SIZE), 100);
        for _ in 0..5 {
            assert_eq!(source.extract(&mut target, BLOCK_SIZE), 0);
        }

        source.set_position(fraction_to_frame(0.0, source.total_frames()));
        assert_eq!(source.extract(&mut target, BLOCK_SIZE), BLOCK_SIZE);
    }

    #[test]
    fn test_aggregate_never_overruns() {
        let total = 10_007;
        let mut source = ramp_source(total, 44100);
        let mut target = vec![0.0; 2 * 777];

        let mut sum = 0;
        for _ in 0..50 {
            sum += source.extract(&mut target, 777);
        }
        assert_eq!(sum, total);
    }

    #[test]
    fn test_half_seek_then_block_on_ten_seconds() {
        let mut source = ramp_source(480000, 48000);
        source.set_position(12345);
        source.set_position(fraction_to_frame(0.5, source.total_frames()));
        assert_eq!(source.position(), 240000);

        let mut target = vec![0.0; 2 * BLOCK_SIZE];
        assert_eq!(source.extract(&mut target, BLOCK_SIZE), BLOCK_SIZE);
        assert_eq!(source.position(), 248192);
    }

    #[test]
    fn test_fraction_to_frame_rounds_and_clamps() {
        assert_eq!(fraction_to_frame(0.5, 480000), 240000);
        assert_eq!(fraction_to_frame(1.0 / 3.0, 10), 3);
        assert_eq!(fraction_to_frame(0.25, 10), 3); // 2.5 rounds away from zero
        assert_eq!(fraction_to_frame(1.5, 10), 10);
        assert_eq!(fraction_to_frame(-0.2, 10), 0);
        assert_eq!(fraction_to_frame(f64::NAN, 10), 0);
    }

    #[test]
    fn test_set_position_clamps_to_total() {
        let mut source = ramp_source(100, 48000);
        source.set_position(1_000_000);
        assert_eq!(source.position(), 100);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_extract_publishes_start_position() {
        let atomics = Arc::new(PlayerAtomics::new());
        let mut source = ramp_source(96000, 48000).with_atomics(atomics.clone());
        source.set_position(48000);
        let mut target = vec![0.0; 2 * 1000];

        source.extract(&mut target, 1000);

        assert_eq!(atomics.position(), 48000);
        assert_eq!(atomics.elapsed_seconds(), 1.0);
    }

    #[test]
    fn test_extract_respects_target_capacity() {
        let mut source = ramp_source(100, 48000);
        let mut target = vec![0.0; 2 * 10];
        assert_eq!(source.extract(&mut target, 50), 10);
        assert_eq!(source.position(), 10);
    }
}
