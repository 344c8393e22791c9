//! Common types for Warble
//!
//! Fundamental audio types shared by the decoder, the processing stage and
//! the playback driver: stereo samples, pre-allocated stereo buffers and
//! the driver's play state.

/// Frames requested from the processing stage per output block
pub const BLOCK_SIZE: usize = 8192;

/// Number of interleaved channels produced by the frame source and stage
pub const CHANNELS: usize = 2;

/// Audio sample type (32-bit float)
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

/// A buffer of stereo samples
///
/// Used as the driver's pre-sized output block. The stage writes into it
/// through the interleaved view; the driver reads it back per channel.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from separate left and right channel slices
    pub fn from_channels(left: &[Sample], right: &[Sample]) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        let samples = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect();
        Self { samples }
    }

    /// Number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Allocated capacity in stereo samples
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Never grows past the existing capacity; newly exposed elements are silent.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let new_len = new_len.min(self.samples.capacity());
        if new_len > self.samples.len() {
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Zero-copy view of the samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Zero-copy mutable view of the samples as interleaved f32
    ///
    /// This is what gets handed to the processing stage's `extract`.
    #[inline]
    pub fn as_interleaved_mut(&mut self) -> &mut [Sample] {
        bytemuck::cast_slice_mut(&mut self.samples)
    }

    /// Write the first `frames` samples to separate channel buffers, scaled by `gain`
    ///
    /// Output frames past `frames` are zeroed.
    pub fn deinterleave_into(&self, frames: usize, gain: Sample, left: &mut [Sample], right: &mut [Sample]) {
        let frames = frames.min(self.samples.len()).min(left.len()).min(right.len());
        for (i, sample) in self.samples[..frames].iter().enumerate() {
            let scaled = *sample * gain;
            left[i] = scaled.left;
            right[i] = scaled.right;
        }
        left[frames..].fill(0.0);
        right[frames..].fill(0.0);
    }
}

/// Playback driver state
///
/// `Running` means the output callback is pulling from the stage;
/// `Stopped` means it is detached and renders silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Running,
}

impl PlayState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            PlayState::Stopped => 0,
            PlayState::Running => 1,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => PlayState::Running,
            _ => PlayState::Stopped,
        }
    }
}
