//! Decoded audio buffers
//!
//! Loads a local audio file of any format symphonia understands into an
//! immutable stereo [`DecodedBuffer`]. Mono files are duplicated to both
//! channels; channels beyond the first two are dropped. If the output
//! device runs at a different rate, [`DecodedBuffer::resampled`] converts
//! the whole buffer once at load time so the playback path never resamples.

use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::Sample;

/// Chunk size fed to the FFT resampler
const RESAMPLE_CHUNK: usize = 1024;

/// Errors raised while loading an audio file
#[derive(Error, Debug)]
pub enum AudioFileError {
    /// File couldn't be opened or read
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Container not recognised or codec not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The container has no decodable audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// Decoding stopped on an unrecoverable error
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Decoding finished without producing a single frame
    #[error("File contains no audio frames")]
    Empty,

    /// Sample rate conversion failed
    #[error("Resampling {from}Hz -> {to}Hz failed: {reason}")]
    Resample { from: u32, to: u32, reason: String },
}

/// Result type for audio file operations
pub type AudioFileResult<T> = Result<T, AudioFileError>;

/// Immutable stereo audio decoded from a file
///
/// Owned (behind an `Arc`) by the session for the lifetime of one loaded
/// file. The frame source reads it without copying.
#[derive(Clone)]
pub struct DecodedBuffer {
    left: Vec<Sample>,
    right: Vec<Sample>,
    sample_rate: u32,
}

impl std::fmt::Debug for DecodedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedBuffer")
            .field("frames", &self.total_frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl DecodedBuffer {
    /// Build a buffer from separate channels
    ///
    /// Panics if the channel lengths differ or the sample rate is zero.
    pub fn from_channels(left: Vec<Sample>, right: Vec<Sample>, sample_rate: u32) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        assert!(sample_rate > 0, "Sample rate must be non-zero");
        Self {
            left,
            right,
            sample_rate,
        }
    }

    /// A silent buffer of `frames` frames
    pub fn silence(frames: usize, sample_rate: u32) -> Self {
        Self::from_channels(vec![0.0; frames], vec![0.0; frames], sample_rate)
    }

    /// Decode a file from disk
    pub fn open(path: &Path) -> AudioFileResult<Self> {
        let file = File::open(path).map_err(|e| AudioFileError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let buffer = Self::decode(Box::new(file), hint)?;
        log::info!(
            "Decoded {:?}: {} frames @ {}Hz ({:.1}s)",
            path,
            buffer.total_frames(),
            buffer.sample_rate,
            buffer.duration()
        );
        Ok(buffer)
    }

    /// Decode from any symphonia media source (file, in-memory cursor, ...)
    pub fn decode(source: Box<dyn MediaSource>, hint: Hint) -> AudioFileResult<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(AudioFileError::NoAudioTrack)?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| AudioFileError::UnsupportedFormat("Unknown sample rate".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?;

        let mut left: Vec<Sample> = Vec::new();
        let mut right: Vec<Sample> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(AudioFileError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // A corrupt packet is skipped, the rest of the file still plays
                    log::warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(AudioFileError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            if channels == 0 {
                continue;
            }

            let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
            if buf.capacity() < decoded.capacity() * channels {
                *buf = SampleBuffer::new(decoded.capacity() as u64, spec);
            }
            buf.copy_interleaved_ref(decoded);

            for frame in buf.samples().chunks_exact(channels) {
                let l = frame[0];
                let r = if channels > 1 { frame[1] } else { l };
                left.push(l);
                right.push(r);
            }
        }

        if left.is_empty() {
            return Err(AudioFileError::Empty);
        }

        Ok(Self::from_channels(left, right, sample_rate))
    }

    /// Return this buffer converted to `target_rate`
    ///
    /// Returns the buffer unchanged when the rates already match.
    pub fn resampled(self, target_rate: u32) -> AudioFileResult<Self> {
        if target_rate == self.sample_rate || target_rate == 0 {
            return Ok(self);
        }

        let from = self.sample_rate;
        let to_err = |reason: String| AudioFileError::Resample {
            from,
            to: target_rate,
            reason,
        };

        let mut resampler = FftFixedIn::<f32>::new(from as usize, target_rate as usize, RESAMPLE_CHUNK, 2, 2)
            .map_err(|e| to_err(e.to_string()))?;

        let input_frames = self.left.len();
        let expected = (input_frames as f64 * target_rate as f64 / from as f64).ceil() as usize;
        let mut out_left = Vec::with_capacity(expected + RESAMPLE_CHUNK);
        let mut out_right = Vec::with_capacity(expected + RESAMPLE_CHUNK);

        let mut chunk = vec![vec![0.0f32; RESAMPLE_CHUNK]; 2];
        let mut pos = 0;
        while pos < input_frames {
            let needed = resampler.input_frames_next();
            let take = needed.min(input_frames - pos);

            for (ch, src) in [&self.left, &self.right].into_iter().enumerate() {
                chunk[ch].resize(needed, 0.0);
                chunk[ch][..take].copy_from_slice(&src[pos..pos + take]);
                chunk[ch][take..].fill(0.0);
            }

            let output = resampler.process(&chunk, None).map_err(|e| to_err(e.to_string()))?;
            out_left.extend_from_slice(&output[0]);
            out_right.extend_from_slice(&output[1]);
            pos += take;
        }

        // The FFT resampler delays its output: keep feeding silence until the
        // delayed tail is out, then trim the leading delay and the padding
        let delay = resampler.output_delay();
        while out_left.len() < expected + delay {
            let needed = resampler.input_frames_next();
            for ch in chunk.iter_mut() {
                ch.resize(needed, 0.0);
                ch.fill(0.0);
            }
            let output = resampler.process(&chunk, None).map_err(|e| to_err(e.to_string()))?;
            out_left.extend_from_slice(&output[0]);
            out_right.extend_from_slice(&output[1]);
        }
        out_left.drain(..delay);
        out_right.drain(..delay);
        out_left.truncate(expected);
        out_right.truncate(expected);

        log::info!("Resampled {} frames {}Hz -> {} frames {}Hz", input_frames, from, out_left.len(), target_rate);

        Ok(Self::from_channels(out_left, out_right, target_rate))
    }

    /// Left channel samples
    #[inline]
    pub fn left(&self) -> &[Sample] {
        &self.left
    }

    /// Right channel samples
    #[inline]
    pub fn right(&self) -> &[Sample] {
        &self.right
    }

    /// Number of frames per channel
    #[inline]
    pub fn total_frames(&self) -> usize {
        self.left.len()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.total_frames() as f64 / self.sample_rate as f64
    }
}
