//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │     UI Thread    │───push()───────────►│   Command Queue     │
//! │    (Transport)   │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!     ▲          │                                    │ pop()
//!     │ pop()    │ Relaxed atomics                    ▼
//! ┌───┴──────┐ ┌─▼────────────────┐        ┌─────────────────────┐
//! │  Events  │ │  PlayerAtomics   │◄──────►│  CPAL Audio Thread  │
//! │  (SPSC)  │ │   (lock-free)    │        │  (owns AudioEngine) │
//! └───▲──────┘ └──────────────────┘        └──────────┬──────────┘
//!     └───────────────────────────────────────────────┘ push(Stop)
//! ```
//!
//! Opening is split in two so the file can be resampled to the device
//! rate before the engine exists: [`open_output`] negotiates the device
//! config, [`start_stream`] moves the engine into the callback and starts
//! it. The returned [`AudioHandle`] keeps the stream alive.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig, SupportedStreamConfig};

use super::config::{AudioConfig, BufferSize, MAX_BUFFER_SIZE};
use super::device::select_device;
use super::error::{AudioError, AudioResult};
use crate::engine::EngineHalf;

/// A negotiated, not yet started output
pub struct OutputTarget {
    device: cpal::Device,
    device_name: String,
    supported: SupportedStreamConfig,
    buffer_size: BufferSize,
}

impl OutputTarget {
    pub fn sample_rate(&self) -> u32 {
        self.supported.sample_rate().0
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.supported.sample_format()
    }

    fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            channels: self.supported.channels(),
            sample_rate: self.supported.sample_rate(),
            buffer_size: match self.buffer_size.as_frames() {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        }
    }
}

/// Handle to a running output stream
///
/// Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: BufferSize,
    device_name: String,
}

impl AudioHandle {
    /// One-line summary of the running output for the status line
    pub fn describe(&self) -> String {
        describe_output(&self.device_name, self.sample_rate, self.buffer_size)
    }
}

/// `device @ rate` plus the buffer latency when a fixed size was requested
pub fn describe_output(device_name: &str, sample_rate: u32, buffer_size: BufferSize) -> String {
    match buffer_size.latency_ms(sample_rate) {
        Some(latency) => format!("{} @ {}Hz, {:.1} ms", device_name, sample_rate, latency),
        None => format!("{} @ {}Hz", device_name, sample_rate),
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        log::info!("Audio stream on {} stopped", self.device_name);
    }
}

/// Pick the device and stream config described by `config`
pub fn open_output(config: &AudioConfig) -> AudioResult<OutputTarget> {
    let device = select_device(config.device.as_ref())?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = best_output_config(&device, config.target_sample_rate())?;
    log::info!(
        "Audio config: {} channels, {}Hz, {:?}, buffer {:?}",
        supported.channels(),
        supported.sample_rate().0,
        supported.sample_format(),
        config.buffer_size
    );

    Ok(OutputTarget {
        device,
        device_name,
        supported,
        buffer_size: config.buffer_size,
    })
}

/// Sample rate the configured device will run at
pub fn output_sample_rate(config: &AudioConfig) -> AudioResult<u32> {
    Ok(open_output(config)?.sample_rate())
}

/// Move the engine into a new output stream on `target` and start it
pub fn start_stream(target: OutputTarget, half: EngineHalf) -> AudioResult<AudioHandle> {
    let stream_config = target.stream_config();

    let stream = match target.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&target.device, &stream_config, half)?,
        SampleFormat::I16 => build_stream::<i16>(&target.device, &stream_config, half)?,
        SampleFormat::U16 => build_stream::<u16>(&target.device, &stream_config, half)?,
        SampleFormat::I32 => build_stream::<i32>(&target.device, &stream_config, half)?,
        other => return Err(AudioError::UnsupportedFormat(other)),
    };
    stream.play()?;

    log::info!(
        "Audio stream started on {} @ {}Hz",
        target.device_name,
        target.sample_rate()
    );

    Ok(AudioHandle {
        _stream: stream,
        sample_rate: target.sample_rate(),
        buffer_size: target.buffer_size,
        device_name: target.device_name,
    })
}

fn is_renderable(format: SampleFormat) -> bool {
    matches!(
        format,
        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32
    )
}

/// Best output configuration for a device
///
/// Prefers f32, stereo and the target rate; falls back to any stereo
/// config we can render, then to anything renderable. If the chosen
/// range doesn't contain the target rate, its maximum rate is used.
fn best_output_config(device: &cpal::Device, target_rate: u32) -> AudioResult<SupportedStreamConfig> {
    let configs: Vec<_> = device
        .supported_output_configs()?
        .filter(|c| is_renderable(c.sample_format()))
        .collect();

    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        (c.min_sample_rate().0..=c.max_sample_rate().0).contains(&target_rate)
    };

    let best = configs
        .iter()
        .find(|&c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2 && in_range(c))
        .or_else(|| configs.iter().find(|&c| c.channels() >= 2 && in_range(c)))
        .or_else(|| configs.iter().find(|&c| c.channels() >= 2))
        .or_else(|| configs.first())
        .ok_or_else(|| AudioError::NoUsableConfig("no f32/i16/u16/i32 output configs".to_string()))?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target_rate)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (files will be resampled)",
            target_rate,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

fn build_stream<T>(device: &cpal::Device, config: &StreamConfig, half: EngineHalf) -> AudioResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let EngineHalf {
        mut engine,
        mut commands,
    } = half;

    // Only grows if the device hands us a callback larger than requested
    let mut scratch: Vec<f32> = vec![0.0; MAX_BUFFER_SIZE as usize * channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _info: &cpal::OutputCallbackInfo| {
            engine.process_commands(&mut commands);

            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let out = &mut scratch[..data.len()];
            engine.process(out, channels);

            for (dst, &src) in data.iter_mut().zip(out.iter()) {
                *dst = T::from_sample(src);
            }
        },
        move |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )?;

    Ok(stream)
}
