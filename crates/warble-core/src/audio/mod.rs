//! Audio output via CPAL
//!
//! The audio thread owns the [`AudioEngine`](crate::engine::AudioEngine)
//! exclusively; the UI talks to it through the lock-free queues and
//! atomics of [`Transport`](crate::engine::Transport).
//!
//! ```ignore
//! use warble_core::audio::{open_output, start_stream, AudioConfig};
//! use warble_core::engine::{PlayerParams, Transport};
//!
//! let config = AudioConfig::default();
//! let target = open_output(&config)?;
//! let buffer = Arc::new(DecodedBuffer::open(path)?.resampled(target.sample_rate())?);
//!
//! let (half, mut transport) = Transport::build(buffer, config.stage, PlayerParams::default());
//! let handle = start_stream(target, half)?;
//!
//! transport.play();
//! transport.set_tempo(1.25);
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use cpal_backend::{describe_output, open_output, output_sample_rate, start_stream, AudioHandle, OutputTarget};
pub use device::{default_device, find_device, select_device};
pub use error::{AudioError, AudioResult};
