//! Playback engine
//!
//! - Frame source: pull interface over the decoded buffer
//! - Playback driver: output callback → stage, Stop on exhaustion
//! - AudioEngine: driver plus command/parameter application (audio thread)
//! - Transport: play/pause/seek and parameter setters (UI thread)
//! - Lock-free command/event queues and atomics between the two threads

mod atomics;
mod command;
mod driver;
mod engine;
mod source;
mod transport;

pub use atomics::*;
pub use command::*;
pub use driver::*;
pub use engine::*;
pub use source::*;
pub use transport::*;
