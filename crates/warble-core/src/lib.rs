//! Warble Core - streaming pitch/tempo playback engine
//!
//! Decodes a local audio file into memory and plays it through a
//! pitch/tempo processing stage with lock-free control from the UI.

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod engine;
pub mod session;
pub mod timestretch;
pub mod types;

pub use types::*;
