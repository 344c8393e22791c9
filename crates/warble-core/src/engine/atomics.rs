//! Lock-free state shared between the UI thread and the audio thread
//!
//! Every field has exactly one writer:
//!
//! | Field                      | Writer      | Reader      |
//! |----------------------------|-------------|-------------|
//! | pitch / tempo / volume     | UI thread   | audio thread |
//! | elapsed / position         | frame source (audio thread) | UI thread |
//! | source_position / state    | engine (audio thread) | UI thread |
//!
//! Floats are stored as their bit patterns in `AtomicU64`, so a read never
//! observes a torn value. All accesses are `Relaxed`: the audio thread
//! picks up a parameter change at the start of the next block at the
//! latest, and the UI only uses what it reads for display.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::types::PlayState;

/// Default output gain
pub const DEFAULT_VOLUME: f64 = 0.5;

#[inline]
fn load_f64(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Relaxed))
}

#[inline]
fn store_f64(cell: &AtomicU64, value: f64) {
    cell.store(value.to_bits(), Ordering::Relaxed);
}

/// Atomic player state for lock-free UI/audio exchange
#[derive(Debug)]
pub struct PlayerAtomics {
    pitch: AtomicU64,
    tempo: AtomicU64,
    volume: AtomicU64,
    /// Seconds elapsed, published by the frame source on every extract
    elapsed: AtomicU64,
    /// Frame source cursor at the start of the last extract
    position: AtomicU64,
    /// Source cursor as reported by the processing stage after the last block
    source_position: AtomicU64,
    /// Driver state: 0=Stopped, 1=Running
    state: AtomicU8,
}

impl PlayerAtomics {
    pub fn new() -> Self {
        Self {
            pitch: AtomicU64::new(1.0f64.to_bits()),
            tempo: AtomicU64::new(1.0f64.to_bits()),
            volume: AtomicU64::new(DEFAULT_VOLUME.to_bits()),
            elapsed: AtomicU64::new(0.0f64.to_bits()),
            position: AtomicU64::new(0),
            source_position: AtomicU64::new(0),
            state: AtomicU8::new(PlayState::Stopped.to_u8()),
        }
    }

    #[inline]
    pub fn pitch(&self) -> f64 {
        load_f64(&self.pitch)
    }

    #[inline]
    pub fn set_pitch(&self, pitch: f64) {
        store_f64(&self.pitch, pitch);
    }

    #[inline]
    pub fn tempo(&self) -> f64 {
        load_f64(&self.tempo)
    }

    #[inline]
    pub fn set_tempo(&self, tempo: f64) {
        store_f64(&self.tempo, tempo);
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        load_f64(&self.volume)
    }

    #[inline]
    pub fn set_volume(&self, volume: f64) {
        store_f64(&self.volume, volume);
    }

    /// Last position published by the frame source, in seconds
    #[inline]
    pub fn elapsed_seconds(&self) -> f64 {
        load_f64(&self.elapsed)
    }

    /// Last position published by the frame source, in frames
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Publish a position update (called by the frame source)
    #[inline]
    pub fn publish_position(&self, frame: usize, sample_rate: u32) {
        self.position.store(frame as u64, Ordering::Relaxed);
        store_f64(&self.elapsed, frame as f64 / sample_rate as f64);
    }

    /// Source cursor reported by the processing stage
    #[inline]
    pub fn source_position(&self) -> u64 {
        self.source_position.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn set_source_position(&self, frame: usize) {
        self.source_position.store(frame as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn set_play_state(&self, state: PlayState) {
        self.state.store(state.to_u8(), Ordering::Relaxed);
    }
}

impl Default for PlayerAtomics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let atomics = PlayerAtomics::new();
        assert_eq!(atomics.pitch(), 1.0);
        assert_eq!(atomics.tempo(), 1.0);
        assert_eq!(atomics.volume(), DEFAULT_VOLUME);
        assert_eq!(atomics.play_state(), PlayState::Stopped);
    }

    #[test]
    fn test_float_round_trip_is_exact() {
        let atomics = PlayerAtomics::new();
        atomics.set_pitch(1.0594630943592953);
        atomics.set_tempo(-0.0);
        assert_eq!(atomics.pitch(), 1.0594630943592953);
        assert!(atomics.tempo().is_sign_negative());
    }

    #[test]
    fn test_publish_position_converts_to_seconds() {
        let atomics = PlayerAtomics::new();
        atomics.publish_position(96000, 48000);
        assert_eq!(atomics.position(), 96000);
        assert_eq!(atomics.elapsed_seconds(), 2.0);
    }
}
