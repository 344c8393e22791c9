//! Application messages for warble-player

use std::path::PathBuf;

use warble_core::session::PreparedFile;

/// Messages that can be sent to the application
#[derive(Debug, Clone)]
pub enum Message {
    /// Fast tick: drain audio-thread events
    Tick,
    /// Slow tick while playing: move the seek slider and elapsed time
    Poll,

    // File loading
    /// Open the native file picker
    OpenFile,
    /// File picker closed (None = cancelled)
    FileChosen(Option<PathBuf>),
    /// Decode a file in the background
    LoadFile(PathBuf),
    /// Background decode finished
    FileLoaded(Result<PreparedFile, String>),

    // Transport
    Play,
    Pause,
    /// Seek slider moved (fraction 0.0-1.0), seeks right away
    SeekChanged(f64),
    /// Seek slider released: resume following playback
    SeekReleased,
    SetPitch(f64),
    SetTempo(f64),
    SetVolume(f64),

    // Persistence
    /// A parameter slider was released: remember its value on disk
    PersistParams,
    /// Background config save finished
    ParamsSaved(Result<(), String>),
}
