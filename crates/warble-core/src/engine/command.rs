//! Lock-free queues between the UI thread and the audio thread
//!
//! Discrete actions (play, pause, seek) travel UI → audio as
//! [`EngineCommand`]s and are applied at the start of the next output
//! block. Notifications travel audio → UI as [`PlayerEvent`]s and are
//! drained by the UI on its periodic tick.
//!
//! Both directions use `rtrb` single-producer single-consumer ringbuffers:
//! fixed-size, wait-free, no allocation after construction.

/// Commands sent from UI thread to audio thread
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Attach the driver (Stopped → Running)
    Play,
    /// Detach the driver (Running → Stopped)
    Pause,
    /// Overwrite the source cursor, in frames
    Seek { frame: usize },
}

/// Notifications sent from audio thread to UI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The stage returned no frames for a block
    ///
    /// Re-emitted on every block while the driver stays attached to an
    /// exhausted stage.
    Stop,
}

/// Command queue capacity
///
/// Slider drags can emit a seek per UI frame; 256 leaves ample headroom
/// even with the 8192-frame output block.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Event queue capacity
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Create a new command channel (producer: UI thread, consumer: audio thread)
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Create a new event channel (producer: audio thread, consumer: UI thread)
pub fn event_channel() -> (rtrb::Producer<PlayerEvent>, rtrb::Consumer<PlayerEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}

/// Command sender for the UI thread
///
/// Wraps the lock-free producer. All operations are non-blocking.
pub struct CommandSender {
    pub(crate) producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Queue a command for the audio thread
    ///
    /// Returns `Err(cmd)` if the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }
}
