// jamtrack - Library exports for the CLI, tests and benchmarks

pub mod config;
pub mod messaging;
pub mod rhythm;
pub mod sequencer;
pub mod synth;
pub mod track;

// Re-export commonly used types for convenience
pub use config::{ConfigError, EngineConfig};
pub use messaging::{Command, Notification, create_command_channel, create_notification_channel};
pub use rhythm::{EuclideanSpec, Key, Scale, euclidean};
pub use sequencer::{
    Arrangement, Clock, Instrument, ManualClock, MusicalTime, NoteEvent, PlaybackEvent,
    PlaybackSession, PlaybackState, Player, SessionOptions, SystemClock, Tempo, Tick,
    Transport, TransportState,
};
pub use synth::{PlaybackError, PlaybackResult, ProcessSynth, RecordingSynth, Synth, SynthMessage};
pub use track::{Chord, Track, TrackError, TrackResult};
