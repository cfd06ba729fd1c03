// Synth module - the external note-producing collaborator
// Text-protocol child process for playback, in-memory recorder for tests

pub mod message;
pub mod process;
pub mod recorder;

pub use message::SynthMessage;
pub use process::{ProcessSynth, TextSynth};
pub use recorder::RecordingSynth;

use std::time::Duration;

use thiserror::Error;

/// Playback-related errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Failed to start synth '{command}': {source}")]
    SynthUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Synth I/O error: {0}")]
    SynthIo(#[from] std::io::Error),

    #[error("Synth exited: {0}")]
    SynthExited(String),

    #[error("Playback session already stopped")]
    SessionStopped,

    #[error("Tick loop panicked")]
    TickLoopPanicked,
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;

/// Receiver of note and channel messages
///
/// Only the tick-loop thread talks to a synth, so implementations need `Send` but not `Sync`.
pub trait Synth: Send {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> PlaybackResult<()>;

    fn note_off(&mut self, channel: u8, pitch: u8) -> PlaybackResult<()>;

    fn program_change(&mut self, channel: u8, program: u8) -> PlaybackResult<()>;

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> PlaybackResult<()>;

    /// Push buffered messages out; called once per tick-loop batch
    fn flush(&mut self) -> PlaybackResult<()> {
        Ok(())
    }

    /// Shut down, waiting at most `timeout` before forcing it
    fn close(&mut self, timeout: Duration) -> PlaybackResult<()>;

    /// Dispatch a message to the matching method
    fn send(&mut self, message: &SynthMessage) -> PlaybackResult<()> {
        match *message {
            SynthMessage::NoteOn { channel, pitch, velocity } => self.note_on(channel, pitch, velocity),
            SynthMessage::NoteOff { channel, pitch } => self.note_off(channel, pitch),
            SynthMessage::ProgramChange { channel, program } => self.program_change(channel, program),
            SynthMessage::ControlChange { channel, controller, value } => {
                self.control_change(channel, controller, value)
            }
            SynthMessage::Quit => self.close(Duration::ZERO),
        }
    }
}
