// Synth messages and their text protocol lines

use std::fmt;

/// A command sent to the synthesizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthMessage {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ProgramChange { channel: u8, program: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    Quit,
}

impl SynthMessage {
    pub fn is_note_on(&self) -> bool {
        matches!(self, SynthMessage::NoteOn { .. })
    }
}

impl fmt::Display for SynthMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthMessage::NoteOn { channel, pitch, velocity } => {
                write!(f, "noteon {} {} {}", channel, pitch, velocity)
            }
            SynthMessage::NoteOff { channel, pitch } => write!(f, "noteoff {} {}", channel, pitch),
            SynthMessage::ProgramChange { channel, program } => {
                write!(f, "prog {} {}", channel, program)
            }
            SynthMessage::ControlChange { channel, controller, value } => {
                write!(f, "cc {} {} {}", channel, controller, value)
            }
            SynthMessage::Quit => f.write_str("quit"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let on = SynthMessage::NoteOn { channel: 0, pitch: 60, velocity: 100 };
        assert_eq!(on.to_string(), "noteon 0 60 100");
        assert_eq!(SynthMessage::NoteOff { channel: 9, pitch: 36 }.to_string(), "noteoff 9 36");
        assert_eq!(
            SynthMessage::ProgramChange { channel: 1, program: 33 }.to_string(),
            "prog 1 33"
        );
        assert_eq!(
            SynthMessage::ControlChange { channel: 2, controller: 7, value: 90 }.to_string(),
            "cc 2 7 90"
        );
        assert_eq!(SynthMessage::Quit.to_string(), "quit");
    }
}
