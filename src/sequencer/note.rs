// Note representation for the sequencer
// A note is a MIDI event with channel, pitch, start tick, duration and velocity

use serde::{Deserialize, Serialize};

use crate::sequencer::timeline::Tick;

/// MIDI channel reserved for General MIDI percussion
pub const PERCUSSION_CHANNEL: u8 = 9;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Clamp any integer into the MIDI data range 0..=127
pub fn clamp_midi(value: i32) -> u8 {
    value.clamp(0, 127) as u8
}

/// Note name for a MIDI pitch (e.g., "C4", "A#5")
pub fn pitch_name(pitch: u8) -> String {
    let octave = (pitch / 12) as i32 - 1;
    format!("{}{}", NOTE_NAMES[(pitch % 12) as usize], octave)
}

/// The four tracks of a backing arrangement
///
/// The declaration order is also the track index used for muting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    Chords,
    Bass,
    Drums,
    Melody,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Chords,
        Instrument::Bass,
        Instrument::Drums,
        Instrument::Melody,
    ];

    /// Track index (0..4) used by mute controls
    pub fn index(self) -> usize {
        match self {
            Instrument::Chords => 0,
            Instrument::Bass => 1,
            Instrument::Drums => 2,
            Instrument::Melody => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Fixed logical MIDI channel
    pub fn channel(self) -> u8 {
        match self {
            Instrument::Chords => 0,
            Instrument::Bass => 1,
            Instrument::Melody => 2,
            Instrument::Drums => PERCUSSION_CHANNEL,
        }
    }

    pub fn from_channel(channel: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.channel() == channel)
    }

    pub fn name(self) -> &'static str {
        match self {
            Instrument::Chords => "chords",
            Instrument::Bass => "bass",
            Instrument::Drums => "drums",
            Instrument::Melody => "melody",
        }
    }

    pub fn is_percussion(self) -> bool {
        self.channel() == PERCUSSION_CHANNEL
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A note produced by a pattern generator
///
/// Pitch and velocity are always in MIDI range; duration is at least one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI channel (0-15)
    pub channel: u8,

    /// MIDI note number (0-127, where 60 = C4)
    pub pitch: u8,

    /// MIDI velocity (0-127)
    pub velocity: u8,

    /// Absolute start position
    pub start_tick: Tick,

    /// Length in ticks (>= 1)
    pub duration_ticks: Tick,
}

impl NoteEvent {
    /// Creates a new note, clamping pitch and velocity and forcing a positive duration
    pub fn new(channel: u8, pitch: i32, velocity: i32, start_tick: Tick, duration_ticks: Tick) -> Self {
        Self {
            channel,
            pitch: clamp_midi(pitch),
            velocity: clamp_midi(velocity),
            start_tick,
            duration_ticks: duration_ticks.max(1),
        }
    }

    /// Get the end position of this note (exclusive)
    pub fn end_tick(&self) -> Tick {
        self.start_tick + self.duration_ticks
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        pitch_name(self.pitch)
    }
}
