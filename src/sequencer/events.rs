// Event sequencer - merges instrument notes and flattens them into on/off streams
//
// Two outputs: absolute-tick playback events for the real-time player and
// delta-encoded tracks for file export.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sequencer::note::{Instrument, NoteEvent};
use crate::sequencer::timeline::{TICKS_PER_QUARTER, Tempo, Tick};

/// A flattened note boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackEvent {
    pub tick: Tick,
    pub channel: u8,
    pub pitch: u8,
    pub velocity: u8,
    pub is_note_on: bool,
}

/// Merge per-instrument note lists into one stream sorted by start tick
///
/// Each instrument's notes are moved onto its fixed channel, then overlaps are resolved.
pub fn merge(parts: Vec<(Instrument, Vec<NoteEvent>)>) -> Vec<NoteEvent> {
    let notes: Vec<NoteEvent> = parts
        .into_iter()
        .flat_map(|(instrument, notes)| {
            let channel = instrument.channel();
            notes.into_iter().map(move |note| NoteEvent { channel, ..note })
        })
        .collect();

    resolve_overlaps(notes)
}

/// Truncate-on-overlap per (channel, pitch)
///
/// A note starting while an earlier one on the same key still sounds cuts the
/// earlier one off at its start. Notes starting on the same tick merge into one
/// (loudest velocity, longest duration). Output is stably sorted by start tick.
pub fn resolve_overlaps(mut notes: Vec<NoteEvent>) -> Vec<NoteEvent> {
    notes.sort_by_key(|note| note.start_tick);

    let mut resolved: Vec<NoteEvent> = Vec::with_capacity(notes.len());
    let mut last_on_key: HashMap<(u8, u8), usize> = HashMap::new();

    for mut note in notes {
        note.duration_ticks = note.duration_ticks.max(1);
        let key = (note.channel, note.pitch);

        if let Some(&index) = last_on_key.get(&key) {
            let previous = &mut resolved[index];
            if previous.start_tick == note.start_tick {
                previous.velocity = previous.velocity.max(note.velocity);
                previous.duration_ticks = previous.duration_ticks.max(note.duration_ticks);
                debug!(
                    "Merged duplicate note ch {} pitch {} at tick {}",
                    note.channel, note.pitch, note.start_tick
                );
                continue;
            }
            if previous.end_tick() > note.start_tick {
                debug!(
                    "Truncated note ch {} pitch {} at tick {} (was ending at {})",
                    note.channel,
                    note.pitch,
                    note.start_tick,
                    previous.end_tick()
                );
                previous.duration_ticks = note.start_tick - previous.start_tick;
            }
        }

        last_on_key.insert(key, resolved.len());
        resolved.push(note);
    }

    resolved
}

/// Flatten notes into absolute note-on/note-off events
///
/// Sorted by tick; at equal ticks note-offs come before note-ons, otherwise
/// the input order is kept.
pub fn to_playback_events(notes: &[NoteEvent]) -> Vec<PlaybackEvent> {
    let mut events = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        events.push(PlaybackEvent {
            tick: note.start_tick,
            channel: note.channel,
            pitch: note.pitch,
            velocity: note.velocity,
            is_note_on: true,
        });
        events.push(PlaybackEvent {
            tick: note.end_tick(),
            channel: note.channel,
            pitch: note.pitch,
            velocity: 0,
            is_note_on: false,
        });
    }
    events.sort_by_key(|event| (event.tick, event.is_note_on));
    events
}

/// Message carried by a delta-timed export event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExportMessage {
    Tempo { micros_per_quarter: u32 },
    TrackName { name: String },
    ProgramChange { channel: u8, program: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    EndOfTrack,
}

/// An export event with its distance in ticks from the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaEvent {
    pub delta: u64,
    #[serde(flatten)]
    pub message: ExportMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportTrack {
    pub name: String,
    pub events: Vec<DeltaEvent>,
}

/// Delta-encoded sequence: a tempo track followed by one track per instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSequence {
    pub ticks_per_quarter: u64,
    pub tracks: Vec<ExportTrack>,
}

/// Program and volume sent to an instrument channel before playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSetup {
    pub instrument: Instrument,
    pub program: u8,
    pub volume: Option<u8>,
}

/// Convert absolute events into delta form, ending with end-of-track
pub fn delta_encode(events: &[PlaybackEvent]) -> Vec<DeltaEvent> {
    let mut encoded = Vec::with_capacity(events.len() + 1);
    let mut last_tick = 0;
    for event in events {
        let message = if event.is_note_on {
            ExportMessage::NoteOn {
                channel: event.channel,
                pitch: event.pitch,
                velocity: event.velocity,
            }
        } else {
            ExportMessage::NoteOff {
                channel: event.channel,
                pitch: event.pitch,
            }
        };
        encoded.push(DeltaEvent {
            delta: event.tick - last_tick,
            message,
        });
        last_tick = event.tick;
    }
    encoded.push(DeltaEvent {
        delta: 0,
        message: ExportMessage::EndOfTrack,
    });
    encoded
}

/// Build the export form of a merged note stream
pub fn to_export(notes: &[NoteEvent], tempo: Tempo, setups: &[ChannelSetup]) -> ExportSequence {
    let mut tracks = vec![ExportTrack {
        name: "tempo".to_string(),
        events: vec![
            DeltaEvent {
                delta: 0,
                message: ExportMessage::Tempo {
                    micros_per_quarter: tempo.micros_per_quarter(),
                },
            },
            DeltaEvent {
                delta: 0,
                message: ExportMessage::EndOfTrack,
            },
        ],
    }];

    for setup in setups {
        let channel = setup.instrument.channel();
        let own: Vec<NoteEvent> = notes.iter().filter(|n| n.channel == channel).copied().collect();

        let mut events = vec![
            DeltaEvent {
                delta: 0,
                message: ExportMessage::TrackName {
                    name: setup.instrument.name().to_string(),
                },
            },
            DeltaEvent {
                delta: 0,
                message: ExportMessage::ProgramChange {
                    channel,
                    program: setup.program,
                },
            },
        ];
        if let Some(volume) = setup.volume {
            events.push(DeltaEvent {
                delta: 0,
                message: ExportMessage::ControlChange {
                    channel,
                    controller: 7,
                    value: volume.min(127),
                },
            });
        }
        events.extend(delta_encode(&to_playback_events(&own)));

        tracks.push(ExportTrack {
            name: setup.instrument.name().to_string(),
            events,
        });
    }

    ExportSequence {
        ticks_per_quarter: TICKS_PER_QUARTER,
        tracks,
    }
}
