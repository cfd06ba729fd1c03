// Shared helpers for the playback integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::time::{Duration, Instant};

use jamtrack::{Player, RecordingSynth, Synth, SynthMessage};

/// Send everything the player queued to the synth
pub fn deliver(player: &mut Player, synth: &mut RecordingSynth) {
    for message in player.take_outbox() {
        synth.send(&message).expect("recording synth accepts messages");
    }
}

/// Tick the player every `step` from `from` until `until`, delivering as it goes
pub fn drive(
    player: &mut Player,
    synth: &mut RecordingSynth,
    origin: Instant,
    from: Duration,
    until: Duration,
    step: Duration,
) {
    let mut elapsed = from;
    while elapsed <= until {
        player.tick(origin + elapsed);
        deliver(player, synth);
        elapsed += step;
    }
}

/// Panic if a key gets a second note-on while still sounding, or a note-off while silent
pub fn assert_well_formed(messages: &[SynthMessage]) {
    let mut sounding: HashSet<(u8, u8)> = HashSet::new();
    for (index, message) in messages.iter().enumerate() {
        match *message {
            SynthMessage::NoteOn { channel, pitch, .. } => {
                assert!(
                    sounding.insert((channel, pitch)),
                    "double note-on ch {} pitch {} at message {}",
                    channel,
                    pitch,
                    index
                );
            }
            SynthMessage::NoteOff { channel, pitch } => {
                assert!(
                    sounding.remove(&(channel, pitch)),
                    "note-off for silent ch {} pitch {} at message {}",
                    channel,
                    pitch,
                    index
                );
            }
            _ => {}
        }
    }
}

pub fn note_on_count(messages: &[SynthMessage]) -> usize {
    messages.iter().filter(|m| m.is_note_on()).count()
}
