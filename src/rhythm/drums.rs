// Drums - preset grooves and explicit per-voice patterns on GM channel 10

use tracing::warn;

use crate::sequencer::note::{Instrument, NoteEvent};
use crate::sequencer::timeline::{BEATS_PER_BAR, Tick};
use crate::track::chord::{Chord, total_ticks};
use crate::track::instruments::{DrumConfig, VoicePattern};

/// General MIDI percussion key numbers
pub mod gm {
    pub const KICK: u8 = 36;
    pub const SIDE_STICK: u8 = 37;
    pub const SNARE: u8 = 38;
    pub const CLOSED_HAT: u8 = 42;
    pub const PEDAL_HAT: u8 = 44;
    pub const OPEN_HAT: u8 = 46;
    pub const CRASH: u8 = 49;
    pub const RIDE: u8 = 51;
}

/// Base velocity scaled by intensity for explicit voices
pub const BASE_VELOCITY: f64 = 100.0;

/// Length of every drum hit
pub const HIT_TICKS: Tick = 60;

/// One voice of a groove: a GM key and (beat offset, velocity) hits
type Lane = (u8, &'static [(f64, u8)]);

const EIGHTH_HATS: &[(f64, u8)] = &[
    (0.0, 90),
    (0.5, 65),
    (1.0, 85),
    (1.5, 65),
    (2.0, 90),
    (2.5, 65),
    (3.0, 85),
    (3.5, 65),
];

const BACKBEAT: &[(f64, u8)] = &[(1.0, 110), (3.0, 110)];

const ROCK: &[Lane] = &[
    (gm::KICK, &[(0.0, 110), (2.0, 105), (2.5, 90)]),
    (gm::SNARE, BACKBEAT),
    (gm::CLOSED_HAT, EIGHTH_HATS),
];

const POP: &[Lane] = &[
    (gm::KICK, &[(0.0, 110), (1.5, 90), (2.0, 105)]),
    (gm::SNARE, BACKBEAT),
    (gm::CLOSED_HAT, EIGHTH_HATS),
];

const FUNK: &[Lane] = &[
    (gm::KICK, &[(0.0, 115), (0.75, 85), (2.5, 100)]),
    (gm::SNARE, &[(1.0, 110), (1.75, 45), (3.0, 110), (3.75, 50)]),
    (
        gm::CLOSED_HAT,
        &[
            (0.0, 90),
            (0.25, 55),
            (0.5, 75),
            (0.75, 55),
            (1.0, 90),
            (1.25, 55),
            (1.5, 75),
            (1.75, 55),
            (2.0, 90),
            (2.25, 55),
            (2.5, 75),
            (2.75, 55),
            (3.0, 90),
            (3.25, 55),
            (3.5, 75),
        ],
    ),
    (gm::OPEN_HAT, &[(3.75, 80)]),
];

const JAZZ: &[Lane] = &[
    (gm::RIDE, &[(0.0, 85), (1.0, 90), (1.67, 65), (2.0, 85), (3.0, 90), (3.67, 65)]),
    (gm::PEDAL_HAT, &[(1.0, 70), (3.0, 70)]),
    (gm::KICK, &[(0.0, 45), (1.0, 40), (2.0, 45), (3.0, 40)]),
];

const SHUFFLE: &[Lane] = &[
    (gm::KICK, &[(0.0, 110), (2.0, 105)]),
    (gm::SNARE, BACKBEAT),
    (
        gm::CLOSED_HAT,
        &[
            (0.0, 90),
            (0.67, 65),
            (1.0, 85),
            (1.67, 65),
            (2.0, 90),
            (2.67, 65),
            (3.0, 85),
            (3.67, 65),
        ],
    ),
];

const BOSSA: &[Lane] = &[
    (gm::KICK, &[(0.0, 90), (1.5, 70), (2.0, 90), (3.5, 70)]),
    (gm::SIDE_STICK, &[(0.0, 80), (0.75, 70), (1.5, 75), (2.5, 80), (3.25, 70)]),
    (gm::CLOSED_HAT, EIGHTH_HATS),
];

const FOUR_ON_FLOOR: &[Lane] = &[
    (gm::KICK, &[(0.0, 115), (1.0, 110), (2.0, 115), (3.0, 110)]),
    (gm::SNARE, BACKBEAT),
    (gm::OPEN_HAT, &[(0.5, 85), (1.5, 85), (2.5, 85), (3.5, 85)]),
];

const HALF_TIME: &[Lane] = &[
    (gm::KICK, &[(0.0, 110), (1.75, 80)]),
    (gm::SNARE, &[(2.0, 115)]),
    (gm::CLOSED_HAT, EIGHTH_HATS),
];

/// Preset groove by name
fn preset(name: &str) -> Option<&'static [Lane]> {
    let lanes = match name.trim().to_ascii_lowercase().as_str() {
        "rock" => ROCK,
        "pop" => POP,
        "funk" => FUNK,
        "jazz" => JAZZ,
        "shuffle" => SHUFFLE,
        "bossa" | "bossa_nova" => BOSSA,
        "four_on_floor" | "disco" => FOUR_ON_FLOOR,
        "half_time" => HALF_TIME,
        _ => return None,
    };
    Some(lanes)
}

/// Tick offsets within a bar for an explicit voice pattern
pub fn voice_offsets(pattern: &VoicePattern, ticks_per_bar: Tick) -> Vec<Tick> {
    match pattern {
        VoicePattern::Euclid(spec) => spec.onsets(ticks_per_bar),
        VoicePattern::Beats(beats) => {
            let ticks_per_beat = ticks_per_bar as f64 / BEATS_PER_BAR as f64;
            let mut offsets: Vec<Tick> = beats
                .iter()
                .filter(|beat| beat.is_finite() && **beat >= 1.0 && **beat < BEATS_PER_BAR as f64 + 1.0)
                .map(|beat| ((beat - 1.0) * ticks_per_beat).round() as Tick)
                .filter(|offset| *offset < ticks_per_bar)
                .collect();
            offsets.sort_unstable();
            offsets.dedup();
            offsets
        }
    }
}

fn scale_velocity(velocity: f64, intensity: f64) -> i32 {
    (velocity * intensity).round() as i32
}

/// Generate drum hits covering the whole progression
pub fn generate(chords: &[Chord], config: &DrumConfig, ticks_per_bar: Tick) -> Vec<NoteEvent> {
    let total = total_ticks(chords);
    let intensity = if config.intensity.is_finite() {
        config.intensity.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let ticks_per_beat = ticks_per_bar as f64 / BEATS_PER_BAR as f64;

    // (key, offset within bar, unscaled velocity)
    let mut hits: Vec<(u8, Tick, f64)> = Vec::new();

    let explicit = [
        (gm::KICK, &config.kick),
        (gm::SNARE, &config.snare),
        (gm::CLOSED_HAT, &config.hihat),
        (gm::RIDE, &config.ride),
    ];

    if let Some(name) = &config.style {
        match preset(name) {
            Some(lanes) => {
                for &(key, lane) in lanes {
                    let overridden = explicit.iter().any(|(k, p)| *k == key && p.is_some());
                    if overridden {
                        continue;
                    }
                    for &(beat, velocity) in lane {
                        let offset = (beat * ticks_per_beat).round() as Tick;
                        hits.push((key, offset, velocity as f64));
                    }
                }
            }
            None => warn!("Unknown drum style '{}'", name),
        }
    }

    for (key, pattern) in explicit {
        if let Some(pattern) = pattern {
            for offset in voice_offsets(pattern, ticks_per_bar) {
                hits.push((key, offset, BASE_VELOCITY));
            }
        }
    }

    let channel = Instrument::Drums.channel();
    let mut notes = Vec::new();

    if config.crash_on_start && total > 0 {
        let velocity = scale_velocity(BASE_VELOCITY, intensity);
        if velocity > 0 {
            notes.push(NoteEvent::new(channel, gm::CRASH as i32, velocity, 0, HIT_TICKS.min(total)));
        }
    }

    let mut bar = 0;
    while bar < total {
        for &(key, offset, velocity) in &hits {
            let on = bar + offset;
            if on >= total {
                continue;
            }
            let velocity = scale_velocity(velocity, intensity);
            if velocity == 0 {
                continue;
            }
            let duration = HIT_TICKS.min(total - on);
            notes.push(NoteEvent::new(channel, key as i32, velocity, on, duration));
        }
        bar += ticks_per_bar;
    }

    notes.sort_by_key(|note| note.start_tick);
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::euclidean::EuclideanSpec;
    use crate::track::chord::expand_pattern;

    fn explicit_only() -> DrumConfig {
        DrumConfig {
            style: None,
            crash_on_start: false,
            ..DrumConfig::default()
        }
    }

    fn hits_of(notes: &[NoteEvent], key: u8) -> Vec<Tick> {
        notes.iter().filter(|n| n.pitch == key).map(|n| n.start_tick).collect()
    }

    #[test]
    fn test_rock_preset() {
        let chords = expand_pattern("E A", 1.0, 1);
        let notes = generate(&chords, &DrumConfig::default(), 1920);

        assert_eq!(hits_of(&notes, gm::SNARE), vec![480, 1440, 2400, 3360]);
        assert_eq!(hits_of(&notes, gm::KICK), vec![0, 960, 1200, 1920, 2880, 3120]);
        assert_eq!(hits_of(&notes, gm::CLOSED_HAT).len(), 16);
        assert_eq!(hits_of(&notes, gm::CRASH), vec![0]);
        assert!(notes.iter().all(|n| n.channel == 9));
    }

    #[test]
    fn test_euclidean_voice() {
        let config = DrumConfig {
            kick: Some(VoicePattern::Euclid(EuclideanSpec::new(3, 8, 0))),
            ..explicit_only()
        };
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config, 1920);

        assert_eq!(hits_of(&notes, gm::KICK), vec![0, 720, 1440]);
        assert!(notes.iter().all(|n| n.velocity == 100));
    }

    #[test]
    fn test_beat_list_voice() {
        let config = DrumConfig {
            snare: Some(VoicePattern::Beats(vec![2.0, 4.0, 2.5, 0.5, 5.0])),
            intensity: 0.5,
            ..explicit_only()
        };
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config, 1920);

        assert_eq!(hits_of(&notes, gm::SNARE), vec![480, 720, 1440]);
        assert!(notes.iter().all(|n| n.velocity == 50));
    }

    #[test]
    fn test_explicit_voice_overrides_preset() {
        let config = DrumConfig {
            kick: Some(VoicePattern::Beats(vec![1.0])),
            crash_on_start: false,
            ..DrumConfig::default()
        };
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config, 1920);

        assert_eq!(hits_of(&notes, gm::KICK), vec![0]);
        assert_eq!(hits_of(&notes, gm::SNARE), vec![480, 1440]);
    }

    #[test]
    fn test_clipped_to_progression() {
        let chords = expand_pattern("C*0.5", 1.0, 1);
        let notes = generate(&chords, &DrumConfig::default(), 1920);
        assert!(notes.iter().all(|n| n.end_tick() <= 960));
        assert_eq!(hits_of(&notes, gm::SNARE), vec![480]);
    }

    #[test]
    fn test_zero_intensity_is_silent() {
        let config = DrumConfig {
            intensity: 0.0,
            ..DrumConfig::default()
        };
        let chords = expand_pattern("C", 1.0, 1);
        assert!(generate(&chords, &config, 1920).is_empty());
    }
}
