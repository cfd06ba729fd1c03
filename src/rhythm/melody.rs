// Melody - scale-constrained random walk and fixed 12-bar blues phrasing

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use tracing::warn;

use crate::rhythm::scale::{Key, Scale};
use crate::sequencer::note::{Instrument, NoteEvent, clamp_midi};
use crate::sequencer::timeline::{BEATS_PER_BAR, Tick, bar_of};
use crate::track::chord::{Chord, timeline, total_ticks};
use crate::track::instruments::MelodyConfig;

/// Default melodic center (C5) before moving to the key root
pub const DEFAULT_BASE_NOTE: u8 = 72;

/// Soft range around the base note; the walk turns around outside it
pub const RANGE_BELOW: i32 = 5;
pub const RANGE_ABOVE: i32 = 19;

const REVERSE_PROBABILITY: f64 = 0.15;
const LEAP_PROBABILITY: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MelodyStyle {
    Walk,
    BluesHead,
    CallResponse,
}

impl MelodyStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "walk" | "random" | "improv" => Some(MelodyStyle::Walk),
            "blues_head" => Some(MelodyStyle::BluesHead),
            "call_response" => Some(MelodyStyle::CallResponse),
            _ => None,
        }
    }
}

/// Base note for a key: C5 moved to the nearest key root at or below it
pub fn base_note_for(key: Key) -> u8 {
    let offset = (DEFAULT_BASE_NOTE % 12 + 12 - key.root) % 12;
    let base = DEFAULT_BASE_NOTE - offset;
    // Stay within a fourth of C5
    if offset > 5 { base + 12 } else { base }
}

/// Generate a melody with a generator seeded from `seed`
pub fn generate_seeded(
    chords: &[Chord],
    config: &MelodyConfig,
    key: Key,
    ticks_per_bar: Tick,
    seed: u64,
) -> Vec<NoteEvent> {
    let mut rng = Pcg32::seed_from_u64(seed);
    generate(chords, config, key, ticks_per_bar, &mut rng)
}

/// Generate a melody line using the injected random source
pub fn generate<R: Rng + ?Sized>(
    chords: &[Chord],
    config: &MelodyConfig,
    key: Key,
    ticks_per_bar: Tick,
    rng: &mut R,
) -> Vec<NoteEvent> {
    let style = MelodyStyle::from_name(&config.style).unwrap_or_else(|| {
        warn!("Unknown melody style '{}', using walk", config.style);
        MelodyStyle::Walk
    });

    let scale = match config.scale.as_deref() {
        Some(name) => Scale::from_name(name).unwrap_or_else(|| {
            warn!("Unknown scale '{}', using the key default", name);
            key.default_scale()
        }),
        None => key.default_scale(),
    };
    let base = config.base_note.unwrap_or_else(|| base_note_for(key));

    match style {
        MelodyStyle::Walk => {
            let density = if config.density.is_finite() {
                config.density.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut walker = Walker {
                key,
                scale,
                base,
                current: scale.snap_down(key.root, base),
                direction: 1,
            };
            walker.run(chords, density, ticks_per_bar, rng)
        }
        MelodyStyle::BluesHead => phrase_melody(chords, key, base, ticks_per_bar, false),
        MelodyStyle::CallResponse => phrase_melody(chords, key, base, ticks_per_bar, true),
    }
}

struct Walker {
    key: Key,
    scale: Scale,
    base: u8,
    current: u8,
    direction: i32,
}

impl Walker {
    fn run<R: Rng + ?Sized>(
        &mut self,
        chords: &[Chord],
        density: f64,
        ticks_per_bar: Tick,
        rng: &mut R,
    ) -> Vec<NoteEvent> {
        let eighth = ticks_per_bar / (BEATS_PER_BAR * 2);
        let half_bar = ticks_per_bar / 2;
        let channel = Instrument::Melody.channel();
        let mut notes = Vec::new();

        for (_, start, end, chord) in timeline(chords) {
            let tones = chord.shape().map(|s| s.pitch_classes()).unwrap_or_default();

            let mut tick = start;
            while tick < end {
                // Beats 1 and 3
                let strong = tick % half_bar == 0;

                let sounding = if strong {
                    if !tones.is_empty() {
                        self.current = nearest_chord_tone(self.current, &tones, self.direction);
                    }
                    true
                } else {
                    self.advance(rng);
                    rng.random_bool(density)
                };
                self.reflect();

                if sounding {
                    let accent = if strong { 10 } else { 0 };
                    let velocity = 80 + accent + rng.random_range(-8..=8);
                    let release = rng.random_range(10..=60);
                    let off = (tick + eighth).min(end);
                    let duration = off.saturating_sub(tick + release).max(eighth / 4).min(off - tick);
                    notes.push(NoteEvent::new(channel, self.current as i32, velocity, tick, duration));
                }

                tick += eighth;
            }
        }

        notes
    }

    /// One weak-step move: maybe turn around, maybe leap, then step along the scale
    fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if rng.random_bool(REVERSE_PROBABILITY) {
            self.direction = -self.direction;
        }
        // Outside the range the walk always heads back in
        self.reflect();
        let steps = if rng.random_bool(LEAP_PROBABILITY) {
            rng.random_range(2..=3)
        } else {
            1
        };
        self.current = self.scale.step(self.key.root, self.current, steps * self.direction);
    }

    fn reflect(&mut self) {
        let current = self.current as i32;
        let base = self.base as i32;
        if current > base + RANGE_ABOVE {
            self.direction = -1;
        } else if current < base - RANGE_BELOW {
            self.direction = 1;
        }
    }
}

/// Closest pitch within two octaves whose pitch class is a chord tone
///
/// Ties prefer the current direction of travel.
pub fn nearest_chord_tone(current: u8, tones: &[u8], direction: i32) -> u8 {
    let current = current as i32;
    let mut best: Option<(i32, i32)> = None;

    for candidate in (current - 24).max(0)..=(current + 24).min(127) {
        if !tones.contains(&((candidate % 12) as u8)) {
            continue;
        }
        let distance = (candidate - current).abs();
        let better = match best {
            None => true,
            Some((best_pitch, best_distance)) => {
                distance < best_distance
                    || (distance == best_distance
                        && (candidate - best_pitch).signum() == direction.signum())
            }
        };
        if better {
            best = Some((candidate, distance));
        }
    }

    best.map(|(pitch, _)| pitch as u8).unwrap_or(current as u8)
}

/// (beat, semitones from the key root, length in beats)
type Phrase = &'static [(f64, i32, f64)];

const CALL: Phrase = &[
    (0.0, 0, 0.5),
    (0.5, 3, 0.5),
    (1.0, 5, 0.5),
    (1.5, 6, 0.5),
    (2.0, 7, 1.5),
    (3.5, 5, 0.5),
];
const CALL_TAIL: Phrase = &[(0.0, 3, 1.0), (1.0, 0, 2.0)];
const RESPONSE: Phrase = &[
    (0.5, 10, 0.5),
    (1.0, 7, 0.5),
    (1.5, 5, 0.5),
    (2.0, 3, 1.0),
    (3.0, 0, 1.0),
];
const RESPONSE_TAIL: Phrase = &[(0.0, -2, 1.0), (1.0, 0, 2.0)];
const SPACE: Phrase = &[(0.0, 0, 3.0)];
const RESOLUTION: Phrase = &[
    (0.0, 7, 1.0),
    (1.0, 5, 0.5),
    (1.5, 3, 0.5),
    (2.0, 5, 1.0),
    (3.0, 3, 0.5),
    (3.5, 0, 0.5),
];
const RESOLUTION_TAIL: Phrase = &[(0.0, 0, 3.0)];
const TURNAROUND: Phrase = &[
    (0.0, 12, 0.5),
    (0.5, 10, 0.5),
    (1.0, 9, 0.5),
    (1.5, 8, 0.5),
    (2.0, 7, 2.0),
];
const TURNAROUND_TAIL: Phrase = &[(0.0, 7, 1.0), (1.0, 6, 0.5), (1.5, 5, 0.5), (2.0, 7, 2.0)];

/// Phrase for a bar of the 12-bar form (AAB: call, repeat, resolution, turnaround)
fn phrase_for_bar(bar: u64, with_response: bool) -> Phrase {
    match bar % 12 {
        0 | 4 => CALL,
        1 | 5 => CALL_TAIL,
        2 | 6 if with_response => RESPONSE,
        3 | 7 if with_response => RESPONSE_TAIL,
        2 | 6 => SPACE,
        3 | 7 => &[],
        8 => RESOLUTION,
        9 => RESOLUTION_TAIL,
        10 => TURNAROUND,
        _ => TURNAROUND_TAIL,
    }
}

fn phrase_melody(
    chords: &[Chord],
    key: Key,
    base: u8,
    ticks_per_bar: Tick,
    with_response: bool,
) -> Vec<NoteEvent> {
    let total = total_ticks(chords);
    let ticks_per_beat = (ticks_per_bar / BEATS_PER_BAR) as f64;
    let channel = Instrument::Melody.channel();
    // Key root at or below the base note
    let root = base as i32 - (base as i32 - key.root as i32).rem_euclid(12);

    let mut notes = Vec::new();
    let mut bar_start = 0;
    while bar_start < total {
        let phrase = phrase_for_bar(bar_of(bar_start), with_response);
        for &(beat, semitones, beats) in phrase {
            let on = bar_start + (beat * ticks_per_beat).round() as Tick;
            if on >= total {
                continue;
            }
            let off = (on + (beats * ticks_per_beat).round() as Tick).min(total);
            let velocity = if beat == 0.0 { 96 } else { 86 };
            notes.push(NoteEvent::new(
                channel,
                clamp_midi(root + semitones) as i32,
                velocity,
                on,
                off - on,
            ));
        }
        bar_start += ticks_per_bar;
    }

    notes
}
