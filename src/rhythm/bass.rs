// Bass lines - per-bar templates of chord degrees

use tracing::warn;

use crate::rhythm::swing::{self, swing_position};
use crate::sequencer::note::{Instrument, NoteEvent};
use crate::sequencer::timeline::{BEATS_PER_BAR, Tick};
use crate::track::chord::{Chord, ChordShape, timeline};
use crate::track::instruments::BassConfig;

/// Lowest bass root (E2); roots fall in E2..D#3
pub const BASS_ROOT_LOW: u8 = 40;

/// Bass pitch of a root pitch class in the E2..D#3 register
pub fn bass_root(pitch_class: u8) -> u8 {
    BASS_ROOT_LOW + (pitch_class % 12 + 12 - BASS_ROOT_LOW % 12) % 12
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Degree {
    Root,
    Third,
    Fifth,
    Sixth,
    FlatSeventh,
    /// The chord's seventh, or a sixth when it has none
    SixthOrSeventh,
    Octave,
    LowFifth,
    /// Half step below the next root, or above it when the line falls
    Approach,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    beat: f64,
    degree: Degree,
    beats: f64,
    velocity: u8,
}

const fn step(beat: f64, degree: Degree, beats: f64, velocity: u8) -> Step {
    Step { beat, degree, beats, velocity }
}

use Degree::*;

const ROOT: &[Step] = &[step(0.0, Root, 4.0, 100)];

const ROOT_FIFTH: &[Step] = &[step(0.0, Root, 2.0, 100), step(2.0, Fifth, 2.0, 90)];

const WALKING: &[Step] = &[
    step(0.0, Root, 1.0, 100),
    step(1.0, Third, 1.0, 88),
    step(2.0, Fifth, 1.0, 92),
    step(3.0, Approach, 1.0, 84),
];

const SWING_WALKING: &[Step] = &[
    step(0.0, Root, 1.0, 100),
    step(1.0, Third, 1.0, 88),
    step(2.0, Fifth, 1.0, 92),
    step(3.0, SixthOrSeventh, 0.5, 86),
    step(3.5, Approach, 0.5, 80),
];

const STRIDE: &[Step] = &[step(0.0, Root, 1.0, 100), step(2.0, LowFifth, 1.0, 92)];

const BOOGIE: &[Step] = &[
    step(0.0, Root, 0.5, 100),
    step(0.5, Third, 0.5, 84),
    step(1.0, Fifth, 0.5, 92),
    step(1.5, Sixth, 0.5, 84),
    step(2.0, FlatSeventh, 0.5, 94),
    step(2.5, Sixth, 0.5, 84),
    step(3.0, Fifth, 0.5, 92),
    step(3.5, Third, 0.5, 84),
];

const FUNK: &[Step] = &[
    step(0.0, Root, 0.5, 110),
    step(0.75, Octave, 0.25, 80),
    step(1.5, FlatSeventh, 0.5, 90),
    step(2.0, Root, 0.5, 100),
    step(2.75, Fifth, 0.25, 80),
    step(3.5, Octave, 0.5, 90),
];

const EIGHT_OH_EIGHT: &[Step] = &[
    step(0.0, Root, 1.5, 110),
    step(1.5, Root, 1.0, 96),
    step(3.0, Fifth, 1.0, 90),
];

const OCTAVE: &[Step] = &[
    step(0.0, Root, 0.5, 100),
    step(0.5, Octave, 0.5, 86),
    step(1.0, Root, 0.5, 94),
    step(1.5, Octave, 0.5, 86),
    step(2.0, Root, 0.5, 96),
    step(2.5, Octave, 0.5, 86),
    step(3.0, Root, 0.5, 94),
    step(3.5, Octave, 0.5, 86),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BassStyle {
    Root,
    RootFifth,
    Walking,
    SwingWalking,
    Stride,
    Boogie,
    Funk,
    EightOhEight,
    Octave,
}

impl BassStyle {
    pub fn from_name(name: &str) -> Option<Self> {
        let style = match name.trim().to_ascii_lowercase().as_str() {
            "root" => BassStyle::Root,
            "root_fifth" | "root-fifth" => BassStyle::RootFifth,
            "walking" | "walk" => BassStyle::Walking,
            "swing_walking" | "swing-walking" => BassStyle::SwingWalking,
            "stride" => BassStyle::Stride,
            "boogie" => BassStyle::Boogie,
            "funk" => BassStyle::Funk,
            "808" => BassStyle::EightOhEight,
            "octave" | "octaves" => BassStyle::Octave,
            _ => return None,
        };
        Some(style)
    }

    fn template(self) -> &'static [Step] {
        match self {
            BassStyle::Root => ROOT,
            BassStyle::RootFifth => ROOT_FIFTH,
            BassStyle::Walking => WALKING,
            BassStyle::SwingWalking => SWING_WALKING,
            BassStyle::Stride => STRIDE,
            BassStyle::Boogie => BOOGIE,
            BassStyle::Funk => FUNK,
            BassStyle::EightOhEight => EIGHT_OH_EIGHT,
            BassStyle::Octave => OCTAVE,
        }
    }

    pub fn default_swing(self) -> f64 {
        match self {
            BassStyle::SwingWalking | BassStyle::Boogie => swing::SHUFFLE,
            _ => swing::STRAIGHT,
        }
    }
}

fn degree_pitch(degree: Degree, shape: &ChordShape, root: u8, approach_target: Option<u8>) -> i32 {
    let root = root as i32;
    match degree {
        Root => root,
        Third => root + shape.third() as i32,
        Fifth => root + shape.fifth() as i32,
        Sixth => root + 9,
        FlatSeventh => root + 10,
        SixthOrSeventh => root + shape.sixth_or_seventh() as i32,
        Octave => root + 12,
        LowFifth => root + shape.fifth() as i32 - 12,
        Approach => match approach_target {
            Some(target) if (target as i32) < root => target as i32 + 1,
            Some(target) => target as i32 - 1,
            None => root + shape.sixth_or_seventh() as i32,
        },
    }
}

/// Generate a bass line for a progression
pub fn generate(chords: &[Chord], config: &BassConfig, ticks_per_bar: Tick) -> Vec<NoteEvent> {
    let style = BassStyle::from_name(&config.style).unwrap_or_else(|| {
        warn!("Unknown bass style '{}', using root", config.style);
        BassStyle::Root
    });
    let ratio = swing::clamp_ratio(config.swing.unwrap_or(style.default_swing()));
    let ticks_per_beat = ticks_per_bar / BEATS_PER_BAR;
    let eighth = ticks_per_beat / 2;
    let channel = Instrument::Bass.channel();

    let shapes: Vec<Option<ChordShape>> = chords.iter().map(Chord::shape).collect();
    let mut notes = Vec::new();

    for (index, start, end, _) in timeline(chords) {
        let Some(shape) = shapes[index] else {
            continue;
        };
        let root = bass_root(shape.bass);
        let next_root = shapes
            .get(index + 1)
            .copied()
            .flatten()
            .map(|next| bass_root(next.bass));

        let mut bar = start;
        while bar < end {
            let last_bar = bar + ticks_per_bar >= end;
            // Inside a long chord the walk leads back to its own root
            let target = if last_bar { next_root } else { Some(root) };

            for step in style.template() {
                let offset = (step.beat * ticks_per_beat as f64).round() as Tick;
                let grid_on = bar + offset;
                if grid_on >= end {
                    break;
                }
                let on = bar + swing_position(offset, eighth, ratio);
                let off = (grid_on + (step.beats * ticks_per_beat as f64).round() as Tick).min(end);
                if off <= on {
                    continue;
                }

                let pitch = degree_pitch(step.degree, &shape, root, target);
                notes.push(NoteEvent::new(
                    channel,
                    pitch,
                    step.velocity as i32,
                    on,
                    off - on,
                ));
            }
            bar += ticks_per_bar;
        }
    }

    notes
}
