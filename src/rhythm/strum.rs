// Chord rhythm - block chords and strum-notation patterns
//
// Strum notation, one symbol per subdivision of the bar:
//   D  down stroke, accented      d  down stroke, soft
//   U  up stroke, accented        u  up stroke, soft
//   x  muted chuck (short)        .  rest
//   -  sustain the previous hit
// Any other character is a rest. The pattern length sets the subdivision.

use tracing::warn;

use crate::rhythm::swing::{self, swing_offset};
use crate::sequencer::note::{Instrument, NoteEvent};
use crate::sequencer::timeline::Tick;
use crate::track::chord::{Chord, timeline};
use crate::track::instruments::RhythmConfig;

/// Block chords release this many ticks before the next hit
pub const NOTE_GAP_TICKS: Tick = 10;

/// Delay between successive strings of a strum
pub const STRUM_DELAY_TICKS: Tick = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stroke {
    Down,
    SoftDown,
    Up,
    SoftUp,
    Mute,
    Rest,
    Sustain,
}

impl Stroke {
    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            'D' => Stroke::Down,
            'd' => Stroke::SoftDown,
            'U' => Stroke::Up,
            'u' => Stroke::SoftUp,
            'x' | 'X' => Stroke::Mute,
            '-' => Stroke::Sustain,
            _ => Stroke::Rest,
        }
    }

    /// Velocity tier, `None` for strokes that do not sound
    pub fn velocity(self) -> Option<u8> {
        match self {
            Stroke::Down => Some(100),
            Stroke::SoftDown => Some(70),
            Stroke::Up => Some(90),
            Stroke::SoftUp => Some(60),
            Stroke::Mute => Some(50),
            Stroke::Rest | Stroke::Sustain => None,
        }
    }

    /// Up strokes play the voicing from the top string down
    pub fn is_up(self) -> bool {
        matches!(self, Stroke::Up | Stroke::SoftUp)
    }
}

/// Parse strum notation into strokes
pub fn parse_strum(pattern: &str) -> Vec<Stroke> {
    pattern.trim().chars().map(Stroke::from_symbol).collect()
}

fn is_strum_notation(text: &str) -> bool {
    text.chars().any(|c| Stroke::from_symbol(c).velocity().is_some())
}

/// How a chord is articulated within each bar
#[derive(Debug, Clone, PartialEq)]
pub enum RhythmStyle {
    /// Evenly spaced block chords
    Block { hits_per_bar: u32 },
    /// Strum notation repeated every bar
    Strum(Vec<Stroke>),
}

impl RhythmStyle {
    /// Built-in style by name, with its default swing ratio
    pub fn named(name: &str) -> Option<(Self, f64)> {
        let strum = |pattern: &str| RhythmStyle::Strum(parse_strum(pattern));
        let style = match name.trim().to_ascii_lowercase().as_str() {
            "whole" => (RhythmStyle::Block { hits_per_bar: 1 }, swing::STRAIGHT),
            "half" => (RhythmStyle::Block { hits_per_bar: 2 }, swing::STRAIGHT),
            "quarter" => (RhythmStyle::Block { hits_per_bar: 4 }, swing::STRAIGHT),
            "eighth" => (RhythmStyle::Block { hits_per_bar: 8 }, swing::STRAIGHT),
            "strum" => (strum("D.DU.UDU"), swing::STRAIGHT),
            "folk" => (strum("D.D.DUDU"), swing::STRAIGHT),
            "shuffle" => (strum("DUDUDUDU"), swing::SHUFFLE),
            "ballad" => (strum("D..dD.du"), swing::STRAIGHT),
            "reggae" => (strum(".x.x.x.x"), swing::STRAIGHT),
            "funk" => (strum("D.xUx.DUx.DUx.Du"), swing::STRAIGHT),
            "pop" => (strum("D.DUDUDU"), swing::STRAIGHT),
            _ => return None,
        };
        Some(style)
    }

    /// Resolve the style and swing ratio for a rhythm config
    ///
    /// A literal `pattern` wins over `style`. Unknown style names are read as
    /// strum notation when they contain a sounding symbol, otherwise whole-bar chords.
    pub fn from_config(config: &RhythmConfig) -> (Self, f64) {
        let (style, default_swing) = match config.pattern.as_deref() {
            Some(pattern) if !pattern.trim().is_empty() => {
                (RhythmStyle::Strum(parse_strum(pattern)), swing::STRAIGHT)
            }
            _ => match Self::named(&config.style) {
                Some(named) => named,
                None if is_strum_notation(&config.style) => {
                    (RhythmStyle::Strum(parse_strum(&config.style)), swing::STRAIGHT)
                }
                None => {
                    warn!("Unknown rhythm style '{}', using whole-bar chords", config.style);
                    (RhythmStyle::Block { hits_per_bar: 1 }, swing::STRAIGHT)
                }
            },
        };

        if let RhythmStyle::Strum(strokes) = &style {
            if !matches!(strokes.len(), 4 | 8 | 16) {
                warn!(
                    "Strum pattern of length {} does not map to quarter/eighth/sixteenth notes",
                    strokes.len()
                );
            }
        }

        let ratio = swing::clamp_ratio(config.swing.unwrap_or(default_swing));
        (style, ratio)
    }

    /// Length of one pattern step in ticks
    pub fn subdivision(&self, ticks_per_bar: Tick) -> Tick {
        let steps = match self {
            RhythmStyle::Block { hits_per_bar } => (*hits_per_bar).max(1) as Tick,
            RhythmStyle::Strum(strokes) => (strokes.len() as Tick).max(1),
        };
        (ticks_per_bar / steps).max(1)
    }
}

/// Generate chord-rhythm notes for a progression
pub fn generate(chords: &[Chord], config: &RhythmConfig, ticks_per_bar: Tick) -> Vec<NoteEvent> {
    let (style, ratio) = RhythmStyle::from_config(config);
    let step = style.subdivision(ticks_per_bar);
    let channel = Instrument::Chords.channel();
    let mut notes = Vec::new();

    for (_, start, end, chord) in timeline(chords) {
        let Some(shape) = chord.shape() else {
            continue;
        };
        let voicing = shape.voicing();

        let mut bar = start;
        while bar < end {
            match &style {
                RhythmStyle::Block { hits_per_bar } => {
                    for hit in 0..(*hits_per_bar).max(1) as Tick {
                        let grid = bar + hit * step;
                        if grid >= end {
                            break;
                        }
                        let on = grid + swing_offset(hit, step, ratio);
                        let off = (grid + step).min(end).saturating_sub(NOTE_GAP_TICKS);
                        let velocity = if hit == 0 { 96 } else { 84 };
                        for &pitch in &voicing {
                            push_note(&mut notes, channel, pitch, velocity, on, off);
                        }
                    }
                }
                RhythmStyle::Strum(strokes) => {
                    for (index, &stroke) in strokes.iter().enumerate() {
                        let grid = bar + index as Tick * step;
                        if grid >= end {
                            break;
                        }
                        let Some(velocity) = stroke.velocity() else {
                            continue;
                        };

                        let held = strokes[index + 1..]
                            .iter()
                            .take_while(|s| **s == Stroke::Sustain)
                            .count() as Tick;
                        let on = grid + swing_offset(index as Tick, step, ratio);

                        if stroke == Stroke::Mute {
                            let off = (on + step / 2).min(end);
                            for &pitch in &voicing {
                                push_note(&mut notes, channel, pitch, velocity, on, off);
                            }
                            continue;
                        }

                        let off = (grid + (held + 1) * step)
                            .min(end)
                            .saturating_sub(NOTE_GAP_TICKS);
                        let ordered: Vec<u8> = if stroke.is_up() {
                            voicing.iter().rev().copied().collect()
                        } else {
                            voicing.clone()
                        };
                        for (string, pitch) in ordered.into_iter().enumerate() {
                            let delayed = on + string as Tick * STRUM_DELAY_TICKS;
                            push_note(&mut notes, channel, pitch, velocity, delayed, off);
                        }
                    }
                }
            }
            bar += ticks_per_bar;
        }
    }

    notes
}

fn push_note(notes: &mut Vec<NoteEvent>, channel: u8, pitch: u8, velocity: u8, on: Tick, off: Tick) {
    let duration = off.saturating_sub(on).max(1);
    notes.push(NoteEvent::new(channel, pitch as i32, velocity as i32, on, duration));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::chord::expand_pattern;

    fn config(style: &str) -> RhythmConfig {
        RhythmConfig {
            style: style.to_string(),
            ..RhythmConfig::default()
        }
    }

    fn onsets(notes: &[NoteEvent]) -> Vec<Tick> {
        let mut ticks: Vec<Tick> = notes.iter().map(|n| n.start_tick).collect();
        ticks.dedup();
        ticks
    }

    #[test]
    fn test_whole_notes() {
        let chords = expand_pattern("A7 A7 D7 A7", 1.0, 1);
        let notes = generate(&chords, &config("whole"), 1920);

        assert_eq!(onsets(&notes), vec![0, 1920, 3840, 5760]);
        for note in &notes {
            assert_eq!(note.end_tick(), note.start_tick + 1920 - NOTE_GAP_TICKS);
            assert_eq!(note.channel, 0);
        }
        // A7 voiced A3 C#4 E4 G4
        let first: Vec<u8> = notes.iter().filter(|n| n.start_tick == 0).map(|n| n.pitch).collect();
        assert_eq!(first, vec![57, 61, 64, 67]);
    }

    #[test]
    fn test_half_chord_clipped() {
        let chords = expand_pattern("C*0.5 G", 1.0, 1);
        let notes = generate(&chords, &config("whole"), 1920);
        assert_eq!(onsets(&notes), vec![0, 960]);
        assert!(notes.iter().filter(|n| n.start_tick == 0).all(|n| n.end_tick() == 950));
    }

    #[test]
    fn test_strum_order_and_velocity() {
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config("DU"), 1920);

        let down: Vec<&NoteEvent> = notes.iter().filter(|n| n.velocity == 100).collect();
        let up: Vec<&NoteEvent> = notes.iter().filter(|n| n.velocity == 90).collect();
        assert_eq!(down.iter().map(|n| n.pitch).collect::<Vec<_>>(), vec![48, 52, 55]);
        assert_eq!(down.iter().map(|n| n.start_tick).collect::<Vec<_>>(), vec![0, 12, 24]);
        assert_eq!(up.iter().map(|n| n.pitch).collect::<Vec<_>>(), vec![55, 52, 48]);
        assert_eq!(up[0].start_tick, 960);
    }

    #[test]
    fn test_sustain_and_rests() {
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config("D--?"), 1920);

        // '?' is a rest, '-' extends the down stroke over three quarters
        assert_eq!(onsets(&notes), vec![0, 12, 24]);
        assert!(notes.iter().all(|n| n.end_tick() == 3 * 480 - NOTE_GAP_TICKS));
    }

    #[test]
    fn test_mute_is_short() {
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config("reggae"), 1920);
        assert_eq!(onsets(&notes), vec![240, 720, 1200, 1680]);
        assert!(notes.iter().all(|n| n.duration_ticks == 120 && n.velocity == 50));
    }

    #[test]
    fn test_shuffle_swings_offbeats() {
        let chords = expand_pattern("C", 1.0, 1);
        let notes = generate(&chords, &config("shuffle"), 1920);
        let ups: Vec<Tick> = notes
            .iter()
            .filter(|n| n.velocity == 90 && n.pitch == 55)
            .map(|n| n.start_tick)
            .collect();
        assert_eq!(ups, vec![240 + 82, 720 + 82, 1200 + 82, 1680 + 82]);

        let straight = RhythmConfig {
            swing: Some(0.5),
            ..config("shuffle")
        };
        let notes = generate(&chords, &straight, 1920);
        assert!(notes.iter().any(|n| n.start_tick == 240));
    }

    #[test]
    fn test_style_resolution() {
        let (style, ratio) = RhythmStyle::from_config(&config("funk"));
        assert_eq!(style.subdivision(1920), 120);
        assert_eq!(ratio, swing::STRAIGHT);

        let (style, _) = RhythmStyle::from_config(&config("waltz"));
        assert_eq!(style, RhythmStyle::Block { hits_per_bar: 1 });

        let literal = RhythmConfig {
            pattern: Some("D.D.".to_string()),
            ..config("whole")
        };
        let (style, _) = RhythmStyle::from_config(&literal);
        assert_eq!(style.subdivision(1920), 480);
    }

    #[test]
    fn test_no_chord_is_silent() {
        let chords = expand_pattern("N.C. C", 1.0, 1);
        let notes = generate(&chords, &config("whole"), 1920);
        assert_eq!(onsets(&notes), vec![1920]);
    }
}
