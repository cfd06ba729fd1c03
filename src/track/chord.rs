// Chords - progression entries, pattern expansion and chord-symbol parsing

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::rhythm::scale::parse_pitch_class;
use crate::sequencer::timeline::{Tick, ticks_for_bars};

/// Shortest chord length in bars
pub const MIN_CHORD_BARS: f64 = 0.5;

/// Longest playable track, and so longest single chord, in bars
pub const MAX_TRACK_BARS: f64 = 10_000.0;

/// Most times a progression may be repeated
pub const MAX_REPEAT: u32 = 1_000;

/// One entry of a chord progression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub symbol: String,
    pub bars: f64,
}

impl Chord {
    /// Creates a chord; zero, negative or NaN lengths become half a bar, huge ones `MAX_TRACK_BARS`
    pub fn new(symbol: impl Into<String>, bars: f64) -> Self {
        Self {
            symbol: symbol.into(),
            bars: sanitize_bars(bars),
        }
    }

    /// Length of this chord on the tick grid
    pub fn ticks(&self) -> Tick {
        ticks_for_bars(sanitize_bars(self.bars))
    }

    /// Parsed harmony, `None` for "N.C." or unreadable symbols
    pub fn shape(&self) -> Option<ChordShape> {
        ChordShape::parse(&self.symbol)
    }
}

fn sanitize_bars(bars: f64) -> f64 {
    if bars.is_finite() && bars > 0.0 {
        bars.clamp(MIN_CHORD_BARS, MAX_TRACK_BARS)
    } else {
        MIN_CHORD_BARS
    }
}

/// Expand a progression string such as `"A7 D7*2 | E7*0.5 D7*0.5 A7"`
///
/// Each token lasts `bars_per_chord` unless it carries an inline `*bars` override.
/// Bar lines (`|`) are ignored. The whole progression is repeated `repeat` times,
/// clamped to `1..=MAX_REPEAT`.
pub fn expand_pattern(pattern: &str, bars_per_chord: f64, repeat: u32) -> Vec<Chord> {
    let once: Vec<Chord> = pattern
        .split_whitespace()
        .filter(|token| *token != "|")
        .filter_map(|token| parse_token(token, bars_per_chord))
        .collect();

    repeated(&once, repeat)
}

/// `once` back to back `repeat` times, clamped to `1..=MAX_REPEAT`
pub fn repeated(once: &[Chord], repeat: u32) -> Vec<Chord> {
    let repeat = repeat.clamp(1, MAX_REPEAT) as usize;
    let mut chords = Vec::with_capacity(once.len() * repeat);
    for _ in 0..repeat {
        chords.extend_from_slice(once);
    }
    chords
}

fn parse_token(token: &str, bars_per_chord: f64) -> Option<Chord> {
    let token = token.trim_matches('|');
    if token.is_empty() {
        return None;
    }

    match token.split_once('*') {
        Some((symbol, duration)) => {
            let bars = match duration.parse::<f64>() {
                Ok(bars) => bars,
                Err(_) => {
                    warn!("Invalid chord duration '{}' in '{}', using {}", duration, token, bars_per_chord);
                    bars_per_chord
                }
            };
            Some(Chord::new(symbol, bars))
        }
        None => Some(Chord::new(token, bars_per_chord)),
    }
}

/// Total length of a progression in ticks
pub fn total_ticks(chords: &[Chord]) -> Tick {
    chords
        .iter()
        .fold(0, |total: Tick, chord| total.saturating_add(chord.ticks()))
}

/// Iterate chords with their absolute start tick and end tick
pub fn timeline(chords: &[Chord]) -> impl Iterator<Item = (usize, Tick, Tick, &Chord)> {
    chords.iter().enumerate().scan(0, |cursor: &mut Tick, (index, chord)| {
        let start = *cursor;
        *cursor = start.saturating_add(chord.ticks());
        Some((index, start, *cursor, chord))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordQuality {
    Major,
    Minor,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    Diminished,
    Diminished7,
    HalfDiminished,
    Augmented,
    Sus2,
    Sus4,
    Dominant7Sus4,
    Sixth,
    Minor6,
    Dominant9,
    Major9,
    Minor9,
    Power,
}

impl ChordQuality {
    fn from_suffix(suffix: &str) -> Option<Self> {
        let quality = match suffix {
            "" | "maj" | "M" => ChordQuality::Major,
            "m" | "min" | "-" => ChordQuality::Minor,
            "7" | "dom7" => ChordQuality::Dominant7,
            "maj7" | "M7" | "Δ" | "Δ7" => ChordQuality::Major7,
            "m7" | "min7" | "-7" => ChordQuality::Minor7,
            "mM7" | "m(maj7)" | "minmaj7" => ChordQuality::MinorMajor7,
            "dim" | "°" | "o" => ChordQuality::Diminished,
            "dim7" | "°7" | "o7" => ChordQuality::Diminished7,
            "m7b5" | "ø" | "ø7" | "min7b5" => ChordQuality::HalfDiminished,
            "aug" | "+" => ChordQuality::Augmented,
            "sus2" => ChordQuality::Sus2,
            "sus4" | "sus" => ChordQuality::Sus4,
            "7sus4" | "7sus" => ChordQuality::Dominant7Sus4,
            "6" | "maj6" => ChordQuality::Sixth,
            "m6" | "min6" => ChordQuality::Minor6,
            "9" => ChordQuality::Dominant9,
            "maj9" | "M9" => ChordQuality::Major9,
            "m9" | "min9" => ChordQuality::Minor9,
            "5" => ChordQuality::Power,
            _ => return None,
        };
        Some(quality)
    }

    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ChordQuality::Major => &[0, 4, 7],
            ChordQuality::Minor => &[0, 3, 7],
            ChordQuality::Dominant7 => &[0, 4, 7, 10],
            ChordQuality::Major7 => &[0, 4, 7, 11],
            ChordQuality::Minor7 => &[0, 3, 7, 10],
            ChordQuality::MinorMajor7 => &[0, 3, 7, 11],
            ChordQuality::Diminished => &[0, 3, 6],
            ChordQuality::Diminished7 => &[0, 3, 6, 9],
            ChordQuality::HalfDiminished => &[0, 3, 6, 10],
            ChordQuality::Augmented => &[0, 4, 8],
            ChordQuality::Sus2 => &[0, 2, 7],
            ChordQuality::Sus4 => &[0, 5, 7],
            ChordQuality::Dominant7Sus4 => &[0, 5, 7, 10],
            ChordQuality::Sixth => &[0, 4, 7, 9],
            ChordQuality::Minor6 => &[0, 3, 7, 9],
            ChordQuality::Dominant9 => &[0, 4, 7, 10, 14],
            ChordQuality::Major9 => &[0, 4, 7, 11, 14],
            ChordQuality::Minor9 => &[0, 3, 7, 10, 14],
            ChordQuality::Power => &[0, 7, 12],
        }
    }

    pub fn is_minor(self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Diminished
                | ChordQuality::Diminished7
                | ChordQuality::HalfDiminished
                | ChordQuality::Minor6
                | ChordQuality::Minor9
        )
    }
}

/// A parsed chord symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChordShape {
    /// Root pitch class (0 = C)
    pub root: u8,
    /// Lowest pitch class, differs from `root` for slash chords
    pub bass: u8,
    pub quality: ChordQuality,
}

impl ChordShape {
    /// Lowest pitch of the close voicing (C3)
    pub const VOICING_BASE: u8 = 48;

    /// Parse symbols like `C`, `F#m7`, `Bbmaj7`, `D/F#`, `E7sus4`
    ///
    /// Unknown qualities fall back to a major triad. Returns `None` when no root can be read.
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        let (head, slash) = match symbol.split_once('/') {
            Some((head, bass)) => (head, Some(bass)),
            None => (symbol, None),
        };

        let first = head.chars().next()?;
        if !first.is_ascii_uppercase() {
            return None;
        }
        let (root, consumed) = parse_pitch_class(head)?;

        let suffix = &head[consumed..];
        let quality = ChordQuality::from_suffix(suffix).unwrap_or_else(|| {
            debug!("Unknown chord quality '{}' in '{}', using major", suffix, symbol);
            ChordQuality::Major
        });

        let bass = slash
            .and_then(|bass| parse_pitch_class(bass.trim()))
            .map(|(pitch_class, _)| pitch_class)
            .unwrap_or(root);

        Some(Self { root, bass, quality })
    }

    pub fn intervals(&self) -> &'static [u8] {
        self.quality.intervals()
    }

    pub fn is_minor(&self) -> bool {
        self.quality.is_minor()
    }

    /// Third above the root (suspended chords use their suspension)
    pub fn third(&self) -> u8 {
        match self.quality {
            ChordQuality::Sus2 => 2,
            ChordQuality::Sus4 | ChordQuality::Dominant7Sus4 => 5,
            _ if self.is_minor() => 3,
            _ => 4,
        }
    }

    pub fn fifth(&self) -> u8 {
        match self.quality {
            ChordQuality::Diminished | ChordQuality::Diminished7 | ChordQuality::HalfDiminished => 6,
            ChordQuality::Augmented => 8,
            _ => 7,
        }
    }

    /// Seventh above the root, if the chord has one
    pub fn seventh(&self) -> Option<u8> {
        // The 9 in a sixth chord is an added sixth, not a seventh
        if matches!(self.quality, ChordQuality::Sixth | ChordQuality::Minor6) {
            return None;
        }
        self.intervals()
            .iter()
            .copied()
            .find(|interval| (9..=11).contains(interval))
    }

    /// Seventh when present, otherwise the major sixth
    pub fn sixth_or_seventh(&self) -> u8 {
        self.seventh().unwrap_or(9)
    }

    /// Distinct pitch classes of the chord (including a slash bass)
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut classes: Vec<u8> = self
            .intervals()
            .iter()
            .map(|interval| (self.root + interval) % 12)
            .collect();
        if !classes.contains(&self.bass) {
            classes.push(self.bass);
        }
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    /// Close voicing starting from the root in the C3 octave, ascending
    pub fn voicing(&self) -> Vec<u8> {
        let root = Self::VOICING_BASE + self.root;
        let mut notes: Vec<u8> = self.intervals().iter().map(|interval| root + interval).collect();
        if self.bass != self.root {
            let mut bass = Self::VOICING_BASE + self.bass;
            if bass >= root {
                bass -= 12;
            }
            notes.insert(0, bass);
        }
        notes
    }
}
