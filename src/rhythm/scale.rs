// Scales and keys used by the melody generator

use std::fmt;

/// Parse a note letter with optional accidental into a pitch class (0-11)
///
/// Returns the pitch class and the number of bytes consumed.
pub fn parse_pitch_class(text: &str) -> Option<(u8, usize)> {
    let mut chars = text.char_indices();
    let (_, letter) = chars.next()?;
    let natural: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let mut consumed = letter.len_utf8();
    let mut pitch = natural;
    if let Some((idx, accidental)) = chars.next() {
        let shift = match accidental {
            '#' | '♯' => 1,
            'b' | '♭' => -1,
            _ => 0,
        };
        if shift != 0 {
            pitch += shift;
            consumed = idx + accidental.len_utf8();
        }
    }

    Some((pitch.rem_euclid(12) as u8, consumed))
}

/// Tonal center of a track: root pitch class plus major/minor flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key {
    pub root: u8,
    pub minor: bool,
}

impl Key {
    /// Parse "A", "Em", "F#m", "Bbmin", "C major"
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (root, consumed) = parse_pitch_class(text)?;
        let rest = text[consumed..].trim().to_ascii_lowercase();
        let minor = match rest.as_str() {
            "" | "maj" | "major" => false,
            "m" | "min" | "minor" | "-" => true,
            _ => return None,
        };
        Some(Self { root, minor })
    }

    /// Scale used when a melody does not name one
    pub fn default_scale(&self) -> Scale {
        if self.minor {
            Scale::MinorPentatonic
        } else {
            Scale::MajorPentatonic
        }
    }
}

impl Default for Key {
    fn default() -> Self {
        Self { root: 0, minor: false }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [&str; 12] = [
            "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
        ];
        write!(f, "{}{}", NAMES[self.root as usize], if self.minor { "m" } else { "" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Major,
    Minor,
    MajorPentatonic,
    MinorPentatonic,
    Blues,
    Dorian,
    Mixolydian,
}

impl Scale {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "major" | "ionian" => Some(Scale::Major),
            "minor" | "aeolian" | "natural_minor" => Some(Scale::Minor),
            "major_pentatonic" | "pentatonic" => Some(Scale::MajorPentatonic),
            "minor_pentatonic" => Some(Scale::MinorPentatonic),
            "blues" => Some(Scale::Blues),
            "dorian" => Some(Scale::Dorian),
            "mixolydian" => Some(Scale::Mixolydian),
            _ => None,
        }
    }

    /// Semitone offsets from the root
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::MajorPentatonic => &[0, 2, 4, 7, 9],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
        }
    }

    pub fn contains(self, root: u8, pitch: u8) -> bool {
        let degree = (pitch as i32 - root as i32).rem_euclid(12) as u8;
        self.intervals().contains(&degree)
    }

    /// Nearest scale tone at or below `pitch`
    pub fn snap_down(self, root: u8, pitch: u8) -> u8 {
        let mut candidate = pitch;
        while !self.contains(root, candidate) && candidate > 0 {
            candidate -= 1;
        }
        candidate
    }

    /// Move `steps` scale degrees from `pitch` (negative goes down), staying in 0..=127
    pub fn step(self, root: u8, pitch: u8, steps: i32) -> u8 {
        let mut current = self.snap_down(root, pitch) as i32;
        let direction = steps.signum();
        for _ in 0..steps.unsigned_abs() {
            let mut next = current + direction;
            while (0..=127).contains(&next) && !self.contains(root, next as u8) {
                next += direction;
            }
            if !(0..=127).contains(&next) {
                break;
            }
            current = next;
        }
        current as u8
    }
}
