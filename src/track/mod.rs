// Track module - declarative description of a backing track
// Chords, key, tempo and per-instrument settings, persisted as RON or JSON

pub mod chord;
pub mod instruments;

pub use chord::{
    Chord, ChordQuality, ChordShape, MAX_REPEAT, MAX_TRACK_BARS, expand_pattern, total_ticks,
};
pub use instruments::{BassConfig, DrumConfig, MelodyConfig, RhythmConfig, VoicePattern};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rhythm::scale::Key;
use crate::sequencer::timeline::{Tempo, ticks_for_bars};

/// Track error types
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported track format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid track: {0}")]
    Invalid(String),
}

pub type TrackResult<T> = Result<T, TrackError>;

fn default_key() -> String {
    "C".to_string()
}

fn default_tempo() -> f64 {
    Tempo::DEFAULT_BPM
}

fn default_bars_per_chord() -> f64 {
    1.0
}

fn default_repeat() -> u32 {
    1
}

/// A backing track ready for arrangement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_key")]
    pub key: String,
    /// Base tempo in BPM
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default = "default_bars_per_chord")]
    pub bars_per_chord: f64,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    /// Progression string, e.g. "A7 D7 A7*2 E7 D7 A7 E7"
    #[serde(default)]
    pub pattern: String,
    /// Explicit chord list, used instead of `pattern` when non-empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chords: Vec<Chord>,
    /// Capo fret shown to the player; chord symbols are sounding pitches
    #[serde(default)]
    pub capo: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhythm: Option<RhythmConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bass: Option<BassConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drums: Option<DrumConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub melody: Option<MelodyConfig>,
}

impl Track {
    /// Track with a progression and default rhythm, bass and drums
    pub fn new(key: &str, tempo: f64, pattern: &str) -> Self {
        Self {
            title: String::new(),
            key: key.to_string(),
            tempo,
            bars_per_chord: 1.0,
            repeat: 1,
            pattern: pattern.to_string(),
            chords: Vec::new(),
            capo: 0,
            rhythm: Some(RhythmConfig::default()),
            bass: Some(BassConfig::default()),
            drums: Some(DrumConfig::default()),
            melody: None,
        }
    }

    /// Expanded chord progression
    pub fn chords(&self) -> Vec<Chord> {
        if self.chords.is_empty() {
            return expand_pattern(&self.pattern, self.bars_per_chord, self.repeat);
        }

        let once: Vec<Chord> = self
            .chords
            .iter()
            .map(|chord| Chord::new(chord.symbol.clone(), chord.bars))
            .collect();
        chord::repeated(&once, self.repeat)
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::new(self.tempo)
    }

    /// Parsed key, falling back to C major when unreadable
    pub fn key(&self) -> Key {
        Key::parse(&self.key).unwrap_or_default()
    }

    /// Check the track can be arranged
    pub fn validate(&self) -> TrackResult<()> {
        if self.repeat > MAX_REPEAT {
            return Err(TrackError::Invalid(format!(
                "repeat {} exceeds {}",
                self.repeat, MAX_REPEAT
            )));
        }
        let chords = self.chords();
        if chords.is_empty() {
            return Err(TrackError::Invalid("track has no chords".to_string()));
        }
        if total_ticks(&chords) > ticks_for_bars(MAX_TRACK_BARS) {
            return Err(TrackError::Invalid(format!(
                "track is longer than {} bars",
                MAX_TRACK_BARS
            )));
        }
        if !self.tempo.is_finite() || self.tempo <= 0.0 {
            return Err(TrackError::Invalid(format!("invalid tempo {}", self.tempo)));
        }
        if Key::parse(&self.key).is_none() {
            return Err(TrackError::Invalid(format!("unreadable key '{}'", self.key)));
        }
        Ok(())
    }

    pub fn from_ron_str(text: &str) -> TrackResult<Self> {
        Ok(ron::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> TrackResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_ron_string(&self) -> TrackResult<String> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load a track from a `.ron` or `.json` file and validate it
    pub fn load(path: &Path) -> TrackResult<Self> {
        let text = fs::read_to_string(path)?;
        let track = match extension(path).as_str() {
            "ron" => Self::from_ron_str(&text)?,
            "json" => Self::from_json_str(&text)?,
            other => return Err(TrackError::UnsupportedFormat(other.to_string())),
        };
        track.validate()?;
        info!("Loaded track '{}' from {}", track.title, path.display());
        Ok(track)
    }

    /// Save a track, format chosen by the file extension
    pub fn save(&self, path: &Path) -> TrackResult<()> {
        let text = match extension(path).as_str() {
            "ron" => self.to_ron_string()?,
            "json" => serde_json::to_string_pretty(self)?,
            other => return Err(TrackError::UnsupportedFormat(other.to_string())),
        };
        fs::write(path, text)?;
        Ok(())
    }
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}
