// Per-instrument configuration carried by a track

use serde::{Deserialize, Serialize};

use crate::rhythm::euclidean::EuclideanSpec;

/// Chord-rhythm (comping) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmConfig {
    /// Named style ("strum", "whole", "reggae", ...) or a literal strum pattern
    pub style: String,
    /// Literal strum notation, overrides `style` when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Swing ratio in [0.5, 1); `None` uses the style default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing: Option<f64>,
    /// General MIDI program
    pub program: u8,
    /// Channel volume (CC 7)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl Default for RhythmConfig {
    fn default() -> Self {
        Self {
            style: "strum".to_string(),
            pattern: None,
            swing: None,
            program: 25, // Acoustic guitar (steel)
            volume: None,
        }
    }
}

/// Bass line settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BassConfig {
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swing: Option<f64>,
    pub program: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl Default for BassConfig {
    fn default() -> Self {
        Self {
            style: "root".to_string(),
            swing: None,
            program: 33, // Electric bass (finger)
            volume: None,
        }
    }
}

/// Explicit rhythm for a single drum voice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePattern {
    /// Bjorklund distribution across one bar
    Euclid(EuclideanSpec),
    /// 1-based beat positions within the bar (fractional allowed, e.g. 2.5)
    Beats(Vec<f64>),
}

/// Drum kit settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrumConfig {
    /// Preset groove name; `None` plays only the explicit voices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kick: Option<VoicePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snare: Option<VoicePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hihat: Option<VoicePattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride: Option<VoicePattern>,
    /// Velocity scale in [0, 1]
    pub intensity: f64,
    /// Crash cymbal on the very first downbeat
    pub crash_on_start: bool,
    pub program: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl Default for DrumConfig {
    fn default() -> Self {
        Self {
            style: Some("rock".to_string()),
            kick: None,
            snare: None,
            hihat: None,
            ride: None,
            intensity: 1.0,
            crash_on_start: true,
            program: 0, // Standard kit
            volume: None,
        }
    }
}

/// Improvised melody settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MelodyConfig {
    /// "walk", "blues_head" or "call_response"
    pub style: String,
    /// Probability that a weak eighth sounds
    pub density: f64,
    /// Scale name; derived from the key when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    /// Center of the melodic range; defaults to C5 moved to the key root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_note: Option<u8>,
    /// Fixed random seed for reproducible lines
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub program: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

impl Default for MelodyConfig {
    fn default() -> Self {
        Self {
            style: "walk".to_string(),
            density: 0.6,
            scale: None,
            base_note: None,
            seed: None,
            program: 65, // Alto sax
            volume: None,
        }
    }
}
