// Arrangement - runs every pattern generator for a track and sequences the result

use std::sync::Arc;

use tracing::{debug, info};

use crate::rhythm::{bass, drums, melody, strum};
use crate::sequencer::events::{
    ChannelSetup, ExportSequence, PlaybackEvent, merge, to_export, to_playback_events,
};
use crate::sequencer::note::{Instrument, NoteEvent};
use crate::sequencer::timeline::{TICKS_PER_BAR, Tempo, Tick, bars_spanned};
use crate::track::{Chord, Track, TrackResult, total_ticks};

/// Everything the player needs for one playback request
///
/// Immutable once built; the event array is shared with the player without copying.
#[derive(Debug, Clone)]
pub struct Arrangement {
    pub title: String,
    pub tempo: Tempo,
    pub capo: u8,
    pub chords: Vec<Chord>,
    pub notes: Vec<NoteEvent>,
    pub events: Arc<[PlaybackEvent]>,
    pub total_ticks: Tick,
    pub setups: Vec<ChannelSetup>,
    /// Chord-rhythm step length, used for the strum position display
    pub strum_subdivision: Tick,
    pub seed: u64,
}

impl Arrangement {
    /// Build the arrangement for a track; `seed` drives the melody unless the track fixes one
    pub fn build(track: &Track, seed: u64) -> TrackResult<Self> {
        track.validate()?;

        let chords = track.chords();
        let key = track.key();
        let ticks_per_bar = TICKS_PER_BAR;
        let mut parts: Vec<(Instrument, Vec<NoteEvent>)> = Vec::new();
        let mut setups = Vec::new();
        let mut strum_subdivision = ticks_per_bar / 8;
        let mut melody_seed = seed;

        if let Some(config) = &track.rhythm {
            parts.push((Instrument::Chords, strum::generate(&chords, config, ticks_per_bar)));
            let (style, _) = strum::RhythmStyle::from_config(config);
            strum_subdivision = style.subdivision(ticks_per_bar);
            setups.push(ChannelSetup {
                instrument: Instrument::Chords,
                program: config.program,
                volume: config.volume,
            });
        }

        if let Some(config) = &track.bass {
            parts.push((Instrument::Bass, bass::generate(&chords, config, ticks_per_bar)));
            setups.push(ChannelSetup {
                instrument: Instrument::Bass,
                program: config.program,
                volume: config.volume,
            });
        }

        if let Some(config) = &track.drums {
            parts.push((Instrument::Drums, drums::generate(&chords, config, ticks_per_bar)));
            setups.push(ChannelSetup {
                instrument: Instrument::Drums,
                program: config.program,
                volume: config.volume,
            });
        }

        if let Some(config) = &track.melody {
            melody_seed = config.seed.unwrap_or(seed);
            parts.push((
                Instrument::Melody,
                melody::generate_seeded(&chords, config, key, ticks_per_bar, melody_seed),
            ));
            setups.push(ChannelSetup {
                instrument: Instrument::Melody,
                program: config.program,
                volume: config.volume,
            });
        }

        for (instrument, notes) in &parts {
            debug!("Generated {} {} notes", notes.len(), instrument);
        }

        let notes = merge(parts);
        let events: Arc<[PlaybackEvent]> = to_playback_events(&notes).into();
        let total_ticks = total_ticks(&chords);

        info!(
            "Arranged '{}': {} chords, {} bars, {} events at {}",
            track.title,
            chords.len(),
            bars_spanned(total_ticks),
            events.len(),
            track.tempo()
        );

        Ok(Self {
            title: track.title.clone(),
            tempo: track.tempo(),
            capo: track.capo,
            chords,
            notes,
            events,
            total_ticks,
            setups,
            strum_subdivision,
            seed: melody_seed,
        })
    }

    pub fn total_bars(&self) -> u32 {
        bars_spanned(self.total_ticks)
    }

    /// Delta-encoded export of the whole arrangement
    pub fn export(&self) -> ExportSequence {
        to_export(&self.notes, self.tempo, &self.setups)
    }

    /// Notes of a single instrument
    pub fn notes_for(&self, instrument: Instrument) -> impl Iterator<Item = &NoteEvent> {
        let channel = instrument.channel();
        self.notes.iter().filter(move |note| note.channel == channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{BassConfig, MelodyConfig, RhythmConfig};

    fn blues() -> Track {
        let mut track = Track::new("A", 100.0, "A7 A7 D7 A7");
        track.rhythm = Some(RhythmConfig {
            style: "whole".to_string(),
            ..RhythmConfig::default()
        });
        track.bass = Some(BassConfig {
            style: "root_fifth".to_string(),
            ..BassConfig::default()
        });
        track
    }

    #[test]
    fn test_build() {
        let arrangement = Arrangement::build(&blues(), 1).expect("arranges");

        assert_eq!(arrangement.total_ticks, 4 * 1920);
        assert_eq!(arrangement.total_bars(), 4);
        assert_eq!(arrangement.setups.len(), 3);
        assert_eq!(arrangement.strum_subdivision, 1920);
        assert_eq!(arrangement.events.len(), arrangement.notes.len() * 2);
        assert!(arrangement.events.windows(2).all(|w| w[0].tick <= w[1].tick));

        let chord_starts: Vec<Tick> = arrangement
            .notes_for(Instrument::Chords)
            .map(|n| n.start_tick)
            .collect();
        assert_eq!(chord_starts.len(), 16);
    }

    #[test]
    fn test_melody_seed_from_track() {
        let mut track = blues();
        track.melody = Some(MelodyConfig {
            seed: Some(5),
            ..MelodyConfig::default()
        });

        let a = Arrangement::build(&track, 1).expect("arranges");
        let b = Arrangement::build(&track, 2).expect("arranges");
        assert_eq!(a.seed, 5);
        assert_eq!(a.notes, b.notes);
    }

    #[test]
    fn test_invalid_track_is_rejected() {
        let track = Track::new("A", 100.0, "");
        assert!(Arrangement::build(&track, 0).is_err());
    }

    #[test]
    fn test_export_has_track_per_instrument() {
        let arrangement = Arrangement::build(&blues(), 1).expect("arranges");
        let export = arrangement.export();
        let names: Vec<&str> = export.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["tempo", "chords", "bass", "drums"]);
    }
}
