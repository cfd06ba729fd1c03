// Transport - Playback state and wall-clock to tick mapping
// Owns play/pause state, position anchoring, transpose, mutes and tempo offset

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::note::Instrument;
use super::timeline::{Tempo, Tick};

/// Transport state (play/pause/stop)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    /// Check if transport is advancing
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, TransportState::Paused)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Stopped)
    }
}

/// Notes with a note-on sent and no note-off yet
///
/// Keyed by (channel, pitch as scheduled); the value is the pitch that was
/// actually sent, so a later transpose never orphans a note.
#[derive(Debug, Default, Clone)]
pub struct ActiveNotes {
    notes: HashMap<(u8, u8), u8>,
}

impl ActiveNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn contains(&self, channel: u8, pitch: u8) -> bool {
        self.notes.contains_key(&(channel, pitch))
    }

    /// Source key currently sounding `sent_pitch` on `channel`, if any
    pub fn source_of(&self, channel: u8, sent_pitch: u8) -> Option<u8> {
        self.notes
            .iter()
            .find(|((ch, _), sent)| *ch == channel && **sent == sent_pitch)
            .map(|((_, source), _)| *source)
    }

    /// Record a note-on; returns the previously sent pitch for this key
    pub fn insert(&mut self, channel: u8, pitch: u8, sent_pitch: u8) -> Option<u8> {
        self.notes.insert((channel, pitch), sent_pitch)
    }

    /// Forget a key; returns the pitch that was sent for it
    pub fn remove(&mut self, channel: u8, pitch: u8) -> Option<u8> {
        self.notes.remove(&(channel, pitch))
    }

    /// Remove every note, returning (channel, sent pitch) pairs in a stable order
    pub fn drain_all(&mut self) -> Vec<(u8, u8)> {
        let mut drained: Vec<(u8, u8)> = self
            .notes
            .drain()
            .map(|((channel, _), sent)| (channel, sent))
            .collect();
        drained.sort_unstable();
        drained
    }

    /// Remove the notes of one channel, returning their sent pitches
    pub fn drain_channel(&mut self, channel: u8) -> Vec<u8> {
        let mut drained = Vec::new();
        self.notes.retain(|(ch, _), sent| {
            if *ch == channel {
                drained.push(*sent);
                false
            } else {
                true
            }
        });
        drained.sort_unstable();
        drained
    }
}

/// Transport controller
///
/// Position is never stored as a tick: it is derived on demand from
/// `now - start_time - paused_total + seek_offset` at the effective tempo.
#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    base_tempo: Tempo,
    start_time: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
    /// Signed correction added to the elapsed time, in nanoseconds
    seek_offset_nanos: i128,
    /// Index of the next playback event to emit
    pub cursor_index: usize,
    pub active_notes: ActiveNotes,
    transpose_semitones: i32,
    muted_tracks: [bool; 4],
    tempo_offset_bpm: f64,
}

impl Transport {
    /// Create a new transport
    pub fn new(base_tempo: Tempo) -> Self {
        Self {
            state: TransportState::Stopped,
            base_tempo,
            start_time: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            seek_offset_nanos: 0,
            cursor_index: 0,
            active_notes: ActiveNotes::new(),
            transpose_semitones: 0,
            muted_tracks: [false; 4],
            tempo_offset_bpm: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Start from the top; transpose, mutes and tempo offset are kept
    pub fn start(&mut self, now: Instant) {
        self.state = TransportState::Playing;
        self.start_time = Some(now);
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
        self.seek_offset_nanos = 0;
        self.cursor_index = 0;
    }

    /// Freeze position; returns false if not playing
    pub fn pause(&mut self, now: Instant) -> bool {
        if !self.state.is_playing() {
            return false;
        }
        self.state = TransportState::Paused;
        self.paused_at = Some(now);
        true
    }

    /// Continue from the frozen position; returns false if not paused
    pub fn resume(&mut self, now: Instant) -> bool {
        if !self.state.is_paused() {
            return false;
        }
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
        self.state = TransportState::Playing;
        true
    }

    /// Stop and freeze the position at `now`; a paused or stopped position stays put
    pub fn stop(&mut self, now: Instant) {
        if self.state.is_playing() {
            self.paused_at = Some(now);
        }
        self.state = TransportState::Stopped;
    }

    /// Raw elapsed time (without seek correction) at `now`
    fn raw_elapsed_nanos(&self, now: Instant) -> i128 {
        let Some(start) = self.start_time else {
            return 0;
        };
        // While paused or stopped the clock reads as frozen
        let reference = match (self.state, self.paused_at) {
            (TransportState::Paused | TransportState::Stopped, Some(frozen)) => frozen,
            _ => now,
        };
        let elapsed = reference.saturating_duration_since(start);
        elapsed.as_nanos() as i128 - self.paused_total.as_nanos() as i128
    }

    /// Musical elapsed time in nanoseconds, never negative
    pub fn elapsed_nanos(&self, now: Instant) -> u128 {
        (self.raw_elapsed_nanos(now) + self.seek_offset_nanos).max(0) as u128
    }

    pub fn effective_tempo(&self) -> Tempo {
        self.base_tempo.offset_by(self.tempo_offset_bpm)
    }

    pub fn current_tick(&self, now: Instant) -> Tick {
        self.effective_tempo().ticks_for_nanos(self.elapsed_nanos(now))
    }

    /// Re-anchor so that `current_tick(now) == target`
    pub fn relocate(&mut self, now: Instant, target: Tick) {
        let wanted = self.effective_tempo().nanos_for_ticks(target) as i128;
        self.seek_offset_nanos = wanted - self.raw_elapsed_nanos(now);
    }

    pub fn transpose_semitones(&self) -> i32 {
        self.transpose_semitones
    }

    pub fn add_transpose(&mut self, semitones: i32) -> i32 {
        self.transpose_semitones = self.transpose_semitones.saturating_add(semitones);
        self.transpose_semitones
    }

    pub fn is_muted(&self, instrument: Instrument) -> bool {
        self.muted_tracks[instrument.index()]
    }

    pub fn muted_tracks(&self) -> [bool; 4] {
        self.muted_tracks
    }

    /// Flip a track's mute flag; returns the new value
    pub fn toggle_mute(&mut self, instrument: Instrument) -> bool {
        let flag = &mut self.muted_tracks[instrument.index()];
        *flag = !*flag;
        *flag
    }

    pub fn tempo_offset_bpm(&self) -> f64 {
        self.tempo_offset_bpm
    }

    /// Shift the tempo offset, keeping the effective tempo in range and the
    /// current tick unchanged
    pub fn adjust_tempo(&mut self, now: Instant, delta_bpm: f64) -> Tempo {
        let tick = self.current_tick(now);
        let target = self.effective_tempo().offset_by(delta_bpm);
        self.tempo_offset_bpm = target.bpm() - self.base_tempo.bpm();
        if self.start_time.is_some() {
            self.relocate(now, tick);
        }
        target
    }
}
