// Sequencer Player - walks the playback events and turns them into synth messages
//
// Pure state machine: time comes in as `Instant`s, messages go out through an
// outbox that the tick loop drains after releasing the lock.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::sequencer::arrangement::Arrangement;
use crate::sequencer::events::PlaybackEvent;
use crate::sequencer::note::{Instrument, PERCUSSION_CHANNEL, clamp_midi};
use crate::sequencer::timeline::{TICKS_PER_BAR, Tempo, Tick, bar_of, bars_spanned, beat_of};
use crate::sequencer::transport::{Transport, TransportState};
use crate::synth::SynthMessage;

/// MIDI controller number for channel volume
const CC_VOLUME: u8 = 7;

/// Read-only snapshot for the display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    /// One-based bar
    pub bar: u32,
    /// One-based beat within the bar
    pub beat: u8,
    /// Chord-rhythm subdivision within the bar (zero-based)
    pub strum: u32,
    pub paused: bool,
    pub state: TransportState,
    pub current_tick: Tick,
    pub total_bars: u32,
    pub transpose: i32,
    pub capo: u8,
    pub tempo_offset: f64,
    pub effective_bpm: f64,
    pub muted: [bool; 4],
}

/// Sequencer player - converts playback events to synth messages
pub struct Player {
    events: Arc<[PlaybackEvent]>,
    total_ticks: Tick,
    total_bars: u32,
    capo: u8,
    strum_subdivision: Tick,
    /// Program changes and volumes sent on every start
    setup: Vec<SynthMessage>,
    transport: Transport,
    outbox: Vec<SynthMessage>,
    looping: bool,
}

impl Player {
    /// Create a stopped player for an arrangement
    pub fn new(arrangement: &Arrangement) -> Self {
        let mut setup = Vec::with_capacity(arrangement.setups.len() * 2);
        for channel_setup in &arrangement.setups {
            let channel = channel_setup.instrument.channel();
            setup.push(SynthMessage::ProgramChange {
                channel,
                program: channel_setup.program.min(127),
            });
            if let Some(volume) = channel_setup.volume {
                setup.push(SynthMessage::ControlChange {
                    channel,
                    controller: CC_VOLUME,
                    value: volume.min(127),
                });
            }
        }

        Self {
            events: Arc::clone(&arrangement.events),
            total_ticks: arrangement.total_ticks,
            total_bars: bars_spanned(arrangement.total_ticks),
            capo: arrangement.capo,
            strum_subdivision: arrangement.strum_subdivision.max(1),
            setup,
            transport: Transport::new(arrangement.tempo),
            outbox: Vec::new(),
            looping: false,
        }
    }

    /// Restart from the top instead of stopping at the end
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Start from tick 0
    pub fn start(&mut self, now: Instant) {
        self.stop_all_notes();
        self.outbox.extend(self.setup.iter().copied());
        self.transport.start(now);
        info!(
            "Playback started: {} bars at {}",
            self.total_bars,
            self.transport.effective_tempo()
        );
    }

    /// Advance to `now`, queueing every event that has come due
    pub fn tick(&mut self, now: Instant) -> TransportState {
        if !self.transport.state().is_playing() {
            return self.transport.state();
        }

        let current = self.transport.current_tick(now);
        if current >= self.total_ticks {
            self.stop_all_notes();
            if self.looping {
                debug!("Reached the end, looping");
                self.transport.start(now);
                self.emit_due(self.transport.current_tick(now));
            } else {
                info!("Reached the end of the track");
                self.transport.stop(now);
            }
            return self.transport.state();
        }

        self.emit_due(current);
        self.transport.state()
    }

    /// Emit every event with `tick <= current`, in order
    fn emit_due(&mut self, current: Tick) {
        while let Some(event) = self.events.get(self.transport.cursor_index).copied() {
            if event.tick > current {
                break;
            }
            self.transport.cursor_index += 1;
            if event.is_note_on {
                self.note_on(&event);
            } else {
                self.note_off(&event);
            }
        }
    }

    fn note_on(&mut self, event: &PlaybackEvent) {
        let muted = Instrument::from_channel(event.channel)
            .is_some_and(|instrument| self.transport.is_muted(instrument));
        if muted {
            return;
        }

        let channel = event.channel;
        let sent = if channel == PERCUSSION_CHANNEL {
            event.pitch
        } else {
            clamp_midi(event.pitch as i32 + self.transport.transpose_semitones())
        };

        let active = &mut self.transport.active_notes;
        if let Some(previous) = active.remove(channel, event.pitch) {
            warn!(
                "Note-on for sounding key ch {} pitch {}, forcing note-off",
                channel, event.pitch
            );
            self.outbox.push(SynthMessage::NoteOff { channel, pitch: previous });
        } else if let Some(source) = active.source_of(channel, sent) {
            // Two keys clamped onto the same sent pitch
            warn!(
                "Pitch {} already sounding on ch {}, forcing note-off",
                sent, channel
            );
            active.remove(channel, source);
            self.outbox.push(SynthMessage::NoteOff { channel, pitch: sent });
        }

        self.transport.active_notes.insert(channel, event.pitch, sent);
        self.outbox.push(SynthMessage::NoteOn {
            channel,
            pitch: sent,
            velocity: event.velocity,
        });
    }

    fn note_off(&mut self, event: &PlaybackEvent) {
        if let Some(sent) = self.transport.active_notes.remove(event.channel, event.pitch) {
            self.outbox.push(SynthMessage::NoteOff {
                channel: event.channel,
                pitch: sent,
            });
        }
    }

    /// Note-off every sounding note
    pub fn stop_all_notes(&mut self) {
        for (channel, pitch) in self.transport.active_notes.drain_all() {
            self.outbox.push(SynthMessage::NoteOff { channel, pitch });
        }
    }

    pub fn pause(&mut self, now: Instant) -> bool {
        if !self.transport.pause(now) {
            return false;
        }
        self.stop_all_notes();
        debug!("Paused at tick {}", self.transport.current_tick(now));
        true
    }

    pub fn resume(&mut self, now: Instant) -> bool {
        let resumed = self.transport.resume(now);
        if resumed {
            debug!("Resumed at tick {}", self.transport.current_tick(now));
        }
        resumed
    }

    /// Pause when playing, resume when paused, start over when stopped
    pub fn toggle_pause(&mut self, now: Instant) -> TransportState {
        match self.transport.state() {
            TransportState::Playing => {
                self.pause(now);
            }
            TransportState::Paused => {
                self.resume(now);
            }
            TransportState::Stopped => self.start(now),
        }
        self.transport.state()
    }

    /// Jump by whole bars from the current bar; returns the zero-based target bar
    pub fn seek(&mut self, delta_bars: i64, now: Instant) -> u32 {
        let current_bar = bar_of(self.transport.current_tick(now)) as i64;
        let target = current_bar.saturating_add(delta_bars);
        self.seek_to_bar(target, now)
    }

    /// Jump to a zero-based bar, clamped to the track
    pub fn seek_to_bar(&mut self, bar: i64, now: Instant) -> u32 {
        self.stop_all_notes();

        let last_bar = self.total_bars.saturating_sub(1) as i64;
        let target_bar = bar.clamp(0, last_bar) as u32;
        let target_tick = target_bar as Tick * TICKS_PER_BAR;

        self.transport.relocate(now, target_tick);
        self.transport.cursor_index = self.events.partition_point(|e| e.tick < target_tick);

        debug!("Seeked to bar {}", target_bar + 1);
        target_bar
    }

    /// Shift transposition; sounding notes are released first
    pub fn transpose(&mut self, semitones: i32) -> i32 {
        self.stop_all_notes();
        let total = self.transport.add_transpose(semitones);
        debug!("Transpose {:+}", total);
        total
    }

    /// Flip a track's mute; returns true if it is now muted
    pub fn toggle_mute(&mut self, instrument: Instrument) -> bool {
        let muted = self.transport.toggle_mute(instrument);
        if muted {
            let channel = instrument.channel();
            for pitch in self.transport.active_notes.drain_channel(channel) {
                self.outbox.push(SynthMessage::NoteOff { channel, pitch });
            }
        }
        debug!("{} {}", instrument, if muted { "muted" } else { "unmuted" });
        muted
    }

    pub fn adjust_tempo(&mut self, delta_bpm: f64, now: Instant) -> Tempo {
        let tempo = self.transport.adjust_tempo(now, delta_bpm);
        debug!("Tempo now {}", tempo);
        tempo
    }

    /// Release every note and stop; the position stays frozen
    pub fn stop(&mut self, now: Instant) {
        self.stop_all_notes();
        self.transport.stop(now);
    }

    /// Forget sounding notes and queued messages without sending anything
    ///
    /// Used once the synth is gone.
    pub fn abandon(&mut self, now: Instant) {
        self.transport.active_notes.drain_all();
        self.outbox.clear();
        self.transport.stop(now);
    }

    /// Messages queued since the last call
    pub fn take_outbox(&mut self) -> Vec<SynthMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_pending(&self) -> bool {
        !self.outbox.is_empty()
    }

    pub fn current_tick(&self, now: Instant) -> Tick {
        self.transport.current_tick(now)
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn total_ticks(&self) -> Tick {
        self.total_ticks
    }

    pub fn total_bars(&self) -> u32 {
        self.total_bars
    }

    pub fn transpose_semitones(&self) -> i32 {
        self.transport.transpose_semitones()
    }

    pub fn is_muted(&self, instrument: Instrument) -> bool {
        self.transport.is_muted(instrument)
    }

    pub fn capo(&self) -> u8 {
        self.capo
    }

    pub fn tempo_offset_bpm(&self) -> f64 {
        self.transport.tempo_offset_bpm()
    }

    pub fn active_note_count(&self) -> usize {
        self.transport.active_notes.len()
    }

    pub fn playback_state(&self, now: Instant) -> PlaybackState {
        let current_tick = self.transport.current_tick(now);
        // Past the end the display holds on the last tick
        let shown = current_tick.min(self.total_ticks.saturating_sub(1));
        let state = self.transport.state();

        PlaybackState {
            bar: bar_of(shown) as u32 + 1,
            beat: beat_of(shown),
            strum: ((shown % TICKS_PER_BAR) / self.strum_subdivision) as u32,
            paused: state.is_paused(),
            state,
            current_tick,
            total_bars: self.total_bars,
            transpose: self.transport.transpose_semitones(),
            capo: self.capo,
            tempo_offset: self.transport.tempo_offset_bpm(),
            effective_bpm: self.transport.effective_tempo().bpm(),
            muted: self.transport.muted_tracks(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::note::NoteEvent;
    use crate::sequencer::events::{ChannelSetup, to_playback_events};
    use std::time::Duration;

    fn arrangement(notes: Vec<NoteEvent>, total_ticks: Tick) -> Arrangement {
        Arrangement {
            title: "test".to_string(),
            tempo: Tempo::new(120.0),
            capo: 2,
            chords: Vec::new(),
            events: to_playback_events(&notes).into(),
            notes,
            total_ticks,
            setups: vec![ChannelSetup {
                instrument: Instrument::Chords,
                program: 25,
                volume: Some(90),
            }],
            strum_subdivision: 240,
            seed: 0,
        }
    }

    fn at(origin: Instant, millis: u64) -> Instant {
        origin + Duration::from_millis(millis)
    }

    #[test]
    fn test_note_on_for_sounding_key_forces_note_off() {
        // Second note starts while the first is still held on the same key
        let notes = vec![NoteEvent::new(0, 60, 100, 0, 960), NoteEvent::new(0, 60, 80, 480, 480)];
        let origin = Instant::now();
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.take_outbox();

        player.tick(at(origin, 1_100));
        assert_eq!(
            player.take_outbox(),
            vec![
                SynthMessage::NoteOn { channel: 0, pitch: 60, velocity: 100 },
                SynthMessage::NoteOff { channel: 0, pitch: 60 },
                SynthMessage::NoteOn { channel: 0, pitch: 60, velocity: 80 },
                SynthMessage::NoteOff { channel: 0, pitch: 60 },
            ]
        );
        assert_eq!(player.active_note_count(), 0);
    }

    #[test]
    fn test_start_sends_setup() {
        let origin = Instant::now();
        let mut player = Player::new(&arrangement(Vec::new(), 1920));
        player.start(origin);

        assert_eq!(
            player.take_outbox(),
            vec![
                SynthMessage::ProgramChange { channel: 0, program: 25 },
                SynthMessage::ControlChange { channel: 0, controller: 7, value: 90 },
            ]
        );
        assert!(!player.has_pending());
    }

    #[test]
    fn test_note_triggering() {
        let origin = Instant::now();
        let notes = vec![NoteEvent::new(0, 60, 100, 0, 480)];
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.take_outbox();

        player.tick(origin);
        assert_eq!(
            player.take_outbox(),
            vec![SynthMessage::NoteOn { channel: 0, pitch: 60, velocity: 100 }]
        );
        assert_eq!(player.active_note_count(), 1);

        // 480 ticks at 120 BPM = 500ms
        player.tick(at(origin, 499));
        assert!(player.take_outbox().is_empty());
        player.tick(at(origin, 500));
        assert_eq!(player.take_outbox(), vec![SynthMessage::NoteOff { channel: 0, pitch: 60 }]);
    }

    #[test]
    fn test_end_stops_and_flushes() {
        let origin = Instant::now();
        let notes = vec![NoteEvent::new(0, 60, 100, 0, 5000)];
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.tick(origin);
        player.take_outbox();

        assert_eq!(player.tick(at(origin, 2000)), TransportState::Stopped);
        assert_eq!(player.take_outbox(), vec![SynthMessage::NoteOff { channel: 0, pitch: 60 }]);
        assert_eq!(player.active_note_count(), 0);
    }

    #[test]
    fn test_looping_restarts() {
        let origin = Instant::now();
        let notes = vec![NoteEvent::new(0, 60, 100, 0, 480)];
        let mut player = Player::new(&arrangement(notes, 1920)).with_looping(true);
        player.start(origin);
        player.tick(origin);
        player.tick(at(origin, 600));
        player.take_outbox();

        assert_eq!(player.tick(at(origin, 2000)), TransportState::Playing);
        assert_eq!(
            player.take_outbox(),
            vec![SynthMessage::NoteOn { channel: 0, pitch: 60, velocity: 100 }]
        );
        assert_eq!(player.current_tick(at(origin, 2000)), 0);
    }

    #[test]
    fn test_transpose_never_orphans() {
        let origin = Instant::now();
        let notes = vec![
            NoteEvent::new(0, 60, 100, 0, 960),
            NoteEvent::new(9, 36, 100, 0, 60),
        ];
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.transpose(3);
        player.take_outbox();

        player.tick(origin);
        let sent = player.take_outbox();
        assert!(sent.contains(&SynthMessage::NoteOn { channel: 0, pitch: 63, velocity: 100 }));
        // Percussion is never transposed
        assert!(sent.contains(&SynthMessage::NoteOn { channel: 9, pitch: 36, velocity: 100 }));

        assert_eq!(player.transpose(-5), -2);
        let flushed = player.take_outbox();
        assert!(flushed.contains(&SynthMessage::NoteOff { channel: 0, pitch: 63 }));
        assert_eq!(player.active_note_count(), 0);
    }

    #[test]
    fn test_transpose_clamps_pitch() {
        let origin = Instant::now();
        let notes = vec![NoteEvent::new(0, 120, 100, 0, 480)];
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.transpose(24);
        player.take_outbox();

        player.tick(origin);
        assert_eq!(
            player.take_outbox(),
            vec![SynthMessage::NoteOn { channel: 0, pitch: 127, velocity: 100 }]
        );
    }

    #[test]
    fn test_mute_flushes_channel_and_skips_note_ons() {
        let origin = Instant::now();
        let notes = vec![
            NoteEvent::new(0, 60, 100, 0, 1920),
            NoteEvent::new(1, 40, 100, 0, 1920),
            NoteEvent::new(1, 43, 100, 960, 480),
        ];
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.tick(origin);
        player.take_outbox();

        assert!(player.toggle_mute(Instrument::Bass));
        assert_eq!(player.take_outbox(), vec![SynthMessage::NoteOff { channel: 1, pitch: 40 }]);

        player.tick(at(origin, 1000));
        assert!(player.take_outbox().is_empty());
        assert_eq!(player.active_note_count(), 1);
        assert!(player.is_muted(Instrument::Bass));
    }

    #[test]
    fn test_seek_moves_cursor() {
        let origin = Instant::now();
        let notes: Vec<NoteEvent> = (0..4)
            .map(|bar| NoteEvent::new(0, 60 + bar as i32, 100, bar * 1920, 960))
            .collect();
        let mut player = Player::new(&arrangement(notes, 4 * 1920));
        player.start(origin);
        player.tick(origin);
        player.take_outbox();

        assert_eq!(player.seek(2, origin), 2);
        assert_eq!(player.take_outbox(), vec![SynthMessage::NoteOff { channel: 0, pitch: 60 }]);
        player.tick(origin);
        assert_eq!(
            player.take_outbox(),
            vec![SynthMessage::NoteOn { channel: 0, pitch: 62, velocity: 100 }]
        );

        assert_eq!(player.seek(-10, at(origin, 100)), 0);
        assert_eq!(player.seek(99, at(origin, 100)), 3);
    }

    #[test]
    fn test_playback_state() {
        let origin = Instant::now();
        let mut player = Player::new(&arrangement(Vec::new(), 4 * 1920));
        player.start(origin);

        // 2.5s at 120 BPM = 2400 ticks: bar 2, beat 2, third sixteenth
        let state = player.playback_state(at(origin, 2500));
        assert_eq!(state.bar, 2);
        assert_eq!(state.beat, 2);
        assert_eq!(state.strum, 2);
        assert_eq!(state.capo, 2);
        assert_eq!(state.total_bars, 4);
        assert!(!state.paused);

        player.pause(at(origin, 2500));
        assert!(player.playback_state(at(origin, 9000)).paused);
    }

    #[test]
    fn test_abandon_drops_everything() {
        let origin = Instant::now();
        let notes = vec![NoteEvent::new(0, 60, 100, 0, 480)];
        let mut player = Player::new(&arrangement(notes, 1920));
        player.start(origin);
        player.tick(origin);

        player.abandon(origin);
        assert!(player.take_outbox().is_empty());
        assert_eq!(player.active_note_count(), 0);
        assert_eq!(player.state(), TransportState::Stopped);
    }
}
