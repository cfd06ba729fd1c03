// Recording synth - keeps every message in memory

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{PlaybackError, PlaybackResult, Synth, SynthMessage};

/// In-memory synth
///
/// Clones share the same log, so one handle can be given to a playback
/// session while another inspects what was sent.
#[derive(Debug, Clone, Default)]
pub struct RecordingSynth {
    log: Arc<Mutex<Vec<SynthMessage>>>,
    closed: Arc<AtomicBool>,
    /// Fail every message once this many have been recorded
    fail_after: Option<usize>,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// A synth that reports itself gone after `count` messages
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    /// Copy of everything recorded so far
    pub fn messages(&self) -> Vec<SynthMessage> {
        self.log.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// (channel, pitch) pairs with more note-ons than note-offs in the log
    pub fn sounding(&self) -> Vec<(u8, u8)> {
        let mut open: BTreeMap<(u8, u8), i64> = BTreeMap::new();
        for message in self.messages() {
            match message {
                SynthMessage::NoteOn { channel, pitch, .. } => {
                    *open.entry((channel, pitch)).or_default() += 1;
                }
                SynthMessage::NoteOff { channel, pitch } => {
                    *open.entry((channel, pitch)).or_default() -= 1;
                }
                _ => {}
            }
        }
        open.into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(key, _)| key)
            .collect()
    }

    fn record(&self, message: SynthMessage) -> PlaybackResult<()> {
        let mut log = self.log.lock().unwrap_or_else(|p| p.into_inner());
        if self.fail_after.is_some_and(|limit| log.len() >= limit) {
            return Err(PlaybackError::SynthExited("recording synth went away".to_string()));
        }
        log.push(message);
        Ok(())
    }
}

impl Synth for RecordingSynth {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> PlaybackResult<()> {
        self.record(SynthMessage::NoteOn { channel, pitch, velocity })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> PlaybackResult<()> {
        self.record(SynthMessage::NoteOff { channel, pitch })
    }

    fn program_change(&mut self, channel: u8, program: u8) -> PlaybackResult<()> {
        self.record(SynthMessage::ProgramChange { channel, program })
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> PlaybackResult<()> {
        self.record(SynthMessage::ControlChange { channel, controller, value })
    }

    fn close(&mut self, _timeout: Duration) -> PlaybackResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
