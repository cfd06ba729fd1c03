// Playback session - runs the player on a dedicated tick thread
//
// Control calls lock the player, mutate it and return; the tick thread is the
// only owner of the synth and writes the queued messages after unlocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ringbuf::traits::{Consumer, Producer};
use tracing::{debug, error, info, warn};

use crate::messaging::{
    Notification, NotificationCategory, NotificationConsumer, NotificationProducer,
    create_notification_channel,
};
use crate::sequencer::arrangement::Arrangement;
use crate::sequencer::clock::{Clock, SystemClock};
use crate::sequencer::note::Instrument;
use crate::sequencer::player::{PlaybackState, Player};
use crate::sequencer::timeline::Tempo;
use crate::sequencer::transport::TransportState;
use crate::synth::{PlaybackError, PlaybackResult, Synth, SynthMessage};

/// Upper bound for the tick interval
pub const MAX_TICK_INTERVAL: Duration = Duration::from_millis(5);

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Sleep between ticks, at most `MAX_TICK_INTERVAL`
    pub tick_interval: Duration,
    /// How long the synth gets to exit on stop
    pub stop_timeout: Duration,
    pub looping: bool,
    pub notification_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(2),
            stop_timeout: Duration::from_secs(2),
            looping: false,
            notification_capacity: 64,
        }
    }
}

fn lock(player: &Mutex<Player>) -> MutexGuard<'_, Player> {
    player.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Read-only view of a running session, usable from any thread
#[derive(Clone)]
pub struct PlaybackMonitor {
    player: Arc<Mutex<Player>>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
}

impl PlaybackMonitor {
    pub fn playback_state(&self) -> PlaybackState {
        lock(&self.player).playback_state(self.clock.now())
    }

    /// True while the tick thread is alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// A playback in progress
pub struct PlaybackSession {
    player: Arc<Mutex<Player>>,
    clock: Arc<dyn Clock>,
    stop_flag: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    notifications: NotificationConsumer,
    tick_interval: Duration,
    handle: Option<JoinHandle<PlaybackResult<()>>>,
}

impl PlaybackSession {
    /// Start playing on the wall clock
    pub fn start(
        arrangement: &Arrangement,
        synth: Box<dyn Synth>,
        options: SessionOptions,
    ) -> PlaybackResult<Self> {
        Self::start_with_clock(arrangement, synth, options, Arc::new(SystemClock))
    }

    /// Start playing on a caller-supplied clock
    pub fn start_with_clock(
        arrangement: &Arrangement,
        synth: Box<dyn Synth>,
        options: SessionOptions,
        clock: Arc<dyn Clock>,
    ) -> PlaybackResult<Self> {
        let tick_interval = options
            .tick_interval
            .clamp(Duration::from_millis(1), MAX_TICK_INTERVAL);

        let mut player = Player::new(arrangement).with_looping(options.looping);
        player.start(clock.now());
        let player = Arc::new(Mutex::new(player));

        let (notification_tx, notification_rx) =
            create_notification_channel(options.notification_capacity);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));

        let tick_loop = TickLoop {
            player: Arc::clone(&player),
            synth,
            clock: Arc::clone(&clock),
            stop_flag: Arc::clone(&stop_flag),
            running: Arc::clone(&running),
            notifications: notification_tx,
            tick_interval,
            stop_timeout: options.stop_timeout,
        };

        let handle = thread::Builder::new()
            .name("jamtrack-tick".to_string())
            .spawn(move || tick_loop.run())?;

        info!(
            "Playing '{}' ({} ms tick)",
            arrangement.title,
            tick_interval.as_millis()
        );

        Ok(Self {
            player,
            clock,
            stop_flag,
            running,
            notifications: notification_rx,
            tick_interval,
            handle: Some(handle),
        })
    }

    /// Run `f` on the player under the lock; fails once the tick thread is gone
    fn control<T>(&self, f: impl FnOnce(&mut Player, Instant) -> T) -> PlaybackResult<T> {
        if !self.is_running() {
            return Err(PlaybackError::SessionStopped);
        }
        let mut player = lock(&self.player);
        Ok(f(&mut player, self.clock.now()))
    }

    pub fn pause(&self) -> PlaybackResult<bool> {
        self.control(|player, now| player.pause(now))
    }

    pub fn resume(&self) -> PlaybackResult<bool> {
        self.control(|player, now| player.resume(now))
    }

    pub fn toggle_pause(&self) -> PlaybackResult<TransportState> {
        self.control(|player, now| player.toggle_pause(now))
    }

    /// Jump by whole bars; returns the one-based bar landed on
    pub fn seek(&self, delta_bars: i64) -> PlaybackResult<u32> {
        self.control(|player, now| player.seek(delta_bars, now) + 1)
    }

    pub fn transpose(&self, semitones: i32) -> PlaybackResult<i32> {
        self.control(|player, _| player.transpose(semitones))
    }

    pub fn toggle_mute(&self, instrument: Instrument) -> PlaybackResult<bool> {
        self.control(|player, _| player.toggle_mute(instrument))
    }

    pub fn adjust_tempo(&self, delta_bpm: f64) -> PlaybackResult<Tempo> {
        self.control(|player, now| player.adjust_tempo(delta_bpm, now))
    }

    pub fn playback_state(&self) -> PlaybackState {
        lock(&self.player).playback_state(self.clock.now())
    }

    pub fn transpose_semitones(&self) -> i32 {
        lock(&self.player).transpose_semitones()
    }

    pub fn is_muted(&self, instrument: Instrument) -> bool {
        lock(&self.player).is_muted(instrument)
    }

    pub fn capo(&self) -> u8 {
        lock(&self.player).capo()
    }

    pub fn tempo_offset_bpm(&self) -> f64 {
        lock(&self.player).tempo_offset_bpm()
    }

    pub fn monitor(&self) -> PlaybackMonitor {
        PlaybackMonitor {
            player: Arc::clone(&self.player),
            clock: Arc::clone(&self.clock),
            running: Arc::clone(&self.running),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Reached the end (and not looping), or the tick thread is gone
    pub fn is_finished(&self) -> bool {
        !self.is_running() || lock(&self.player).state().is_stopped()
    }

    /// Drain pending notifications
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Some(notification) = self.notifications.try_pop() {
            drained.push(notification);
        }
        drained
    }

    /// Release every note, end the tick thread and close the synth
    ///
    /// Returns the error that ended playback, if any. Calling it again is a no-op.
    pub fn stop(&mut self) -> PlaybackResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.stop_flag.store(true, Ordering::Release);
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                self.running.store(false, Ordering::Release);
                error!("Tick thread panicked");
                Err(PlaybackError::TickLoopPanicked)
            }
        }
    }

    /// Block until playback ends on its own, then stop
    ///
    /// Never returns while looping unless the synth fails.
    pub fn wait(&mut self) -> PlaybackResult<()> {
        while !self.is_finished() {
            thread::sleep(self.tick_interval);
        }
        self.stop()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Playback ended with error: {}", e);
        }
    }
}

/// State owned by the tick thread
struct TickLoop {
    player: Arc<Mutex<Player>>,
    synth: Box<dyn Synth>,
    clock: Arc<dyn Clock>,
    stop_flag: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    notifications: NotificationProducer,
    tick_interval: Duration,
    stop_timeout: Duration,
}

impl TickLoop {
    fn run(mut self) -> PlaybackResult<()> {
        let mut outcome = self.drive();

        if let Err(e) = self.synth.close(self.stop_timeout) {
            warn!("Failed to close synth: {}", e);
            if outcome.is_ok() {
                outcome = Err(e);
            }
        }
        self.running.store(false, Ordering::Release);
        debug!("Tick thread exiting");
        outcome
    }

    fn drive(&mut self) -> PlaybackResult<()> {
        let mut last_state = TransportState::Playing;

        loop {
            let stopping = self.stop_flag.load(Ordering::Acquire);

            let (batch, state) = {
                let mut player = lock(&self.player);
                let now = self.clock.now();
                if stopping {
                    player.stop(now);
                } else {
                    player.tick(now);
                }
                (player.take_outbox(), player.state())
            };

            if let Err(e) = self.send(&batch) {
                error!("Synth failed, stopping playback: {}", e);
                lock(&self.player).abandon(self.clock.now());
                self.notify(Notification::error(NotificationCategory::Synth, e.to_string()));
                return Err(e);
            }

            if stopping {
                return Ok(());
            }

            if state != last_state {
                if state.is_stopped() {
                    self.notify(Notification::info(
                        NotificationCategory::Playback,
                        "Reached the end of the track".to_string(),
                    ));
                }
                last_state = state;
            }

            thread::sleep(self.tick_interval);
        }
    }

    fn send(&mut self, batch: &[SynthMessage]) -> PlaybackResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        for message in batch {
            self.synth.send(message)?;
        }
        self.synth.flush()
    }

    fn notify(&mut self, notification: Notification) {
        if self.notifications.try_push(notification).is_err() {
            debug!("Notification queue full, dropping");
        }
    }
}
