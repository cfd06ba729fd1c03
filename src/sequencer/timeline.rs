// Timeline - Tick grid and musical time representation
// Handles conversion between bars, ticks and wall-clock time (4/4 only)

use std::fmt;
use std::time::Duration;

/// Absolute position on the tick grid
pub type Tick = u64;

/// Ticks per quarter note (PPQN - Pulses Per Quarter Note)
/// Standard MIDI resolution
pub const TICKS_PER_QUARTER: Tick = 480;

/// Quarter notes per bar on the fixed 4/4 grid
pub const BEATS_PER_BAR: Tick = 4;

/// Ticks per bar (4/4)
pub const TICKS_PER_BAR: Tick = TICKS_PER_QUARTER * BEATS_PER_BAR;

/// Nanoseconds per minute, scaled by 1000 to match milli-BPM
const NANOS_PER_MINUTE_MILLI: u128 = 60_000_000_000 * 1000;

/// Convert a (possibly fractional) bar count to ticks
///
/// `ticks_for_bars(1.5) == 2880`. Negative and non-finite inputs yield 0.
pub fn ticks_for_bars(bars: f64) -> Tick {
    if !bars.is_finite() || bars <= 0.0 {
        return 0;
    }
    (bars * TICKS_PER_BAR as f64).round() as Tick
}

/// Zero-based bar index containing `tick`
pub fn bar_of(tick: Tick) -> u64 {
    tick / TICKS_PER_BAR
}

/// One-based beat within the bar containing `tick`
pub fn beat_of(tick: Tick) -> u8 {
    ((tick % TICKS_PER_BAR) / TICKS_PER_QUARTER) as u8 + 1
}

/// Number of bars needed to cover `ticks`, rounded up
pub fn bars_spanned(ticks: Tick) -> u32 {
    ticks.div_ceil(TICKS_PER_BAR) as u32
}

/// Tempo in BPM (quarter notes per minute)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;
    pub const DEFAULT_BPM: f64 = 120.0;

    /// Creates a new tempo
    /// BPM is clamped to [20.0, 999.0]; non-finite values fall back to 120
    pub fn new(bpm: f64) -> Self {
        let bpm = if bpm.is_finite() {
            bpm.clamp(Self::MIN_BPM, Self::MAX_BPM)
        } else {
            Self::DEFAULT_BPM
        };
        Self { bpm }
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Tempo shifted by `delta_bpm`, clamped to the valid range
    pub fn offset_by(&self, delta_bpm: f64) -> Self {
        Self::new(self.bpm + delta_bpm)
    }

    fn milli_bpm(&self) -> u128 {
        (self.bpm * 1000.0).round() as u128
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Wall-clock length of a single tick: 60s / bpm / 480, rounded up to the nanosecond
    pub fn tick_duration(&self) -> Duration {
        self.duration_for_ticks(1)
    }

    /// Microseconds per quarter note (MIDI set-tempo meta value)
    pub fn micros_per_quarter(&self) -> u32 {
        (60_000_000.0 / self.bpm).round() as u32
    }

    /// Convert elapsed nanoseconds to a tick, truncating toward the earlier tick
    pub fn ticks_for_nanos(&self, nanos: u128) -> Tick {
        let ticks = nanos * self.milli_bpm() * TICKS_PER_QUARTER as u128 / NANOS_PER_MINUTE_MILLI;
        ticks.min(Tick::MAX as u128) as Tick
    }

    /// Convert an elapsed wall-clock duration to a tick
    pub fn ticks_for_duration(&self, elapsed: Duration) -> Tick {
        self.ticks_for_nanos(elapsed.as_nanos())
    }

    /// Earliest instant (in nanoseconds) at which `ticks` has been reached
    ///
    /// Rounds up, so `ticks_for_nanos(nanos_for_ticks(t)) == t` for every `t`.
    pub fn nanos_for_ticks(&self, ticks: Tick) -> u128 {
        let denominator = self.milli_bpm() * TICKS_PER_QUARTER as u128;
        (ticks as u128 * NANOS_PER_MINUTE_MILLI).div_ceil(denominator)
    }

    /// Wall-clock duration from tick 0 to `ticks`
    pub fn duration_for_ticks(&self, ticks: Tick) -> Duration {
        let nanos = self.nanos_for_ticks(ticks).min(u64::MAX as u128) as u64;
        Duration::from_nanos(nanos)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BPM)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// Musical time representation
/// Represents a position in the timeline using bars, beats, and ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MusicalTime {
    pub bar: u32,  // Bar number (1-based)
    pub beat: u8,  // Beat within bar (1-based)
    pub tick: u16, // Tick within beat (0-based)
}

impl MusicalTime {
    /// Creates a new musical time position
    pub fn new(bar: u32, beat: u8, tick: u16) -> Self {
        Self { bar, beat, tick }
    }

    /// Zero position (bar 1, beat 1, tick 0)
    pub fn zero() -> Self {
        Self::new(1, 1, 0)
    }

    /// Convert to total ticks from start
    pub fn to_total_ticks(&self) -> Tick {
        let bar_0 = self.bar.saturating_sub(1) as Tick;
        let beat_0 = self.beat.saturating_sub(1) as Tick;

        bar_0 * TICKS_PER_BAR + beat_0 * TICKS_PER_QUARTER + self.tick as Tick
    }

    /// Create from total ticks
    pub fn from_total_ticks(total_ticks: Tick) -> Self {
        let bar = (total_ticks / TICKS_PER_BAR) + 1; // 1-based
        let remaining_after_bars = total_ticks % TICKS_PER_BAR;
        let beat = (remaining_after_bars / TICKS_PER_QUARTER) + 1; // 1-based
        let tick = remaining_after_bars % TICKS_PER_QUARTER;

        Self::new(bar as u32, beat as u8, tick as u16)
    }
}

impl Default for MusicalTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for MusicalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}:{:03}", self.bar, self.beat, self.tick)
    }
}
