// Command types - keyboard controls for a running playback

use crate::sequencer::note::Instrument;

/// BPM change for one `t+`/`t-`
pub const TEMPO_STEP_BPM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    TogglePause,
    Seek(i64),
    Transpose(i32),
    AdjustTempo(f64),
    ToggleMute(Instrument),
    Quit,
}

impl Command {
    /// Parse one control line
    ///
    /// `p` pause/resume, `>`/`<` seek a bar (`>4` seeks four), `]`/`[` transpose
    /// a semitone, `t+`/`t-` tempo, `m1`..`m4` mute chords/bass/drums/melody, `q` quit.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut chars = line.chars();
        let head = chars.next()?;
        let rest = chars.as_str().trim();
        let count = || -> Option<i64> {
            if rest.is_empty() {
                Some(1)
            } else {
                rest.parse::<i64>().ok()
            }
        };

        match head {
            'p' if rest.is_empty() => Some(Command::TogglePause),
            'q' if rest.is_empty() => Some(Command::Quit),
            '>' => count().map(Command::Seek),
            '<' => count().map(|n| Command::Seek(-n)),
            ']' => count().map(|n| Command::Transpose(n.clamp(-127, 127) as i32)),
            '[' => count().map(|n| Command::Transpose(-n.clamp(-127, 127) as i32)),
            't' => match rest {
                "+" => Some(Command::AdjustTempo(TEMPO_STEP_BPM)),
                "-" => Some(Command::AdjustTempo(-TEMPO_STEP_BPM)),
                _ => None,
            },
            'm' => {
                let track: usize = rest.parse().ok()?;
                Instrument::from_index(track.checked_sub(1)?).map(Command::ToggleMute)
            }
            _ => None,
        }
    }
}
