// Process synth - writes the line protocol to a child process's stdin

use std::io::{self, BufWriter, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{PlaybackError, PlaybackResult, Synth, SynthMessage};

/// How often `close` polls the child for exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Synth speaking the text protocol over any writer
pub struct TextSynth<W: Write + Send> {
    writer: W,
    closed: bool,
}

impl<W: Write + Send> TextSynth<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, closed: false }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_message(&mut self, message: &SynthMessage) -> PlaybackResult<()> {
        if self.closed {
            return Err(PlaybackError::SessionStopped);
        }
        writeln!(self.writer, "{}", message)?;
        Ok(())
    }
}

impl<W: Write + Send> Synth for TextSynth<W> {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> PlaybackResult<()> {
        self.write_message(&SynthMessage::NoteOn { channel, pitch, velocity })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> PlaybackResult<()> {
        self.write_message(&SynthMessage::NoteOff { channel, pitch })
    }

    fn program_change(&mut self, channel: u8, program: u8) -> PlaybackResult<()> {
        self.write_message(&SynthMessage::ProgramChange { channel, program })
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> PlaybackResult<()> {
        self.write_message(&SynthMessage::ControlChange { channel, controller, value })
    }

    fn flush(&mut self) -> PlaybackResult<()> {
        if !self.closed {
            self.writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self, _timeout: Duration) -> PlaybackResult<()> {
        if self.closed {
            return Ok(());
        }
        self.write_message(&SynthMessage::Quit)?;
        self.writer.flush()?;
        self.closed = true;
        Ok(())
    }
}

/// External synthesizer process (fluidsynth by default)
pub struct ProcessSynth {
    command: String,
    child: Child,
    text: Option<TextSynth<BufWriter<ChildStdin>>>,
}

impl ProcessSynth {
    /// Spawn `program` with `args`, piping the protocol into its stdin
    pub fn spawn(program: &str, args: &[String]) -> PlaybackResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::SynthUnavailable {
                command: program.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PlaybackError::SynthExited(format!("{} has no stdin", program)))?;

        info!("Started synth '{}' (pid {})", program, child.id());

        Ok(Self {
            command: program.to_string(),
            child,
            text: Some(TextSynth::new(BufWriter::new(stdin))),
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn forward(&mut self, message: SynthMessage) -> PlaybackResult<()> {
        let text = self.text.as_mut().ok_or(PlaybackError::SessionStopped)?;
        text.send(&message).map_err(|e| self.exited_error(e))
    }

    /// Broken pipes mean the child went away
    fn exited_error(&mut self, error: PlaybackError) -> PlaybackError {
        match error {
            PlaybackError::SynthIo(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                let status = self
                    .child
                    .try_wait()
                    .ok()
                    .flatten()
                    .map(|status| status.to_string())
                    .unwrap_or_else(|| "closed its input".to_string());
                PlaybackError::SynthExited(format!("{}: {}", self.command, status))
            }
            other => other,
        }
    }
}

impl Synth for ProcessSynth {
    fn note_on(&mut self, channel: u8, pitch: u8, velocity: u8) -> PlaybackResult<()> {
        self.forward(SynthMessage::NoteOn { channel, pitch, velocity })
    }

    fn note_off(&mut self, channel: u8, pitch: u8) -> PlaybackResult<()> {
        self.forward(SynthMessage::NoteOff { channel, pitch })
    }

    fn program_change(&mut self, channel: u8, program: u8) -> PlaybackResult<()> {
        self.forward(SynthMessage::ProgramChange { channel, program })
    }

    fn control_change(&mut self, channel: u8, controller: u8, value: u8) -> PlaybackResult<()> {
        self.forward(SynthMessage::ControlChange { channel, controller, value })
    }

    fn flush(&mut self) -> PlaybackResult<()> {
        let text = self.text.as_mut().ok_or(PlaybackError::SessionStopped)?;
        text.flush().map_err(|e| self.exited_error(e))
    }

    /// Send `quit`, close stdin, wait up to `timeout`, then kill
    fn close(&mut self, timeout: Duration) -> PlaybackResult<()> {
        let Some(mut text) = self.text.take() else {
            return Ok(());
        };
        if let Err(e) = text.close(timeout) {
            debug!("Synth '{}' did not take quit: {}", self.command, e);
        }
        drop(text);

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait()? {
                info!("Synth '{}' exited with {}", self.command, status);
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }

        warn!(
            "Synth '{}' still running after {:?}, terminating",
            self.command, timeout
        );
        self.child.kill()?;
        self.child.wait()?;
        Ok(())
    }
}

impl Drop for ProcessSynth {
    fn drop(&mut self) {
        if self.text.is_some() {
            if let Err(e) = self.close(Duration::from_millis(200)) {
                warn!("Failed to close synth '{}': {}", self.command, e);
            }
        }
    }
}
