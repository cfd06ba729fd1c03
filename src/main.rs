use std::error::Error;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use ringbuf::traits::{Consumer, Producer};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use jamtrack::messaging::{
    Command, CommandProducer, NotificationLevel, create_command_channel,
};
use jamtrack::sequencer::PlaybackMonitor;
use jamtrack::sequencer::note::pitch_name;
use jamtrack::{
    Arrangement, EngineConfig, EuclideanSpec, Instrument, MusicalTime, PlaybackResult,
    PlaybackSession, PlaybackState, ProcessSynth, Track,
};

// Keyboard commands are typed by hand, a small ring is plenty
const COMMAND_RINGBUFFER_CAPACITY: usize = 64;
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(50);

type CliResult<T = ()> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "jamtrack", version, about = "Backing tracks from chord progressions")]
struct Cli {
    /// Engine config file (RON); defaults to the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Play a track through the synth, with keyboard controls
    Play(PlayArgs),
    /// Print the generated notes
    Events(EventsArgs),
    /// Write the arrangement as delta-timed JSON tracks
    Export(ExportArgs),
    /// Print a Euclidean rhythm
    Euclid(EuclidArgs),
}

#[derive(Debug, Args)]
struct TrackArgs {
    /// Track file (.ron or .json)
    track: PathBuf,

    /// Melody seed; drawn at random when absent
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct PlayArgs {
    #[command(flatten)]
    track: TrackArgs,

    /// Synth program (overrides the config)
    #[arg(long)]
    synth: Option<String>,

    /// SoundFont passed to the synth
    #[arg(long)]
    soundfont: Option<PathBuf>,

    /// Start over at the end
    #[arg(long = "loop")]
    looping: bool,
}

#[derive(Debug, Args)]
struct EventsArgs {
    #[command(flatten)]
    track: TrackArgs,

    /// Only this instrument (chords, bass, drums, melody)
    #[arg(long, value_parser = parse_instrument)]
    instrument: Option<Instrument>,

    /// Print the flattened note-on/note-off stream instead
    #[arg(long)]
    raw: bool,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    track: TrackArgs,

    /// Output file; stdout when absent
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct EuclidArgs {
    #[arg(allow_hyphen_values = true)]
    hits: i32,

    steps: u32,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    rotation: i32,
}

fn parse_instrument(name: &str) -> Result<Instrument, String> {
    Instrument::ALL
        .into_iter()
        .find(|instrument| instrument.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown instrument '{}'", name))
}

fn main() -> ExitCode {
    // Logs go to stderr, stdout is for event dumps and the status line
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        CliCommand::Play(args) => play(cli.config.as_deref(), args),
        CliCommand::Events(args) => events(cli.config.as_deref(), args),
        CliCommand::Export(args) => export(cli.config.as_deref(), args),
        CliCommand::Euclid(args) => {
            euclid(args);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_or_default()?,
    };
    Ok(config)
}

fn arrange(args: &TrackArgs, config: &EngineConfig) -> CliResult<Arrangement> {
    let seed = args
        .seed
        .or(config.default_seed)
        .unwrap_or_else(rand::random::<u64>);
    info!("Melody seed {}", seed);

    let track = Track::load(&args.track)?;
    Ok(Arrangement::build(&track, seed)?)
}

fn play(config_path: Option<&Path>, args: PlayArgs) -> CliResult {
    let mut config = load_config(config_path)?;
    if let Some(synth) = args.synth {
        config.synth_command = synth;
    }
    if args.soundfont.is_some() {
        config.soundfont = args.soundfont;
    }
    config.loop_playback |= args.looping;

    let arrangement = arrange(&args.track, &config)?;
    let synth = ProcessSynth::spawn(&config.synth_command, &config.synth_arguments())?;
    let mut session =
        PlaybackSession::start(&arrangement, Box::new(synth), config.session_options())?;

    println!("=== {} ===", arrangement.title);
    println!("p pause | < > seek | [ ] transpose | t+ t- tempo | m1-m4 mute | q quit\n");

    let status = spawn_status_thread(session.monitor());
    let (command_tx, mut command_rx) = create_command_channel(COMMAND_RINGBUFFER_CAPACITY);
    spawn_input_thread(command_tx);

    'playback: loop {
        while let Some(command) = command_rx.try_pop() {
            if matches!(command, Command::Quit) {
                break 'playback;
            }
            if let Err(e) = apply(&session, command) {
                debug!("Command ignored: {}", e);
                break 'playback;
            }
        }

        for notification in session.take_notifications() {
            match notification.level {
                NotificationLevel::Info => info!("{}", notification.message),
                NotificationLevel::Error => error!("{}", notification.message),
            }
        }

        if session.is_finished() {
            break;
        }
        thread::sleep(STATUS_POLL_INTERVAL);
    }

    let result = session.stop();
    if status.join().is_err() {
        warn!("Status thread panicked");
    }
    result?;
    Ok(())
}

fn apply(session: &PlaybackSession, command: Command) -> PlaybackResult<()> {
    match command {
        Command::TogglePause => {
            let state = session.toggle_pause()?;
            println!("{:?}", state);
        }
        Command::Seek(bars) => {
            let bar = session.seek(bars)?;
            println!("Bar {}", bar);
        }
        Command::Transpose(semitones) => {
            let total = session.transpose(semitones)?;
            println!("Transpose {:+}", total);
        }
        Command::AdjustTempo(delta) => {
            let tempo = session.adjust_tempo(delta)?;
            println!("Tempo {}", tempo);
        }
        Command::ToggleMute(instrument) => {
            let muted = session.toggle_mute(instrument)?;
            println!("{} {}", instrument, if muted { "muted" } else { "unmuted" });
        }
        Command::Quit => {}
    }
    Ok(())
}

/// Read control lines from stdin until EOF
fn spawn_input_thread(mut command_tx: CommandProducer) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Some(command) => {
                    if command_tx.try_push(command).is_err() {
                        warn!("Command queue full, dropping '{}'", line.trim());
                    }
                }
                None => warn!("Unknown control '{}'", line.trim()),
            }
        }
    });
}

/// Print a status line whenever the bar changes
fn spawn_status_thread(monitor: PlaybackMonitor) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut last_bar = 0;
        while monitor.is_running() {
            let state = monitor.playback_state();
            if state.state.is_playing() && state.bar != last_bar {
                println!("{}", status_line(&state));
                last_bar = state.bar;
            }
            thread::sleep(STATUS_POLL_INTERVAL);
        }
    })
}

fn status_line(state: &PlaybackState) -> String {
    let muted: Vec<&str> = Instrument::ALL
        .into_iter()
        .filter(|instrument| state.muted[instrument.index()])
        .map(Instrument::name)
        .collect();

    let mut line = format!(
        "Bar {:>3}/{}  beat {}  {:.1} BPM",
        state.bar, state.total_bars, state.beat, state.effective_bpm
    );
    if state.tempo_offset != 0.0 {
        line.push_str(&format!(" ({:+.1})", state.tempo_offset));
    }
    if state.transpose != 0 {
        line.push_str(&format!("  transpose {:+}", state.transpose));
    }
    if state.capo != 0 {
        line.push_str(&format!("  capo {}", state.capo));
    }
    if !muted.is_empty() {
        line.push_str(&format!("  muted: {}", muted.join(", ")));
    }
    line
}

fn events(config_path: Option<&Path>, args: EventsArgs) -> CliResult {
    let config = load_config(config_path)?;
    let arrangement = arrange(&args.track, &config)?;

    println!(
        "# {} | {} | {} bars | seed {}",
        arrangement.title,
        arrangement.tempo,
        arrangement.total_bars(),
        arrangement.seed
    );

    let channel = args.instrument.map(Instrument::channel);
    let wanted = |ch: u8| channel.is_none_or(|c| c == ch);

    if args.raw {
        for event in arrangement.events.iter().filter(|e| wanted(e.channel)) {
            println!(
                "{:>7} ch{:<2} {} {:>4} {:>3}",
                event.tick,
                event.channel,
                if event.is_note_on { "on " } else { "off" },
                pitch_name(event.pitch),
                event.velocity
            );
        }
        return Ok(());
    }

    for note in arrangement.notes.iter().filter(|n| wanted(n.channel)) {
        let instrument = Instrument::from_channel(note.channel)
            .map(Instrument::name)
            .unwrap_or("?");
        println!(
            "{}  {:<6} {:>4} vel {:>3} len {:>4}",
            MusicalTime::from_total_ticks(note.start_tick),
            instrument,
            note.note_name(),
            note.velocity,
            note.duration_ticks
        );
    }
    Ok(())
}

fn export(config_path: Option<&Path>, args: ExportArgs) -> CliResult {
    let config = load_config(config_path)?;
    let arrangement = arrange(&args.track, &config)?;
    let json = serde_json::to_string_pretty(&arrangement.export())?;

    match args.output {
        Some(path) => {
            fs::write(&path, json)?;
            info!("Exported '{}' to {}", arrangement.title, path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn euclid(args: EuclidArgs) {
    let spec = EuclideanSpec::new(args.hits, args.steps, args.rotation);
    println!("E({},{},{})  {}", args.hits, args.steps, args.rotation, spec);
}
