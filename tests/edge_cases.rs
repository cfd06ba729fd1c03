//! Edge case tests and robustness validation
//!
//! Degenerate inputs must be clamped or ignored, never panic or produce
//! unbalanced note streams.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jamtrack::messaging::{NotificationCategory, NotificationLevel};
use jamtrack::rhythm::strum;
use jamtrack::track::{
    ChordShape, DrumConfig, MAX_REPEAT, MAX_TRACK_BARS, RhythmConfig, expand_pattern, total_ticks,
};
use jamtrack::{
    Arrangement, Chord, EuclideanSpec, Instrument, ManualClock, PlaybackError, PlaybackSession,
    Player, ProcessSynth, RecordingSynth, SessionOptions, SynthMessage, Tempo, Track, TrackError,
    euclidean,
};

/// Euclidean patterns at and beyond their limits
#[test]
fn test_euclidean_extremes() {
    assert_eq!(euclidean(0, 8, 3), vec![false; 8]);
    assert_eq!(euclidean(8, 8, 5), vec![true; 8]);
    assert_eq!(euclidean(12, 8, 0), vec![true; 8]);
    assert_eq!(euclidean(-3, 8, 0), vec![false; 8]);
    assert!(euclidean(3, 0, 0).is_empty());

    assert_eq!(euclidean(3, 8, 8), euclidean(3, 8, 0));
    assert_eq!(euclidean(3, 8, -1), euclidean(3, 8, 7));
    assert_eq!(EuclideanSpec::new(3, 8, 0).to_string(), "x..x..x.");
}

/// Zero, negative and unreadable chord lengths
#[test]
fn test_degenerate_chord_durations() {
    let chords = expand_pattern("C*0 D*-1 E*nan F*abc", 1.0, 1);
    let ticks: Vec<u64> = chords.iter().map(Chord::ticks).collect();
    assert_eq!(ticks, vec![960, 960, 960, 1920]);

    assert_eq!(Chord::new("G", f64::INFINITY).ticks(), 960);
    assert_eq!(Chord::new("G", 0.25).ticks(), 960);
}

/// Absurd lengths are bounded instead of overflowing the tick grid
#[test]
fn test_huge_chord_lengths() {
    let track = Track::from_json_str(
        r#"{"chords": [{"symbol": "C", "bars": 1e16}, {"symbol": "G", "bars": 1e16}]}"#,
    )
    .expect("parses");

    let chords = track.chords();
    assert_eq!(chords[0].bars, MAX_TRACK_BARS);
    assert_eq!(total_ticks(&chords), 2 * 10_000 * 1920);
    assert!(matches!(track.validate(), Err(TrackError::Invalid(_))));
    assert!(matches!(Arrangement::build(&track, 0), Err(TrackError::Invalid(_))));

    let huge = [Chord::new("C", 1e300), Chord::new("G", 1e300)];
    assert_eq!(total_ticks(&huge), 2 * 10_000 * 1920);

    let mut repeated = Track::new("C", 120.0, "C F G C");
    repeated.repeat = u32::MAX;
    assert!(matches!(repeated.validate(), Err(TrackError::Invalid(_))));
    assert_eq!(repeated.chords().len(), 4 * MAX_REPEAT as usize);
    assert_eq!(expand_pattern("C", 1.0, u32::MAX).len(), MAX_REPEAT as usize);
}

#[test]
fn test_unknown_chord_quality_is_major() {
    let shape = ChordShape::parse("Cwhatever").expect("root is readable");
    assert_eq!(shape.pitch_classes(), vec![0, 4, 7]);

    assert!(ChordShape::parse("N.C.").is_none());
    assert!(ChordShape::parse("").is_none());
    assert!(ChordShape::parse("x7").is_none());
}

#[test]
fn test_no_chord_bars_are_silent() {
    let mut track = Track::new("C", 120.0, "C N.C. C");
    track.drums = None;
    let arrangement = Arrangement::build(&track, 0).expect("arranges");

    assert!(arrangement
        .notes
        .iter()
        .all(|n| !(1920..3840).contains(&n.start_tick)));
    assert_eq!(arrangement.total_bars(), 3);
}

/// Unknown strum symbols are rests
#[test]
fn test_malformed_strum_characters() {
    let config = RhythmConfig {
        pattern: Some("D?z!".to_string()),
        ..RhythmConfig::default()
    };
    let notes = strum::generate(&[Chord::new("C", 1.0)], &config, 1920);

    assert!(!notes.is_empty());
    assert!(notes.iter().all(|n| n.start_tick < 480));
}

#[test]
fn test_silent_drums() {
    let config = DrumConfig {
        intensity: 0.0,
        ..DrumConfig::default()
    };
    let chords = [Chord::new("C", 2.0)];
    assert!(jamtrack::rhythm::drums::generate(&chords, &config, 1920).is_empty());

    let config = DrumConfig {
        style: Some("no_such_groove".to_string()),
        crash_on_start: false,
        ..DrumConfig::default()
    };
    assert!(jamtrack::rhythm::drums::generate(&chords, &config, 1920).is_empty());
}

#[test]
fn test_tempo_extremes() {
    assert_eq!(Tempo::new(5.0).bpm(), Tempo::MIN_BPM);
    assert_eq!(Tempo::new(5_000.0).bpm(), Tempo::MAX_BPM);
    assert_eq!(Tempo::new(f64::NAN).bpm(), Tempo::DEFAULT_BPM);
    assert_eq!(Tempo::new(120.0).offset_by(-1_000.0).bpm(), Tempo::MIN_BPM);
}

#[test]
fn test_invalid_tracks() {
    let empty = Track::new("C", 120.0, "   |  | ");
    assert!(matches!(Arrangement::build(&empty, 0), Err(TrackError::Invalid(_))));

    let bad_key = Track::new("H#", 120.0, "C");
    assert!(matches!(bad_key.validate(), Err(TrackError::Invalid(_))));

    let bad_tempo = Track::new("C", -4.0, "C");
    assert!(matches!(bad_tempo.validate(), Err(TrackError::Invalid(_))));

    assert!(matches!(Track::from_ron_str("(tempo: \"fast\")"), Err(TrackError::RonParse(_))));
    assert!(matches!(Track::from_json_str("{"), Err(TrackError::Json(_))));

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("track.yaml");
    std::fs::write(&path, "title: nope").expect("writes");
    assert!(matches!(Track::load(&path), Err(TrackError::UnsupportedFormat(_))));
    assert!(matches!(
        Track::load(&dir.path().join("missing.ron")),
        Err(TrackError::Io(_))
    ));
}

/// Extreme transposition clamps instead of wrapping
#[test]
fn test_transpose_to_the_edges() {
    let track = Track::new("C", 120.0, "C");
    let arrangement = Arrangement::build(&track, 0).expect("arranges");
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    let mut synth = RecordingSynth::new();

    player.start(origin);
    player.transpose(-500);
    common::drive(
        &mut player,
        &mut synth,
        origin,
        Duration::ZERO,
        Duration::from_millis(2_100),
        Duration::from_millis(5),
    );

    let messages = synth.messages();
    common::assert_well_formed(&messages);
    assert!(messages.iter().all(|m| match m {
        SynthMessage::NoteOn { channel: 0 | 1, pitch, .. } => *pitch == 0,
        _ => true,
    }));
    assert!(synth.sounding().is_empty());
}

#[test]
fn test_controls_before_start() {
    let track = Track::new("C", 120.0, "C F");
    let arrangement = Arrangement::build(&track, 0).expect("arranges");
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);

    assert!(!player.pause(origin));
    assert!(!player.resume(origin));
    assert_eq!(player.seek(5, origin), 1);
    player.toggle_mute(Instrument::Bass);
    player.tick(origin);
    assert!(player.take_outbox().is_empty());
    assert!(player.state().is_stopped());
}

#[test]
fn test_missing_synth_program() {
    let result = ProcessSynth::spawn("jamtrack-definitely-missing-synth", &["-n".to_string()]);
    assert!(matches!(result, Err(PlaybackError::SynthUnavailable { .. })));
}

/// A synth dying mid-playback stops the session and reports the error
#[test]
fn test_synth_dies_mid_playback() {
    let track = Track::new("C", 120.0, "C F G C");
    let arrangement = Arrangement::build(&track, 0).expect("arranges");
    let clock = ManualClock::new();
    let synth = RecordingSynth::failing_after(12);
    let observer = synth.clone();

    let mut session = PlaybackSession::start_with_clock(
        &arrangement,
        Box::new(synth),
        SessionOptions::default(),
        Arc::new(clock.clone()),
    )
    .expect("starts");

    let deadline = Instant::now() + Duration::from_secs(5);
    while session.is_running() {
        assert!(Instant::now() < deadline, "synth failure not detected");
        clock.advance(Duration::from_millis(20));
        thread::sleep(Duration::from_millis(2));
    }

    assert!(session.is_finished());
    assert_eq!(observer.messages().len(), 12);
    assert!(matches!(session.transpose(1), Err(PlaybackError::SessionStopped)));

    let notifications = session.take_notifications();
    assert!(notifications.iter().any(|n| {
        n.level == NotificationLevel::Error && n.category == NotificationCategory::Synth
    }));
    assert!(matches!(session.stop(), Err(PlaybackError::SynthExited(_))));
    // Second stop is a no-op
    assert!(session.stop().is_ok());
}
