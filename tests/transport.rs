//! Transport control tests: pause, seek, transpose, mute and tempo under playback

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use jamtrack::{
    Arrangement, Clock, Instrument, ManualClock, PlaybackSession, Player, RecordingSynth,
    SessionOptions, SynthMessage, Track, TransportState,
};

fn twenty_four_bars() -> Arrangement {
    let mut track = Track::new("E", 120.0, "E7 A7 E7 E7 A7 A7 E7 E7 B7 A7 E7 B7");
    track.repeat = 2;
    Arrangement::build(&track, 11).expect("arranges")
}

fn at(origin: Instant, millis: u64) -> Instant {
    origin + Duration::from_millis(millis)
}

#[test]
fn test_pause_resume_keeps_position() {
    let arrangement = twenty_four_bars();
    let clock = ManualClock::new();
    let mut player = Player::new(&arrangement);
    player.start(clock.now());

    clock.advance(Duration::from_millis(3_333));
    player.tick(clock.now());
    let before = player.current_tick(clock.now());
    assert!(player.pause(clock.now()));
    assert_eq!(player.active_note_count(), 0);

    for pause in [1u64, 250, 90_000] {
        clock.advance(Duration::from_millis(pause));
        assert_eq!(player.current_tick(clock.now()), before);
    }

    assert!(player.resume(clock.now()));
    assert_eq!(player.current_tick(clock.now()), before);
    assert_eq!(player.state(), TransportState::Playing);
}

#[test]
fn test_seek_clamps_to_track() {
    let arrangement = twenty_four_bars();
    assert_eq!(arrangement.total_bars(), 24);

    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    player.start(origin);

    assert_eq!(player.seek(-5, origin), 0);
    assert_eq!(player.playback_state(origin).bar, 1);

    assert_eq!(player.seek(999, origin), 23);
    assert_eq!(player.playback_state(origin).bar, 24);
    assert_eq!(player.current_tick(origin), 23 * 1920);
}

#[test]
fn test_seek_while_paused() {
    let arrangement = twenty_four_bars();
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    player.start(origin);

    player.pause(at(origin, 1000));
    player.seek(4, at(origin, 2000));
    // 1s at 120 BPM is bar 1, four bars on is bar 5 (zero-based 4)
    assert_eq!(player.current_tick(at(origin, 5000)), 4 * 1920);

    player.resume(at(origin, 6000));
    assert_eq!(player.current_tick(at(origin, 6000)), 4 * 1920);
    assert_eq!(player.current_tick(at(origin, 6500)), 4 * 1920 + 480);
}

#[test]
fn test_seek_resumes_with_the_right_events() {
    let arrangement = twenty_four_bars();
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    let mut synth = RecordingSynth::new();
    player.start(origin);
    common::deliver(&mut player, &mut synth);

    player.seek(10, origin);
    synth.clear();
    player.tick(origin);
    common::deliver(&mut player, &mut synth);

    let expected = arrangement
        .notes
        .iter()
        .filter(|n| n.start_tick == 10 * 1920)
        .count();
    assert!(expected > 0);
    assert_eq!(common::note_on_count(&synth.messages()), expected);
}

#[test]
fn test_transpose_changes_never_orphan_notes() {
    let arrangement = twenty_four_bars();
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    let mut synth = RecordingSynth::new();
    player.start(origin);

    let step = Duration::from_millis(5);
    let mut elapsed = Duration::ZERO;
    let mut changes = [7, -3, -30, 130, -127].into_iter().cycle();
    while !player.state().is_stopped() {
        if elapsed.as_millis() % 1_500 == 0 {
            player.transpose(changes.next().unwrap_or(0));
        }
        player.tick(origin + elapsed);
        common::deliver(&mut player, &mut synth);
        elapsed += step;
    }

    let messages = synth.messages();
    common::assert_well_formed(&messages);
    assert!(synth.sounding().is_empty());
    // Percussion keeps its pitches whatever the transposition
    assert!(messages.iter().all(|m| match m {
        SynthMessage::NoteOn { channel: 9, pitch, .. } => (35..=81).contains(pitch),
        _ => true,
    }));
}

#[test]
fn test_mute_silences_one_track() {
    let arrangement = twenty_four_bars();
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    let mut synth = RecordingSynth::new();
    player.start(origin);
    common::drive(
        &mut player,
        &mut synth,
        origin,
        Duration::ZERO,
        Duration::from_millis(1_000),
        Duration::from_millis(5),
    );

    assert!(player.toggle_mute(Instrument::Drums));
    common::deliver(&mut player, &mut synth);
    synth.clear();

    common::drive(
        &mut player,
        &mut synth,
        origin,
        Duration::from_millis(1_005),
        Duration::from_millis(4_000),
        Duration::from_millis(5),
    );
    let messages = synth.messages();
    assert!(!messages
        .iter()
        .any(|m| matches!(m, SynthMessage::NoteOn { channel: 9, .. })));
    assert!(messages
        .iter()
        .any(|m| matches!(m, SynthMessage::NoteOn { channel: 0, .. })));

    assert!(!player.toggle_mute(Instrument::Drums));
    synth.clear();
    common::drive(
        &mut player,
        &mut synth,
        origin,
        Duration::from_millis(4_005),
        Duration::from_millis(6_000),
        Duration::from_millis(5),
    );
    assert!(synth
        .messages()
        .iter()
        .any(|m| matches!(m, SynthMessage::NoteOn { channel: 9, .. })));
}

#[test]
fn test_tempo_change_keeps_position() {
    let arrangement = twenty_four_bars();
    let origin = Instant::now();
    let mut player = Player::new(&arrangement);
    player.start(origin);

    let now = at(origin, 2_000);
    let before = player.current_tick(now);
    let tempo = player.adjust_tempo(-60.0, now);
    assert_eq!(tempo.bpm(), 60.0);
    assert_eq!(player.current_tick(now), before);
    // One second at 60 BPM is one beat
    assert_eq!(player.current_tick(at(origin, 3_000)), before + 480);

    let tempo = player.adjust_tempo(5_000.0, now);
    assert_eq!(tempo.bpm(), 999.0);
    assert_eq!(player.playback_state(now).tempo_offset, 879.0);
}

#[test]
fn test_session_controls() {
    let arrangement = twenty_four_bars();
    let clock = ManualClock::new();
    let recorder = RecordingSynth::new();
    let mut session = PlaybackSession::start_with_clock(
        &arrangement,
        Box::new(recorder.clone()),
        SessionOptions::default(),
        Arc::new(clock.clone()),
    )
    .expect("starts");

    clock.advance(Duration::from_millis(4_100));
    assert_eq!(session.seek(3).expect("running"), 6);
    assert_eq!(session.playback_state().bar, 6);

    assert_eq!(session.toggle_pause().expect("running"), TransportState::Paused);
    clock.advance(Duration::from_secs(30));
    assert_eq!(session.playback_state().bar, 6);
    assert!(session.playback_state().paused);
    assert_eq!(session.toggle_pause().expect("running"), TransportState::Playing);

    assert_eq!(session.transpose(2).expect("running"), 2);
    assert_eq!(session.transpose_semitones(), 2);
    assert!(session.toggle_mute(Instrument::Melody).expect("running"));
    assert!(session.is_muted(Instrument::Melody));
    assert_eq!(session.adjust_tempo(5.0).expect("running").bpm(), 125.0);
    assert_eq!(session.tempo_offset_bpm(), 5.0);
    assert_eq!(session.capo(), 0);

    let monitor = session.monitor();
    assert!(monitor.is_running());
    assert_eq!(monitor.playback_state().transpose, 2);

    // Let the tick thread catch up before stopping
    thread::sleep(Duration::from_millis(20));
    session.stop().expect("clean stop");
    assert!(!monitor.is_running());
    assert!(recorder.sounding().is_empty());
    common::assert_well_formed(&recorder.messages());
}
