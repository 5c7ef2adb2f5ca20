// Copyright (c) 2023 Mike Tsao. All rights reserved.

use more_asserts::{assert_ge, assert_gt, assert_le, assert_lt};
use std::time::Duration;
use tickwalk::{play_simulated, PlaybackError, PlaybackPhase, PlaybackScheduler};
use tickwalk_core::{
    config::{MetronomeConfig, PlaybackConfig},
    midi::{MetaEvent, Message},
    sequence::{Sequence, Track, TrackEvent},
    time::{ManualClock, MidiTicks},
    traits::{SinkError, SinkErrorPolicy, Terminates},
    util::{RecordingSink, SinkCall},
};
use tickwalk_midi::smf::SmfLoader;

const MS: u64 = 1_000_000;

type TestScheduler = PlaybackScheduler<RecordingSink, ManualClock>;

struct Harness {
    scheduler: TestScheduler,
    clock: ManualClock,
    recorder: RecordingSink,
}
impl Harness {
    fn new(sequence: Sequence, config: PlaybackConfig) -> Self {
        Self::new_with_sink(sequence, config, RecordingSink::new_with(16))
    }

    fn new_with_sink(sequence: Sequence, config: PlaybackConfig, sink: RecordingSink) -> Self {
        let clock = ManualClock::new();
        let recorder = sink.clone();
        let scheduler = PlaybackScheduler::new_with(sequence, sink, clock.clone(), config).unwrap();
        Self {
            scheduler,
            clock,
            recorder,
        }
    }

    /// Steps every `interval` nanoseconds until the song finishes or `limit`
    /// is reached, noting when each sink call happened.
    fn run(&mut self, interval: u64, limit: u64) -> Vec<(u64, SinkCall)> {
        self.scheduler.start();
        let mut timeline = Vec::default();
        loop {
            let seen = self.recorder.calls().len();
            self.scheduler.step().unwrap();
            for call in self.recorder.calls().into_iter().skip(seen) {
                timeline.push((self.clock.now(), call));
            }
            if self.scheduler.is_finished() || self.clock.now() >= limit {
                return timeline;
            }
            self.clock.advance(interval);
        }
    }
}

fn note_on(tick: u64, channel: u8, key: u8) -> TrackEvent {
    TrackEvent::new_with(tick, Message::note_on(channel, key, 100))
}

fn note_off(tick: u64, channel: u8, key: u8) -> TrackEvent {
    TrackEvent::new_with(tick, Message::note_off(channel, key, 0))
}

fn one_note_song() -> Sequence {
    Sequence::new_with_length(
        96,
        MidiTicks(192),
        vec![Track::from(vec![
            TrackEvent::new_with(0, Message::set_tempo(500_000)),
            note_on(0, 0, 60),
            note_off(96, 0, 60),
            TrackEvent::new_with(192, Message::Meta(MetaEvent::EndOfTrack)),
        ])],
    )
    .unwrap()
}

fn no_grace() -> PlaybackConfig {
    PlaybackConfig {
        grace_period: Duration::ZERO,
        ..Default::default()
    }
}

#[test]
fn end_to_end_one_note() {
    let mut harness = Harness::new(one_note_song(), PlaybackConfig::default());
    let timeline = harness.run(MS, 10_000 * MS);

    assert_eq!(
        timeline,
        vec![
            (
                0,
                SinkCall::NoteOn {
                    channel: 0,
                    key: 60,
                    velocity: 100
                }
            ),
            (
                500 * MS,
                SinkCall::NoteOff {
                    channel: 0,
                    key: 60,
                    velocity: 0
                }
            ),
            (
                3001 * MS,
                SinkCall::ControlChange {
                    channel: 0,
                    controller: 123,
                    value: 0
                }
            ),
        ]
    );
    // The song ends at 1s, and the grace period is 2s.
    assert_eq!(harness.clock.now(), 3001 * MS);
    assert_eq!(harness.scheduler.phase(), PlaybackPhase::Finished);
    assert_eq!(harness.scheduler.current_tick(), MidiTicks(192));
}

#[test]
fn finish_waits_for_strictly_more_than_grace() {
    let mut harness = Harness::new(one_note_song(), PlaybackConfig::default());
    harness.scheduler.start();
    harness.clock.set(3000 * MS);
    for _ in 0..4 {
        harness.scheduler.step().unwrap();
    }
    assert!(!harness.scheduler.is_finished());
    harness.clock.advance(1);
    harness.scheduler.step().unwrap();
    assert!(harness.scheduler.is_finished());
}

#[test]
fn finish_is_idempotent() {
    let mut harness = Harness::new(one_note_song(), no_grace());
    play_simulated(&mut harness.scheduler).unwrap();
    assert!(harness.scheduler.is_finished());
    let calls = harness.recorder.calls().len();

    for _ in 0..10 {
        harness.clock.advance(1000 * MS);
        assert!(!harness.scheduler.step().unwrap());
    }
    assert_eq!(harness.recorder.calls().len(), calls);
    assert!(!harness.scheduler.start());
    assert_eq!(harness.scheduler.next_wakeup_nanos(), None);
}

#[test]
fn ties_break_by_file_order_then_track_index() {
    let sequence = Sequence::new_with(
        96,
        vec![
            Track::from(vec![note_on(0, 0, 1), note_on(0, 0, 2), note_on(96, 0, 5)]),
            Track::from(vec![note_on(0, 1, 3), note_on(96, 1, 6)]),
            Track::from(vec![note_on(0, 2, 4)]),
        ],
    )
    .unwrap();
    let mut harness = Harness::new(sequence, no_grace());
    play_simulated(&mut harness.scheduler).unwrap();

    let keys: Vec<u8> = harness
        .recorder
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            SinkCall::NoteOn { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn ticks_only_move_forward_and_every_event_plays_once() {
    let sequence = Sequence::new_with(
        48,
        vec![
            Track::from(vec![
                TrackEvent::new_with(0, Message::program_change(0, 5)),
                note_on(0, 0, 60),
                note_off(30, 0, 60),
                note_on(30, 0, 62),
                note_off(100, 0, 62),
            ]),
            Track::from(vec![
                TrackEvent::new_with(0, Message::Meta(MetaEvent::TrackName("b".into()))),
                note_on(7, 1, 40),
                note_off(7, 1, 40),
                note_on(64, 1, 41),
                note_off(65, 1, 41),
            ]),
        ],
    )
    .unwrap();
    let channel_events = sequence
        .tracks()
        .iter()
        .flat_map(|t| t.events())
        .filter(|e| e.message.is_channel_message())
        .count();
    let event_count = sequence.event_count();

    let mut harness = Harness::new(sequence, no_grace());
    harness.scheduler.start();
    let mut last = MidiTicks(0);
    while !harness.scheduler.is_finished() {
        harness.scheduler.step().unwrap();
        assert_ge!(harness.scheduler.current_tick(), last);
        last = harness.scheduler.current_tick();
        harness.clock.advance(MS);
    }
    assert_eq!(harness.scheduler.dispatched_count(), event_count);
    // Two sounded channels get an all-notes-off at the end.
    assert_eq!(harness.recorder.calls().len(), channel_events + 2);
    assert_eq!(
        harness.scheduler.track_state(0).map(|s| s.program()),
        Some(5)
    );
    assert_eq!(
        harness.scheduler.track_state(1).and_then(|s| s.name()),
        Some("b")
    );
}

#[test]
fn tempo_change_on_another_track_applies_to_all() {
    let sequence = Sequence::new_with(
        96,
        vec![
            Track::from(vec![note_on(0, 0, 60), note_on(192, 0, 62)]),
            Track::from(vec![TrackEvent::new_with(96, Message::set_tempo(250_000))]),
        ],
    )
    .unwrap();
    let mut harness = Harness::new(sequence, no_grace());
    let timeline = harness.run(MS, 10_000 * MS);
    let note_times: Vec<u64> = timeline
        .iter()
        .filter(|(_, call)| matches!(call, SinkCall::NoteOn { .. }))
        .map(|(when, _)| *when)
        .collect();
    // One beat at 120 BPM, then one at 240 BPM.
    assert_eq!(note_times, vec![0, 750 * MS]);
    assert_eq!(harness.scheduler.tempo_map().change_count(), 1);
    assert_eq!(
        harness
            .scheduler
            .track_state(1)
            .and_then(|s| s.microseconds_per_beat()),
        Some(250_000)
    );
    assert_eq!(
        harness
            .scheduler
            .track_state(0)
            .and_then(|s| s.microseconds_per_beat()),
        None
    );
}

#[test]
fn speed_scales_every_due_time() {
    let config = PlaybackConfig {
        speed: 2.0,
        ..Default::default()
    };
    let mut harness = Harness::new(one_note_song(), config);
    let timeline = harness.run(MS, 10_000 * MS);
    assert_eq!(timeline[1].0, 250 * MS);
    // 0.5s of song plus 2s of unscaled grace.
    assert_eq!(harness.clock.now(), 2501 * MS);
}

#[test]
fn metronome_period_is_fixed_once() {
    let sequence = Sequence::new_with(
        96,
        vec![Track::from(vec![
            note_on(0, 0, 60),
            TrackEvent::new_with(96, Message::set_tempo(250_000)),
            note_off(384, 0, 60),
        ])],
    )
    .unwrap();
    let config = PlaybackConfig {
        metronome: Some(MetronomeConfig::default()),
        ..no_grace()
    };
    let mut harness = Harness::new(sequence, config);
    harness.scheduler.start();
    harness.scheduler.step().unwrap();

    // 5,208,333ns per tick (truncated) times 96 ticks.
    let period = 499_999_968;
    assert_eq!(
        harness.scheduler.metronome().and_then(|m| m.period()),
        Some(period)
    );
    assert_eq!(
        harness.recorder.calls()[1..],
        [
            SinkCall::NoteOn {
                channel: 9,
                key: 77,
                velocity: 100
            },
            SinkCall::NoteOff {
                channel: 9,
                key: 77,
                velocity: 0
            },
        ]
    );

    harness.clock.set(period - 1);
    harness.scheduler.step().unwrap();
    assert_eq!(harness.scheduler.metronome().map(|m| m.beats()), Some(1));
    harness.clock.set(period);
    harness.scheduler.step().unwrap();
    assert_eq!(harness.scheduler.metronome().map(|m| m.beats()), Some(2));

    // The tempo doubled at tick 96, but the beat didn't.
    harness.clock.set(2 * period);
    harness.scheduler.step().unwrap();
    assert_eq!(
        harness.scheduler.metronome().and_then(|m| m.period()),
        Some(period)
    );
    assert_eq!(harness.scheduler.metronome().map(|m| m.beats()), Some(3));
    assert_eq!(harness.scheduler.metronome().map(|m| m.next_beat()), Some(3 * period));
}

#[test]
fn metronome_period_follows_speed() {
    let config = PlaybackConfig {
        speed: 2.0,
        metronome: Some(MetronomeConfig::default()),
        ..no_grace()
    };
    let mut harness = Harness::new(one_note_song(), config);
    harness.scheduler.start();
    harness.scheduler.step().unwrap();
    assert_eq!(
        harness.scheduler.metronome().and_then(|m| m.period()),
        Some(249_999_984)
    );
}

fn bad_channel_song() -> Sequence {
    Sequence::new_with(
        96,
        vec![
            Track::from(vec![note_on(0, 3, 1), note_on(0, 0, 2), note_on(96, 0, 4)]),
            Track::from(vec![note_on(0, 0, 3)]),
        ],
    )
    .unwrap()
}

#[test]
fn log_and_continue_keeps_playing() {
    let mut harness = Harness::new_with_sink(
        bad_channel_song(),
        no_grace(),
        RecordingSink::new_with(1),
    );
    harness.scheduler.start();
    assert!(harness.scheduler.step().unwrap());
    assert_eq!(harness.recorder.calls().len(), 2);
    assert_eq!(harness.scheduler.current_tick(), MidiTicks(96));

    play_simulated(&mut harness.scheduler).unwrap();
    assert!(harness.scheduler.is_finished());
    assert_eq!(harness.scheduler.dispatched_count(), 4);
}

#[test]
fn propagate_reports_then_resumes_the_same_tick() {
    let config = PlaybackConfig {
        sink_error_policy: SinkErrorPolicy::Propagate,
        ..no_grace()
    };
    let mut harness =
        Harness::new_with_sink(bad_channel_song(), config, RecordingSink::new_with(1));
    harness.scheduler.start();

    match harness.scheduler.step() {
        Err(PlaybackError::Sink {
            track,
            tick,
            source,
        }) => {
            assert_eq!(track, 0);
            assert_eq!(tick, MidiTicks(0));
            assert_eq!(source, SinkError::InvalidChannel(3));
        }
        other => panic!("expected a sink error, got {other:?}"),
    }
    assert!(harness.recorder.calls().is_empty());
    assert_eq!(harness.scheduler.current_tick(), MidiTicks(0));

    assert!(harness.scheduler.step().unwrap());
    let keys: Vec<u8> = harness
        .recorder
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            SinkCall::NoteOn { key, .. } => Some(key),
            _ => None,
        })
        .collect();
    assert_eq!(keys, vec![2, 3]);
    assert_eq!(harness.scheduler.current_tick(), MidiTicks(96));
}

#[test]
fn unavailable_sink_is_logged_and_skipped() {
    let sink = RecordingSink::new_with(16);
    sink.set_unavailable(true);
    let mut harness = Harness::new_with_sink(one_note_song(), no_grace(), sink);
    play_simulated(&mut harness.scheduler).unwrap();
    assert!(harness.scheduler.is_finished());
    assert!(harness.recorder.calls().is_empty());
}

#[test]
fn empty_song_finishes_after_grace() {
    let sequence = Sequence::new_with(96, vec![]).unwrap();
    let config = PlaybackConfig {
        grace_period: Duration::from_millis(5),
        ..Default::default()
    };
    let mut harness = Harness::new(sequence, config);
    let timeline = harness.run(MS, 1000 * MS);
    assert!(timeline.is_empty());
    assert_eq!(harness.clock.now(), 6 * MS);
}

#[test]
fn step_reports_whether_anything_was_dispatched() {
    let mut harness = Harness::new(one_note_song(), no_grace());
    harness.scheduler.start();
    assert!(harness.scheduler.step().unwrap());
    assert!(!harness.scheduler.step().unwrap());
    harness.clock.set(499 * MS);
    assert!(!harness.scheduler.step().unwrap());
    harness.clock.set(500 * MS);
    assert!(harness.scheduler.step().unwrap());
    assert_eq!(harness.scheduler.next_due_nanos(), 1000 * MS);
}

#[test]
fn simulated_run_from_a_midi_file() {
    #[rustfmt::skip]
    let bytes: Vec<u8> = vec![
        b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x01, 0x00, 0x60,
        b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x13,
        0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20,
        0x00, 0x90, 0x3C, 0x64,
        0x60, 0x80, 0x3C, 0x00,
        0x60, 0xFF, 0x2F, 0x00,
    ];
    let sequence = SmfLoader::parse(&bytes).unwrap();
    assert_eq!(sequence, one_note_song());

    let mut harness = Harness::new(sequence, PlaybackConfig::default());
    let nanos = play_simulated(&mut harness.scheduler).unwrap();
    assert_gt!(nanos, 3000 * MS);
    assert_le!(nanos, 3000 * MS + 1);
    assert_eq!(harness.recorder.calls().len(), 3);
}

#[test]
fn tick_480_at_480_ppq_is_due_after_half_a_second() {
    let sequence = Sequence::new_with(
        480,
        vec![Track::from(vec![
            TrackEvent::new_with(0, Message::set_tempo(500_000)),
            note_on(0, 0, 60),
            note_on(480, 0, 64),
        ])],
    )
    .unwrap();
    let mut harness = Harness::new(sequence, no_grace());
    harness.scheduler.start();
    assert!(harness.scheduler.step().unwrap());
    assert_eq!(harness.scheduler.current_tick(), MidiTicks(480));
    assert_eq!(harness.scheduler.next_due_nanos(), 500_000_000);

    harness.clock.set(500_000_000 - 1);
    assert!(!harness.scheduler.step().unwrap());
    harness.clock.set(500_000_000);
    assert!(harness.scheduler.step().unwrap());
}

fn dense_song() -> Sequence {
    // A note on every tick for one second at 960 ticks per beat, 120 BPM.
    let events = (0..1920)
        .map(|tick| note_on(tick, 0, (tick % 128) as u8))
        .collect::<Vec<_>>();
    Sequence::new_with(960, vec![Track::from(events)]).unwrap()
}

#[test]
fn catch_up_keeps_dense_songs_on_time() {
    let mut harness = Harness::new(dense_song(), no_grace());
    harness.scheduler.start();
    let mut sent = 0;
    while !harness.scheduler.is_finished() {
        harness.scheduler.catch_up().unwrap();
        let now = harness.clock.now();
        let calls = harness.recorder.calls();
        for (index, call) in calls.iter().enumerate().skip(sent) {
            if let SinkCall::NoteOn { .. } = call {
                let due = index as u64 * 500_000_000 / 960;
                assert_lt!(now.saturating_sub(due), MS);
            }
        }
        sent = calls.len();
        if let Some(wakeup) = harness.scheduler.next_wakeup_nanos() {
            assert_gt!(wakeup, now);
        }
        assert_le!(
            harness.scheduler.time_until_wakeup(Duration::from_millis(1)),
            Duration::from_millis(1)
        );
        harness.clock.advance(MS);
    }
    assert_eq!(harness.scheduler.dispatched_count(), 1920);
    // The last note is due at about 999.5ms.
    assert_le!(harness.clock.now(), 1001 * MS);
}

#[test]
fn time_until_wakeup_is_capped() {
    let mut harness = Harness::new(one_note_song(), no_grace());
    assert_eq!(
        harness.scheduler.time_until_wakeup(Duration::from_millis(5)),
        Duration::ZERO
    );
    harness.scheduler.start();
    harness.scheduler.catch_up().unwrap();
    assert_eq!(
        harness.scheduler.time_until_wakeup(Duration::from_secs(5)),
        Duration::from_millis(500)
    );
    assert_eq!(
        harness.scheduler.time_until_wakeup(Duration::from_millis(5)),
        Duration::from_millis(5)
    );
}
