// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    cursors::TrackCursorSet, dispatcher::EventDispatcher, metronome::Metronome,
    track_state::TrackState,
};
use std::time::Duration;
use strum_macros::Display;
use thiserror::Error;
use tickwalk_core::{
    config::PlaybackConfig,
    midi::MidiChannel,
    sequence::Sequence,
    time::{MidiTicks, TempoMap, WallClock},
    traits::{PlaybackClock, SinkError, SinkErrorPolicy, SoundSink, Terminates},
};

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("track {track} at tick {tick}: {source}")]
    Sink {
        track: usize,
        tick: MidiTicks,
        #[source]
        source: SinkError,
    },
    #[error("speed must be a positive number, not {0}")]
    InvalidSpeed(f64),
    #[error("the sink can't be used: {0}")]
    SinkSetup(#[source] SinkError),
    #[error("metronome beat {beat}: {source}")]
    Metronome {
        beat: u64,
        #[source]
        source: SinkError,
    },
    #[error("couldn't silence channel {channel}: {source}")]
    AllNotesOff {
        channel: MidiChannel,
        #[source]
        source: SinkError,
    },
}

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum PlaybackPhase {
    #[default]
    Stopped,
    Running,
    Finished,
}

/// A point-in-time copy of where playback is, cheap enough to hand to another
/// thread for display.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PlaybackSnapshot {
    pub phase: PlaybackPhase,
    pub current_tick: MidiTicks,
    pub tick_length: MidiTicks,
    pub next_due_nanos: u64,
    pub elapsed_nanos: u64,
}

/// Plays a [Sequence] into a [SoundSink].
///
/// The scheduler never sleeps and owns no thread. Something else calls
/// [PlaybackScheduler::step()] over and over, as often as it likes, and each
/// call does whatever has come due since the last one.
#[derive(Debug)]
pub struct PlaybackScheduler<S: SoundSink, C: PlaybackClock = WallClock> {
    sequence: Sequence,
    config: PlaybackConfig,
    dispatcher: EventDispatcher<S>,
    clock: C,
    cursors: TrackCursorSet,
    track_states: Vec<TrackState>,
    tempo_map: TempoMap,
    metronome: Option<Metronome>,

    phase: PlaybackPhase,
    current_tick: MidiTicks,
    next_wait: u64,
}
impl<S: SoundSink> PlaybackScheduler<S, WallClock> {
    pub fn new(
        sequence: Sequence,
        sink: S,
        config: PlaybackConfig,
    ) -> Result<Self, PlaybackError> {
        Self::new_with(sequence, sink, WallClock::default(), config)
    }
}
impl<S: SoundSink, C: PlaybackClock> PlaybackScheduler<S, C> {
    pub fn new_with(
        sequence: Sequence,
        sink: S,
        clock: C,
        config: PlaybackConfig,
    ) -> Result<Self, PlaybackError> {
        if !config.speed.is_finite() || config.speed <= 0.0 {
            return Err(PlaybackError::InvalidSpeed(config.speed));
        }
        let dispatcher = EventDispatcher::new_with(sink).map_err(PlaybackError::SinkSetup)?;
        Ok(Self {
            cursors: TrackCursorSet::new_with(&sequence),
            track_states: vec![TrackState::default(); sequence.tracks().len()],
            tempo_map: TempoMap::new_with(
                sequence.resolution(),
                config.default_microseconds_per_beat,
            ),
            metronome: config.metronome.map(Metronome::new_with),
            sequence,
            config,
            dispatcher,
            clock,
            phase: PlaybackPhase::Stopped,
            current_tick: MidiTicks::MIN,
            next_wait: 0,
        })
    }

    /// Captures the clock origin and begins playback. Returns false if
    /// playback had already begun.
    pub fn start(&mut self) -> bool {
        if self.phase != PlaybackPhase::Stopped {
            return false;
        }
        self.clock.start();
        self.phase = PlaybackPhase::Running;
        self.current_tick = MidiTicks::MIN;
        self.next_wait = 0;
        log::info!(
            "playing {} tracks, {} events, {} ticks at {} ticks per beat",
            self.sequence.tracks().len(),
            self.sequence.event_count(),
            self.sequence.tick_length(),
            self.sequence.resolution()
        );
        true
    }

    /// Does whatever has come due. Returns whether any track event was
    /// dispatched.
    ///
    /// A sink failure is logged or returned according to the
    /// [SinkErrorPolicy]. Either way the failed event isn't retried, and the
    /// next call carries on from the event after it.
    pub fn step(&mut self) -> Result<bool, PlaybackError> {
        if self.phase != PlaybackPhase::Running {
            return Ok(false);
        }
        let elapsed = self.clock.elapsed_nanos();

        let mut dispatched = false;
        if elapsed >= self.next_wait {
            dispatched = self.advance()?;
        }

        if self.metronome.is_some() {
            self.sound_metronome(elapsed)?;
        }

        if self.is_song_over(elapsed) {
            self.finish()?;
        }
        Ok(dispatched)
    }

    /// Steps until nothing is overdue, so a dense stretch of the song doesn't
    /// fall further behind with every poll. Returns whether any track event
    /// was dispatched.
    pub fn catch_up(&mut self) -> Result<bool, PlaybackError> {
        let mut dispatched = false;
        while let Some(due) = self.next_wakeup_nanos() {
            if due > self.clock.elapsed_nanos() {
                break;
            }
            dispatched |= self.step()?;
        }
        Ok(dispatched)
    }

    /// How long a driving loop can sleep before the next
    /// [PlaybackScheduler::catch_up()], never more than `limit`.
    pub fn time_until_wakeup(&self, limit: Duration) -> Duration {
        match self.next_wakeup_nanos() {
            Some(due) => Duration::from_nanos(due.saturating_sub(self.clock.elapsed_nanos()))
                .min(limit),
            None => Duration::ZERO,
        }
    }

    fn advance(&mut self) -> Result<bool, PlaybackError> {
        let before = self.cursors.dispatched_count();
        let current = self.current_tick;
        let policy = self.config.sink_error_policy;

        let dispatcher = &mut self.dispatcher;
        let track_states = &mut self.track_states;
        let tempo_map = &mut self.tempo_map;
        let result = self
            .cursors
            .advance_all(&self.sequence, current, |track, event| {
                log::trace!("track {track} @ {}: {}", event.tick, event.message);
                match dispatcher.dispatch(event, &mut track_states[track], tempo_map) {
                    Ok(()) => Ok(()),
                    Err(source) => {
                        let e = PlaybackError::Sink {
                            track,
                            tick: event.tick,
                            source,
                        };
                        match policy {
                            SinkErrorPolicy::LogAndContinue => {
                                log::warn!("{e}");
                                Ok(())
                            }
                            SinkErrorPolicy::Propagate => Err(e),
                        }
                    }
                }
            });
        let dispatched = self.cursors.dispatched_count() > before;

        // On failure current_tick and next_wait stay put, so the next step
        // resumes this tick.
        self.current_tick = match result? {
            Some(next) => next,
            None => self.sequence.tick_length(),
        };
        self.next_wait = self.scaled(self.tempo_map.ticks_to_nanos(self.current_tick));
        Ok(dispatched)
    }

    fn sound_metronome(&mut self, elapsed: u64) -> Result<(), PlaybackError> {
        let period = self.scaled(
            self.tempo_map
                .nanos_per_tick_at(self.current_tick)
                .saturating_mul(self.sequence.resolution() as u64),
        );
        let Some(metronome) = self.metronome.as_mut() else {
            return Ok(());
        };
        metronome.set_period_once(period);
        let beat = metronome.beats();
        let Some(key) = metronome.poll(elapsed) else {
            return Ok(());
        };
        let config = *metronome.config();
        if let Err(source) = self.dispatcher.click(config.channel, key, config.velocity) {
            let e = PlaybackError::Metronome { beat, source };
            match self.config.sink_error_policy {
                SinkErrorPolicy::LogAndContinue => log::warn!("{e}"),
                SinkErrorPolicy::Propagate => return Err(e),
            }
        }
        Ok(())
    }

    fn end_nanos(&self) -> u64 {
        self.scaled(self.tempo_map.ticks_to_nanos(self.sequence.tick_length()))
    }

    fn grace_nanos(&self) -> u64 {
        u64::try_from(self.config.grace_period.as_nanos()).unwrap_or(u64::MAX)
    }

    fn is_song_over(&self, elapsed: u64) -> bool {
        self.current_tick >= self.sequence.tick_length()
            && self.cursors.is_exhausted(&self.sequence)
            && elapsed > self.end_nanos().saturating_add(self.grace_nanos())
    }

    fn finish(&mut self) -> Result<(), PlaybackError> {
        self.phase = PlaybackPhase::Finished;
        log::info!(
            "finished after {} events",
            self.cursors.dispatched_count()
        );
        let mut first_error = None;
        for (channel, source) in self.dispatcher.all_notes_off() {
            let e = PlaybackError::AllNotesOff { channel, source };
            match self.config.sink_error_policy {
                SinkErrorPolicy::LogAndContinue => log::warn!("{e}"),
                SinkErrorPolicy::Propagate => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn scaled(&self, nanos: u64) -> u64 {
        (nanos as f64 / self.config.speed) as u64
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn current_tick(&self) -> MidiTicks {
        self.current_tick
    }

    /// Elapsed time at which the next batch of events is due.
    pub fn next_due_nanos(&self) -> u64 {
        self.next_wait
    }

    /// Elapsed time at which [PlaybackScheduler::step()] next has something to
    /// do, or `None` unless playback is running. A driving loop can sleep
    /// until then instead of spinning.
    pub fn next_wakeup_nanos(&self) -> Option<u64> {
        if self.phase != PlaybackPhase::Running {
            return None;
        }
        let song = if self.current_tick >= self.sequence.tick_length()
            && self.cursors.is_exhausted(&self.sequence)
        {
            self.end_nanos()
                .saturating_add(self.grace_nanos())
                .saturating_add(1)
        } else {
            self.next_wait
        };
        let beat = self
            .metronome
            .as_ref()
            .map(|m| m.period().map_or(0, |_| m.next_beat()));
        Some(beat.map_or(song, |beat| beat.min(song)))
    }

    pub fn track_state(&self, track: usize) -> Option<&TrackState> {
        self.track_states.get(track)
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn metronome(&self) -> Option<&Metronome> {
        self.metronome.as_ref()
    }

    pub fn dispatched_count(&self) -> usize {
        self.cursors.dispatched_count()
    }

    pub fn sink(&self) -> &S {
        self.dispatcher.sink()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            phase: self.phase,
            current_tick: self.current_tick,
            tick_length: self.sequence.tick_length(),
            next_due_nanos: self.next_wait,
            elapsed_nanos: self.clock.elapsed_nanos(),
        }
    }

    pub fn into_sink(self) -> S {
        self.dispatcher.into_sink()
    }
}
impl<S: SoundSink, C: PlaybackClock> Terminates for PlaybackScheduler<S, C> {
    fn is_finished(&self) -> bool {
        self.phase == PlaybackPhase::Finished
    }
}
