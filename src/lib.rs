// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Tickwalk plays multi-track MIDI songs with tick accuracy. A
//! [PlaybackScheduler] walks every track of a
//! [Sequence](tickwalk_core::sequence::Sequence) at once, turns ticks into
//! wall-clock time with a song-wide [TempoMap](tickwalk_core::time::TempoMap),
//! and hands each event to a [SoundSink](tickwalk_core::traits::SoundSink) at
//! the moment it's due.
//!
//! The scheduler doesn't own a thread and never sleeps. The caller decides how
//! often to call [PlaybackScheduler::step()].

pub use crate::{
    cursors::TrackCursorSet,
    dispatcher::EventDispatcher,
    metronome::Metronome,
    scheduler::{PlaybackError, PlaybackPhase, PlaybackScheduler, PlaybackSnapshot},
    track_state::TrackState,
};

pub mod cursors;
pub mod dispatcher;
pub mod metronome;
pub mod scheduler;
pub mod track_state;

use tickwalk_core::{time::ManualClock, traits::SoundSink};

pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Runs a scheduler from start to finish without waiting, by moving its
/// [ManualClock] straight to each moment something is due. Returns the
/// simulated running time in nanoseconds.
pub fn play_simulated<S: SoundSink>(
    scheduler: &mut PlaybackScheduler<S, ManualClock>,
) -> Result<u64, PlaybackError> {
    let clock = scheduler.clock().clone();
    scheduler.start();
    while let Some(due) = scheduler.next_wakeup_nanos() {
        let elapsed = scheduler.snapshot().elapsed_nanos;
        if due > elapsed {
            clock.advance(due - elapsed);
        }
        scheduler.step()?;
    }
    Ok(scheduler.snapshot().elapsed_nanos)
}
