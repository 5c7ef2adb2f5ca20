// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::traits::PlaybackClock;
use std::{
    cell::Cell,
    fmt::Display,
    ops::{Add, Sub},
    rc::Rc,
    time::Instant,
};

/// A position in a sequence, counted in the sequence's own ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MidiTicks(pub u64);

#[allow(dead_code)]
impl MidiTicks {
    pub const MAX: MidiTicks = MidiTicks(u64::MAX);
    pub const MIN: MidiTicks = MidiTicks(u64::MIN);
}

impl Display for MidiTicks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
impl From<u64> for MidiTicks {
    fn from(value: u64) -> Self {
        MidiTicks(value)
    }
}
impl Add for MidiTicks {
    type Output = MidiTicks;
    fn add(self, rhs: Self) -> Self::Output {
        MidiTicks(self.0 + rhs.0)
    }
}
impl Sub for MidiTicks {
    type Output = MidiTicks;
    fn sub(self, rhs: Self) -> Self::Output {
        MidiTicks(self.0.saturating_sub(rhs.0))
    }
}

/// Nanoseconds per tick for a tempo, truncated toward zero.
///
/// 500,000 microseconds per beat at 480 ticks per beat is 1,041,666.
pub fn nanos_per_tick(microseconds_per_beat: u32, resolution: u16) -> u64 {
    if resolution == 0 {
        return 0;
    }
    microseconds_per_beat as u64 * 1000 / resolution as u64
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct TempoSegment {
    start: MidiTicks,
    start_nanos: u64,
    microseconds_per_beat: u32,
}
impl TempoSegment {
    fn nanos_at(&self, tick: MidiTicks, resolution: u16) -> u64 {
        let delta = (tick - self.start).0 as u128;
        let offset = delta * self.microseconds_per_beat as u128 * 1000 / resolution as u128;
        u64::try_from(self.start_nanos as u128 + offset).unwrap_or(u64::MAX)
    }
}

/// The song-wide tempo map.
///
/// Every SetTempo, no matter which track carries it, splits the map at its
/// tick. Time for a tick is always computed from the absolute start of the
/// segment that contains it, so truncation error never accumulates across a
/// long song.
#[derive(Clone, Debug)]
pub struct TempoMap {
    resolution: u16,
    segments: Vec<TempoSegment>,
}
impl TempoMap {
    pub fn new_with(resolution: u16, microseconds_per_beat: u32) -> Self {
        Self {
            resolution: resolution.max(1),
            segments: vec![TempoSegment {
                start: MidiTicks::MIN,
                start_nanos: 0,
                microseconds_per_beat: microseconds_per_beat.max(1),
            }],
        }
    }

    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    /// Records a tempo change at the given tick. A second change at the same
    /// tick replaces the first. A change earlier than the latest one discards
    /// everything after it, which playback never does because it dispatches in
    /// tick order.
    pub fn set_tempo(&mut self, at: MidiTicks, microseconds_per_beat: u32) {
        if microseconds_per_beat == 0 {
            log::warn!("ignoring zero tempo at tick {at}");
            return;
        }
        let keep = self.segments.partition_point(|s| s.start <= at).max(1);
        self.segments.truncate(keep);
        let last = self.segments[keep - 1];
        if last.start == at {
            self.segments[keep - 1].microseconds_per_beat = microseconds_per_beat;
        } else {
            self.segments.push(TempoSegment {
                start: at,
                start_nanos: last.nanos_at(at, self.resolution),
                microseconds_per_beat,
            });
        }
    }

    fn segment_for(&self, tick: MidiTicks) -> &TempoSegment {
        let index = self.segments.partition_point(|s| s.start <= tick);
        &self.segments[index.max(1) - 1]
    }

    /// Nanoseconds from the start of the song to the given tick.
    pub fn ticks_to_nanos(&self, tick: MidiTicks) -> u64 {
        self.segment_for(tick).nanos_at(tick, self.resolution)
    }

    pub fn microseconds_per_beat_at(&self, tick: MidiTicks) -> u32 {
        self.segment_for(tick).microseconds_per_beat
    }

    pub fn nanos_per_tick_at(&self, tick: MidiTicks) -> u64 {
        nanos_per_tick(self.microseconds_per_beat_at(tick), self.resolution)
    }

    pub fn change_count(&self) -> usize {
        self.segments.len() - 1
    }
}

/// A [PlaybackClock] backed by [Instant]. It's monotonic, so the system clock
/// can jump around without disturbing playback.
#[derive(Debug, Default)]
pub struct WallClock {
    origin: Option<Instant>,
}
impl PlaybackClock for WallClock {
    fn start(&mut self) {
        self.origin = Some(Instant::now());
    }

    fn elapsed_nanos(&self) -> u64 {
        self.origin.map_or(0, |origin| {
            u64::try_from(origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
        })
    }
}

/// A [PlaybackClock] that only moves when told to. Clones share the same
/// time, so a test (or a simulated run) can keep one handle and give the other
/// to the scheduler.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    origin: u64,
}
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn set(&self, nanos: u64) {
        self.now.set(nanos.max(self.now.get()));
    }

    pub fn advance(&self, nanos: u64) {
        self.now.set(self.now.get().saturating_add(nanos));
    }
}
impl PlaybackClock for ManualClock {
    fn start(&mut self) {
        self.origin = self.now.get();
    }

    fn elapsed_nanos(&self) -> u64 {
        self.now.get().saturating_sub(self.origin)
    }
}
