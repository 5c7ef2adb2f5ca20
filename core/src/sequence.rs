// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{midi::Message, time::MidiTicks};
use thiserror::Error;

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SequenceError {
    #[error("resolution must be at least one tick per beat")]
    InvalidResolution,
    #[error("track {track} goes back in time at event {index} (tick {tick})")]
    UnsortedTrack {
        track: usize,
        index: usize,
        tick: MidiTicks,
    },
}

/// One timestamped message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TrackEvent {
    pub tick: MidiTicks,
    pub message: Message,
}
impl TrackEvent {
    pub fn new_with(tick: u64, message: Message) -> Self {
        Self {
            tick: MidiTicks(tick),
            message,
        }
    }
}

/// An ordered stream of events. Ticks never decrease, but several events can
/// share a tick, and then their order in the track is the order they play.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Track {
    events: Vec<TrackEvent>,
}
impl Track {
    pub fn events(&self) -> &[TrackEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_tick(&self) -> MidiTicks {
        self.events.last().map_or(MidiTicks::MIN, |e| e.tick)
    }

    fn unsorted_at(&self) -> Option<usize> {
        self.events
            .windows(2)
            .position(|pair| pair[1].tick < pair[0].tick)
            .map(|i| i + 1)
    }
}
impl From<Vec<TrackEvent>> for Track {
    fn from(events: Vec<TrackEvent>) -> Self {
        Self { events }
    }
}

/// A whole song, already decoded. It doesn't change once built.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Sequence {
    resolution: u16,
    tick_length: MidiTicks,
    tracks: Vec<Track>,
}
impl Sequence {
    /// Builds a sequence whose length is its last event.
    pub fn new_with(resolution: u16, tracks: Vec<Track>) -> Result<Self, SequenceError> {
        Self::new_with_length(resolution, MidiTicks::MIN, tracks)
    }

    /// Builds a sequence with a declared length. The length is stretched if
    /// any event falls after it.
    pub fn new_with_length(
        resolution: u16,
        tick_length: MidiTicks,
        tracks: Vec<Track>,
    ) -> Result<Self, SequenceError> {
        if resolution == 0 {
            return Err(SequenceError::InvalidResolution);
        }
        for (track, t) in tracks.iter().enumerate() {
            if let Some(index) = t.unsorted_at() {
                return Err(SequenceError::UnsortedTrack {
                    track,
                    index,
                    tick: t.events[index].tick,
                });
            }
        }
        let last_tick = tracks
            .iter()
            .map(Track::last_tick)
            .max()
            .unwrap_or_default();
        Ok(Self {
            resolution,
            tick_length: tick_length.max(last_tick),
            tracks,
        })
    }

    /// Ticks per quarter note.
    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    pub fn tick_length(&self) -> MidiTicks {
        self.tick_length
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn event_count(&self) -> usize {
        self.tracks.iter().map(Track::len).sum()
    }
}
