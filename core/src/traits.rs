// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::midi::{u14, u7, MidiChannel};
use thiserror::Error;

/// Why a sink refused an operation.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SinkError {
    #[error("MIDI channel {0} is out of range for this sink")]
    InvalidChannel(MidiChannel),
    #[error("sound sink is unavailable: {0}")]
    SinkUnavailable(String),
}

/// The operations one channel of a sound-producing device understands.
///
/// Every call either takes effect or fails right away; nothing is queued for
/// a retry.
pub trait ChannelSink: std::fmt::Debug {
    fn note_on(&mut self, key: u7, velocity: u7) -> Result<(), SinkError>;
    fn note_off(&mut self, key: u7, velocity: u7) -> Result<(), SinkError>;
    fn program_change(&mut self, program: u7) -> Result<(), SinkError>;
    /// `value` is the raw 14-bit bend, 0..=16383 with 8192 at rest.
    fn set_pitch_bend(&mut self, value: u14) -> Result<(), SinkError>;
    fn control_change(&mut self, controller: u7, value: u7) -> Result<(), SinkError>;
    fn set_poly_pressure(&mut self, key: u7, pressure: u7) -> Result<(), SinkError>;
    fn set_channel_pressure(&mut self, pressure: u7) -> Result<(), SinkError>;
}

/// A [SoundSink] is a fixed bank of [ChannelSink]s. The number of channels
/// doesn't change after construction, and asking for a channel outside the
/// bank fails with [SinkError::InvalidChannel] rather than dropping the
/// message.
pub trait SoundSink: std::fmt::Debug {
    fn channel_count(&self) -> usize;

    fn channel_mut(&mut self, channel: MidiChannel) -> Result<&mut dyn ChannelSink, SinkError>;
}

/// What to do when a sink rejects a dispatched event.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SinkErrorPolicy {
    /// Log the failure and keep playing the rest of the song.
    #[default]
    LogAndContinue,
    /// Return the failure to whoever is driving playback.
    Propagate,
}

/// A monotonic time source with a single origin.
pub trait PlaybackClock: std::fmt::Debug {
    /// Captures the origin. Everything after is measured from here.
    fn start(&mut self);

    /// Nanoseconds since [PlaybackClock::start()]. What this returns before
    /// the first start is up to the clock.
    fn elapsed_nanos(&self) -> u64;
}

/// Something that can run out of things to do.
pub trait Terminates {
    fn is_finished(&self) -> bool;
}
