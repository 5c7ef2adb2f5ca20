// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! Fundamental structs and traits shared by the loader, the sinks, and the
//! playback scheduler.

/// The [config] module holds the knobs that shape playback.
pub mod config;
/// The [midi] module knows about [MIDI](https://en.wikipedia.org/wiki/MIDI)
/// messages and how to name them.
pub mod midi;
/// The [sequence] module holds the immutable, already-decoded song.
pub mod sequence;
/// The [time] module handles MIDI ticks, tempo, and wall-clock time.
pub mod time;
/// The [traits] module describes the public interfaces that connect the
/// scheduler to the outside world.
pub mod traits;
/// The [util] module has small sinks that are handy for tests and tooling.
pub mod util;

/// Number of channels on a standard MIDI port.
pub const MIDI_CHANNEL_COUNT: usize = 16;

/// 120 BPM, the tempo a Standard MIDI File implies until it says otherwise.
pub const DEFAULT_MICROSECONDS_PER_BEAT: u32 = 500_000;

/// The channel General MIDI reserves for percussion (channel 10 to humans).
pub const GM_PERCUSSION_CHANNEL: midi::MidiChannel = 9;

pub const NANOS_PER_SECOND: u64 = 1_000_000_000;
