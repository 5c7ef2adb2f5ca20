// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    midi::MidiChannel, traits::SinkErrorPolicy, DEFAULT_MICROSECONDS_PER_BEAT,
    GM_PERCUSSION_CHANNEL,
};
use std::time::Duration;

/// How the metronome sounds. Every beat is a short NoteOn/NoteOff pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetronomeConfig {
    pub channel: MidiChannel,
    pub key: u8,
    /// Played instead of `key` on the first beat of every bar.
    pub accent_key: u8,
    pub velocity: u8,
    /// Zero means there are no bars, so nothing is accented.
    pub beats_per_bar: u32,
}
impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            channel: GM_PERCUSSION_CHANNEL,
            key: 76,        // High Wood Block
            accent_key: 77, // Low Wood Block
            velocity: 100,
            beats_per_bar: 4,
        }
    }
}
impl MetronomeConfig {
    /// The key for the zero-based beat number.
    pub fn key_for_beat(&self, beat: u64) -> u8 {
        if self.beats_per_bar != 0 && beat % self.beats_per_bar as u64 == 0 {
            self.accent_key
        } else {
            self.key
        }
    }
}

/// Everything a scheduler needs to know besides the song and the sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackConfig {
    /// 1.0 is normal speed, 2.0 twice as fast.
    pub speed: f64,
    /// How long to let the last notes ring after the final tick.
    pub grace_period: Duration,
    /// The tempo until the song sets one.
    pub default_microseconds_per_beat: u32,
    pub sink_error_policy: SinkErrorPolicy,
    pub metronome: Option<MetronomeConfig>,
}
impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            grace_period: Duration::from_secs(2),
            default_microseconds_per_beat: DEFAULT_MICROSECONDS_PER_BEAT,
            sink_error_policy: SinkErrorPolicy::default(),
            metronome: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metronome_accents_the_downbeat() {
        let metronome = MetronomeConfig::default();
        let keys: Vec<u8> = (0..6).map(|beat| metronome.key_for_beat(beat)).collect();
        assert_eq!(keys, vec![77, 76, 76, 76, 77, 76]);

        let metronome = MetronomeConfig {
            beats_per_bar: 0,
            ..Default::default()
        };
        assert_eq!(metronome.key_for_beat(0), 76);
    }
}
