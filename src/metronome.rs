// Copyright (c) 2023 Mike Tsao. All rights reserved.

use tickwalk_core::config::MetronomeConfig;

/// A fixed-period pulse that runs next to event playback.
///
/// The period is set once. Tempo changes later in the song don't move it.
#[derive(Clone, Debug)]
pub struct Metronome {
    config: MetronomeConfig,
    period: Option<u64>,
    next_beat: u64,
    beats: u64,
}
impl Metronome {
    pub fn new_with(config: MetronomeConfig) -> Self {
        Self {
            config,
            period: None,
            next_beat: 0,
            beats: 0,
        }
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    /// Nanoseconds between beats, once known.
    pub fn period(&self) -> Option<u64> {
        self.period
    }

    pub fn beats(&self) -> u64 {
        self.beats
    }

    pub fn next_beat(&self) -> u64 {
        self.next_beat
    }

    /// Fixes the period. Only the first call counts.
    pub fn set_period_once(&mut self, nanos: u64) {
        if self.period.is_none() {
            let period = nanos.max(1);
            log::debug!("metronome period is {period}ns");
            self.period = Some(period);
        }
    }

    /// Returns the key to sound if a beat is due, and schedules the next one.
    /// At most one beat comes out per call, even if several are overdue.
    pub fn poll(&mut self, elapsed: u64) -> Option<u8> {
        let period = self.period?;
        if elapsed < self.next_beat {
            return None;
        }
        let key = self.config.key_for_beat(self.beats);
        self.beats += 1;
        self.next_beat = self.next_beat.saturating_add(period);
        Some(key)
    }
}
