// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! The `tickwalk-settings` crate reads playback settings from YAML. The file
//! format is kept separate from the engine's own config structs so that the
//! format can stay stable while the engine changes.

use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;
use tickwalk_core::{
    config::{MetronomeConfig, PlaybackConfig},
    midi::MidiChannel,
    traits::SinkErrorPolicy,
    MIDI_CHANNEL_COUNT,
};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("couldn't read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("couldn't parse settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkErrorPolicySettings {
    #[default]
    LogAndContinue,
    Propagate,
}
impl From<SinkErrorPolicySettings> for SinkErrorPolicy {
    fn from(value: SinkErrorPolicySettings) -> Self {
        match value {
            SinkErrorPolicySettings::LogAndContinue => SinkErrorPolicy::LogAndContinue,
            SinkErrorPolicySettings::Propagate => SinkErrorPolicy::Propagate,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MetronomeSettings {
    pub enabled: bool,
    pub channel: MidiChannel,
    pub key: u8,
    pub accent_key: u8,
    pub velocity: u8,
    pub beats_per_bar: u32,
}
impl Default for MetronomeSettings {
    fn default() -> Self {
        let config = MetronomeConfig::default();
        Self {
            enabled: false,
            channel: config.channel,
            key: config.key,
            accent_key: config.accent_key,
            velocity: config.velocity,
            beats_per_bar: config.beats_per_bar,
        }
    }
}
impl MetronomeSettings {
    pub fn into_config(&self) -> Result<MetronomeConfig, SettingsError> {
        if self.channel as usize >= MIDI_CHANNEL_COUNT {
            return Err(SettingsError::Invalid(format!(
                "metronome channel {} is out of range",
                self.channel
            )));
        }
        for (name, value) in [
            ("key", self.key),
            ("accent-key", self.accent_key),
            ("velocity", self.velocity),
        ] {
            if value > 127 {
                return Err(SettingsError::Invalid(format!(
                    "metronome {name} {value} is more than 127"
                )));
            }
        }
        Ok(MetronomeConfig {
            channel: self.channel,
            key: self.key,
            accent_key: self.accent_key,
            velocity: self.velocity,
            beats_per_bar: self.beats_per_bar,
        })
    }
}

/// Everything in a playback settings file. Missing keys take their defaults,
/// so an empty document is a valid one.
///
/// ```yaml
/// speed: 1.5
/// grace-period-ms: 500
/// sink-error-policy: propagate
/// metronome:
///   enabled: true
///   beats-per-bar: 3
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlaybackSettings {
    pub speed: f64,
    pub grace_period_ms: u64,
    #[serde(rename = "bpm")]
    pub default_bpm: f64,
    pub poll_interval_ms: u64,
    pub sink_error_policy: SinkErrorPolicySettings,
    pub metronome: MetronomeSettings,
}
impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            grace_period_ms: 2000,
            default_bpm: 120.0,
            poll_interval_ms: 1,
            sink_error_policy: Default::default(),
            metronome: Default::default(),
        }
    }
}
impl PlaybackSettings {
    pub fn new_from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn new_from_yaml_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        log::debug!("loaded settings from {}", path.display());
        Self::new_from_yaml(&yaml)
    }

    pub fn to_yaml(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// How long the driving loop should sleep between polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn into_config(&self) -> Result<PlaybackConfig, SettingsError> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "speed {} must be a positive number",
                self.speed
            )));
        }
        if !self.default_bpm.is_finite() || self.default_bpm <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "bpm {} must be a positive number",
                self.default_bpm
            )));
        }
        let default_microseconds_per_beat = (60_000_000.0 / self.default_bpm).round();
        if default_microseconds_per_beat < 1.0 || default_microseconds_per_beat > 16_777_215.0 {
            return Err(SettingsError::Invalid(format!(
                "bpm {} is outside what a MIDI file can express",
                self.default_bpm
            )));
        }
        let metronome = if self.metronome.enabled {
            Some(self.metronome.into_config()?)
        } else {
            None
        };
        Ok(PlaybackConfig {
            speed: self.speed,
            grace_period: Duration::from_millis(self.grace_period_ms),
            default_microseconds_per_beat: default_microseconds_per_beat as u32,
            sink_error_policy: self.sink_error_policy.into(),
            metronome,
        })
    }
}
