// Copyright (c) 2023 Mike Tsao. All rights reserved.

use std::fmt::Display;
use tickwalk_core::midi::{
    tempo_to_bpm, KeySignature, Message, MetaEvent, MidiChannel, MidiMessage, SmpteOffset,
    TimeSignature, PITCH_BEND_CENTER,
};

/// What a track has said about itself so far. It changes only through
/// [TrackState::apply()], one event at a time, in the order the track lists
/// them.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackState {
    channel: MidiChannel,
    program: u8,
    pitch_bend: u16,
    microseconds_per_beat: Option<u32>,
    name: Option<String>,
    instrument: Option<String>,
    time_signature: TimeSignature,
    key_signature: KeySignature,
    smpte_offset: Option<SmpteOffset>,
}
impl Default for TrackState {
    fn default() -> Self {
        Self {
            channel: 0,
            program: 0,
            pitch_bend: PITCH_BEND_CENTER,
            microseconds_per_beat: None,
            name: None,
            instrument: None,
            time_signature: TimeSignature::default(),
            key_signature: KeySignature::default(),
            smpte_offset: None,
        }
    }
}
impl TrackState {
    pub fn apply(&mut self, message: &Message) {
        match message {
            Message::Channel { channel, message } => {
                self.channel = *channel;
                match message {
                    MidiMessage::ProgramChange { program } => self.program = program.as_int(),
                    MidiMessage::PitchBend { bend } => self.pitch_bend = bend.0.as_int(),
                    _ => {}
                }
            }
            Message::Meta(meta) => match meta {
                MetaEvent::TrackName(name) => self.name = Some(name.clone()),
                MetaEvent::InstrumentName(name) => self.instrument = Some(name.clone()),
                MetaEvent::ChannelPrefix(channel) => self.channel = *channel,
                MetaEvent::SetTempo(tempo) => {
                    if *tempo != 0 {
                        self.microseconds_per_beat = Some(*tempo);
                    }
                }
                MetaEvent::SmpteOffset(offset) => self.smpte_offset = Some(*offset),
                MetaEvent::TimeSignature(ts) => self.time_signature = *ts,
                MetaEvent::KeySignature(ks) => self.key_signature = *ks,
                MetaEvent::SequenceNumber(_)
                | MetaEvent::Text(..)
                | MetaEvent::MidiPort(_)
                | MetaEvent::EndOfTrack
                | MetaEvent::SequencerSpecific(_)
                | MetaEvent::Unknown(..) => {}
            },
            Message::SysEx(_) => {}
        }
    }

    /// The channel the track's messages go to.
    pub fn channel(&self) -> MidiChannel {
        self.channel
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    /// Raw 14-bit value. 8192 means no bend.
    pub fn pitch_bend(&self) -> u16 {
        self.pitch_bend
    }

    /// This track's most recent tempo. Timing comes from the song-wide
    /// [TempoMap](tickwalk_core::time::TempoMap), not from here.
    pub fn microseconds_per_beat(&self) -> Option<u32> {
        self.microseconds_per_beat
    }

    pub fn bpm(&self) -> Option<f64> {
        self.microseconds_per_beat.map(tempo_to_bpm)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn instrument(&self) -> Option<&str> {
        self.instrument.as_deref()
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn key_signature(&self) -> KeySignature {
        self.key_signature
    }

    pub fn smpte_offset(&self) -> Option<SmpteOffset> {
        self.smpte_offset
    }
}
impl Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name().unwrap_or("(untitled)"))?;
        if let Some(instrument) = self.instrument() {
            write!(f, " [{instrument}]")?;
        }
        write!(
            f,
            " ch {} | {} | {}",
            self.channel, self.time_signature, self.key_signature
        )?;
        if let Some(bpm) = self.bpm() {
            write!(f, " | {bpm:.2} BPM")?;
        }
        Ok(())
    }
}
