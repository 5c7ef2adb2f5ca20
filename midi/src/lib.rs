// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! This crate connects the playback scheduler to the world outside it. The
//! [smf] module reads Standard MIDI Files with `midly`, and the sinks here turn
//! scheduler calls into something audible (an external MIDI port, via `midir`)
//! or visible (the log).

pub mod smf;

#[cfg(feature = "output")]
mod output;

#[cfg(feature = "output")]
pub use output::{list_output_ports, MidiOutputSink, OutputError};

use std::fmt::Display;
use tickwalk_core::{
    midi::{u14, u7, Message, MidiChannel, MidiMessage, PitchBend},
    traits::{ChannelSink, SinkError, SoundSink},
    util::ChannelBank,
    MIDI_CHANNEL_COUNT,
};

/// Identifies one of the system's MIDI ports.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MidiPortDescriptor {
    pub index: usize,
    pub name: String,
}
impl Display for MidiPortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

/// Builds the [MidiMessage] for a [ChannelSink] call. Sinks that speak real
/// MIDI bytes, or that describe what they'd send, start here.
pub(crate) fn channel_message(call: SinkOp) -> MidiMessage {
    match call {
        SinkOp::NoteOn(key, vel) => MidiMessage::NoteOn { key, vel },
        SinkOp::NoteOff(key, vel) => MidiMessage::NoteOff { key, vel },
        SinkOp::ProgramChange(program) => MidiMessage::ProgramChange { program },
        SinkOp::PitchBend(value) => MidiMessage::PitchBend {
            bend: PitchBend(value),
        },
        SinkOp::ControlChange(controller, value) => MidiMessage::Controller { controller, value },
        SinkOp::PolyPressure(key, vel) => MidiMessage::Aftertouch { key, vel },
        SinkOp::ChannelPressure(vel) => MidiMessage::ChannelAftertouch { vel },
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum SinkOp {
    NoteOn(u7, u7),
    NoteOff(u7, u7),
    ProgramChange(u7),
    PitchBend(u14),
    ControlChange(u7, u7),
    PolyPressure(u7, u7),
    ChannelPressure(u7),
}

/// Implements every [ChannelSink] method by forwarding a [SinkOp] to
/// `self.send()`.
macro_rules! forward_channel_ops {
    ($t:ty) => {
        impl tickwalk_core::traits::ChannelSink for $t {
            fn note_on(
                &mut self,
                key: tickwalk_core::midi::u7,
                velocity: tickwalk_core::midi::u7,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::NoteOn(key, velocity))
            }

            fn note_off(
                &mut self,
                key: tickwalk_core::midi::u7,
                velocity: tickwalk_core::midi::u7,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::NoteOff(key, velocity))
            }

            fn program_change(
                &mut self,
                program: tickwalk_core::midi::u7,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::ProgramChange(program))
            }

            fn set_pitch_bend(
                &mut self,
                value: tickwalk_core::midi::u14,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::PitchBend(value))
            }

            fn control_change(
                &mut self,
                controller: tickwalk_core::midi::u7,
                value: tickwalk_core::midi::u7,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::ControlChange(controller, value))
            }

            fn set_poly_pressure(
                &mut self,
                key: tickwalk_core::midi::u7,
                pressure: tickwalk_core::midi::u7,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::PolyPressure(key, pressure))
            }

            fn set_channel_pressure(
                &mut self,
                pressure: tickwalk_core::midi::u7,
            ) -> Result<(), tickwalk_core::traits::SinkError> {
                self.send(crate::SinkOp::ChannelPressure(pressure))
            }
        }
    };
}
#[cfg(feature = "output")]
pub(crate) use forward_channel_ops;

/// One channel of a [LoggingSink].
#[derive(Debug)]
pub struct LoggingChannel {
    channel: MidiChannel,
    sent: usize,
}
impl LoggingChannel {
    fn send(&mut self, op: SinkOp) -> Result<(), SinkError> {
        let message = Message::Channel {
            channel: self.channel,
            message: channel_message(op),
        };
        self.sent += 1;
        log::info!("{message}");
        Ok(())
    }

    pub fn sent(&self) -> usize {
        self.sent
    }
}
forward_channel_ops!(LoggingChannel);

/// A sink that makes no sound. It logs each call at info level, which is
/// handy for dry runs.
#[derive(Debug)]
pub struct LoggingSink {
    bank: ChannelBank<LoggingChannel>,
}
impl Default for LoggingSink {
    fn default() -> Self {
        Self {
            bank: ChannelBank::new_with(
                (0..MIDI_CHANNEL_COUNT)
                    .map(|channel| LoggingChannel {
                        channel: channel as MidiChannel,
                        sent: 0,
                    })
                    .collect(),
            ),
        }
    }
}
impl LoggingSink {
    /// Total calls across all channels.
    pub fn sent(&self) -> usize {
        self.bank.channels().iter().map(LoggingChannel::sent).sum()
    }
}
impl SoundSink for LoggingSink {
    fn channel_count(&self) -> usize {
        self.bank.channel_count()
    }

    fn channel_mut(&mut self, channel: MidiChannel) -> Result<&mut dyn ChannelSink, SinkError> {
        self.bank.channel_mut(channel)
    }
}
