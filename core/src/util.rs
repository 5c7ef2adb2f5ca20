// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{
    midi::{u14, u7, MidiChannel},
    traits::{ChannelSink, SinkError, SoundSink},
};
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

/// A fixed-size bank of channels. The channel number is an index into the
/// bank, checked on every lookup.
#[derive(Debug)]
pub struct ChannelBank<C: ChannelSink> {
    channels: Vec<C>,
}
impl<C: ChannelSink> ChannelBank<C> {
    pub fn new_with(channels: Vec<C>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[C] {
        &self.channels
    }
}
impl<C: ChannelSink> SoundSink for ChannelBank<C> {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn channel_mut(&mut self, channel: MidiChannel) -> Result<&mut dyn ChannelSink, SinkError> {
        match self.channels.get_mut(channel as usize) {
            Some(c) => Ok(c),
            None => Err(SinkError::InvalidChannel(channel)),
        }
    }
}

/// One call that reached a [RecordingSink].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SinkCall {
    NoteOn {
        channel: MidiChannel,
        key: u8,
        velocity: u8,
    },
    NoteOff {
        channel: MidiChannel,
        key: u8,
        velocity: u8,
    },
    ProgramChange {
        channel: MidiChannel,
        program: u8,
    },
    PitchBend {
        channel: MidiChannel,
        value: u16,
    },
    ControlChange {
        channel: MidiChannel,
        controller: u8,
        value: u8,
    },
    PolyPressure {
        channel: MidiChannel,
        key: u8,
        pressure: u8,
    },
    ChannelPressure {
        channel: MidiChannel,
        pressure: u8,
    },
}
impl SinkCall {
    pub fn channel(&self) -> MidiChannel {
        match self {
            SinkCall::NoteOn { channel, .. }
            | SinkCall::NoteOff { channel, .. }
            | SinkCall::ProgramChange { channel, .. }
            | SinkCall::PitchBend { channel, .. }
            | SinkCall::ControlChange { channel, .. }
            | SinkCall::PolyPressure { channel, .. }
            | SinkCall::ChannelPressure { channel, .. } => *channel,
        }
    }
}

#[derive(Debug)]
pub struct RecordingChannel {
    channel: MidiChannel,
    calls: Rc<RefCell<Vec<SinkCall>>>,
    unavailable: Rc<Cell<bool>>,
}
impl RecordingChannel {
    fn record(&mut self, call: SinkCall) -> Result<(), SinkError> {
        if self.unavailable.get() {
            return Err(SinkError::SinkUnavailable(format!(
                "channel {} is switched off",
                self.channel
            )));
        }
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}
impl ChannelSink for RecordingChannel {
    fn note_on(&mut self, key: u7, velocity: u7) -> Result<(), SinkError> {
        self.record(SinkCall::NoteOn {
            channel: self.channel,
            key: key.as_int(),
            velocity: velocity.as_int(),
        })
    }

    fn note_off(&mut self, key: u7, velocity: u7) -> Result<(), SinkError> {
        self.record(SinkCall::NoteOff {
            channel: self.channel,
            key: key.as_int(),
            velocity: velocity.as_int(),
        })
    }

    fn program_change(&mut self, program: u7) -> Result<(), SinkError> {
        self.record(SinkCall::ProgramChange {
            channel: self.channel,
            program: program.as_int(),
        })
    }

    fn set_pitch_bend(&mut self, value: u14) -> Result<(), SinkError> {
        self.record(SinkCall::PitchBend {
            channel: self.channel,
            value: value.as_int(),
        })
    }

    fn control_change(&mut self, controller: u7, value: u7) -> Result<(), SinkError> {
        self.record(SinkCall::ControlChange {
            channel: self.channel,
            controller: controller.as_int(),
            value: value.as_int(),
        })
    }

    fn set_poly_pressure(&mut self, key: u7, pressure: u7) -> Result<(), SinkError> {
        self.record(SinkCall::PolyPressure {
            channel: self.channel,
            key: key.as_int(),
            pressure: pressure.as_int(),
        })
    }

    fn set_channel_pressure(&mut self, pressure: u7) -> Result<(), SinkError> {
        self.record(SinkCall::ChannelPressure {
            channel: self.channel,
            pressure: pressure.as_int(),
        })
    }
}

/// Remembers every call it receives, in order. Clones share the same log, so
/// keep one to inspect after handing the other to a scheduler.
#[derive(Debug)]
pub struct RecordingSink {
    bank: ChannelBank<RecordingChannel>,
    calls: Rc<RefCell<Vec<SinkCall>>>,
    unavailable: Rc<Cell<bool>>,
}
impl RecordingSink {
    pub fn new_with(channel_count: usize) -> Self {
        let calls: Rc<RefCell<Vec<SinkCall>>> = Default::default();
        let unavailable: Rc<Cell<bool>> = Default::default();
        let channels = (0..channel_count)
            .map(|channel| RecordingChannel {
                channel: channel as MidiChannel,
                calls: Rc::clone(&calls),
                unavailable: Rc::clone(&unavailable),
            })
            .collect();
        Self {
            bank: ChannelBank::new_with(channels),
            calls,
            unavailable,
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// While set, every channel operation fails with
    /// [SinkError::SinkUnavailable].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }
}
impl Clone for RecordingSink {
    fn clone(&self) -> Self {
        let channels = self
            .bank
            .channels()
            .iter()
            .map(|c| RecordingChannel {
                channel: c.channel,
                calls: Rc::clone(&self.calls),
                unavailable: Rc::clone(&self.unavailable),
            })
            .collect();
        Self {
            bank: ChannelBank::new_with(channels),
            calls: Rc::clone(&self.calls),
            unavailable: Rc::clone(&self.unavailable),
        }
    }
}
impl SoundSink for RecordingSink {
    fn channel_count(&self) -> usize {
        self.bank.channel_count()
    }

    fn channel_mut(&mut self, channel: MidiChannel) -> Result<&mut dyn ChannelSink, SinkError> {
        self.bank.channel_mut(channel)
    }
}
