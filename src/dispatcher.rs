// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::track_state::TrackState;
use tickwalk_core::{
    midi::{u7, MetaEvent, Message, MidiChannel, MidiMessage, ALL_NOTES_OFF_CONTROLLER},
    sequence::TrackEvent,
    time::TempoMap,
    traits::{SinkError, SoundSink},
    MIDI_CHANNEL_COUNT,
};

/// Turns track events into [SoundSink] calls.
#[derive(Debug)]
pub struct EventDispatcher<S: SoundSink> {
    sink: S,

    // Bit n is set once channel n has been sent a NoteOn.
    sounded_channels: u32,
}
impl<S: SoundSink> EventDispatcher<S> {
    /// Fails with [SinkError::SinkUnavailable] unless the sink has between one
    /// and sixteen channels.
    pub fn new_with(sink: S) -> Result<Self, SinkError> {
        let count = sink.channel_count();
        if count == 0 || count > MIDI_CHANNEL_COUNT {
            return Err(SinkError::SinkUnavailable(format!(
                "sink has {count} channels, but it needs between 1 and {MIDI_CHANNEL_COUNT}"
            )));
        }
        Ok(Self {
            sink,
            sounded_channels: 0,
        })
    }

    /// Brings `state` (and `tempo_map`, for tempo changes) up to date with the
    /// event, then makes at most one sink call.
    pub fn dispatch(
        &mut self,
        event: &TrackEvent,
        state: &mut TrackState,
        tempo_map: &mut TempoMap,
    ) -> Result<(), SinkError> {
        state.apply(&event.message);
        match &event.message {
            Message::Channel { message, .. } => {
                let channel = state.channel();
                let sink = self.sink.channel_mut(channel)?;
                match *message {
                    MidiMessage::NoteOn { key, vel } => {
                        self.sounded_channels |= 1 << channel;
                        sink.note_on(key, vel)
                    }
                    MidiMessage::NoteOff { key, vel } => sink.note_off(key, vel),
                    MidiMessage::Aftertouch { key, vel } => sink.set_poly_pressure(key, vel),
                    MidiMessage::Controller { controller, value } => {
                        sink.control_change(controller, value)
                    }
                    MidiMessage::ProgramChange { program } => sink.program_change(program),
                    MidiMessage::ChannelAftertouch { vel } => sink.set_channel_pressure(vel),
                    MidiMessage::PitchBend { bend } => sink.set_pitch_bend(bend.0),
                }
            }
            Message::Meta(MetaEvent::SetTempo(tempo)) => {
                tempo_map.set_tempo(event.tick, *tempo);
                Ok(())
            }
            Message::Meta(_) | Message::SysEx(_) => Ok(()),
        }
    }

    /// A short note: NoteOn immediately followed by NoteOff.
    pub fn click(&mut self, channel: MidiChannel, key: u8, velocity: u8) -> Result<(), SinkError> {
        let sink = self.sink.channel_mut(channel)?;
        sink.note_on(u7::from(key), u7::from(velocity))?;
        sink.note_off(u7::from(key), u7::from(0))
    }

    /// Tells every channel that has played a note to release everything it's
    /// holding. Each channel is tried even if an earlier one fails, and the
    /// failures come back in channel order.
    pub fn all_notes_off(&mut self) -> Vec<(MidiChannel, SinkError)> {
        let mut failures = Vec::default();
        for channel in self.sounded_channels() {
            let result = self.sink.channel_mut(channel).and_then(|sink| {
                sink.control_change(u7::from(ALL_NOTES_OFF_CONTROLLER), u7::from(0))
            });
            if let Err(e) = result {
                failures.push((channel, e));
            }
        }
        self.sounded_channels = 0;
        failures
    }

    pub fn sounded_channels(&self) -> Vec<MidiChannel> {
        (0..MIDI_CHANNEL_COUNT as MidiChannel)
            .filter(|channel| self.sounded_channels & (1 << channel) != 0)
            .collect()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
