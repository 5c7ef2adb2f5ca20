// Copyright (c) 2023 Mike Tsao. All rights reserved.

use crate::{channel_message, forward_channel_ops, MidiPortDescriptor, SinkOp};
use midir::{MidiOutput, MidiOutputConnection};
use midly::live::LiveEvent;
use std::{cell::RefCell, rc::Rc};
use thiserror::Error;
use tickwalk_core::{
    midi::{u4, MidiChannel},
    traits::{ChannelSink, SinkError, SoundSink},
    util::ChannelBank,
    MIDI_CHANNEL_COUNT,
};

const CLIENT_NAME: &str = "tickwalk";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("couldn't open the MIDI system: {0}")]
    Init(String),
    #[error("there are no MIDI output ports")]
    NoPorts,
    #[error("no MIDI output port matches '{0}'")]
    PortNotFound(String),
    #[error("couldn't connect to MIDI output port '{name}': {reason}")]
    Connect { name: String, reason: String },
}

/// Lists the MIDI output ports the system knows about right now.
pub fn list_output_ports() -> Result<Vec<MidiPortDescriptor>, OutputError> {
    let midi = MidiOutput::new(CLIENT_NAME).map_err(|e| OutputError::Init(e.to_string()))?;
    Ok(midi
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPortDescriptor {
            index,
            name: midi
                .port_name(port)
                .unwrap_or("[unnamed output]".to_string()),
        })
        .collect())
}

struct SharedConnection {
    port: MidiPortDescriptor,
    connection: MidiOutputConnection,
    buf: Vec<u8>,
}
impl std::fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedConnection")
            .field("port", &self.port)
            .finish()
    }
}

/// One channel's view of the shared port connection.
#[derive(Debug)]
pub struct MidiOutputChannel {
    channel: u4,
    connection: Rc<RefCell<SharedConnection>>,
}
impl MidiOutputChannel {
    fn send(&mut self, op: SinkOp) -> Result<(), SinkError> {
        let event = LiveEvent::Midi {
            channel: self.channel,
            message: channel_message(op),
        };
        let mut shared = self.connection.borrow_mut();
        let SharedConnection {
            connection, buf, ..
        } = &mut *shared;
        buf.clear();
        event
            .write(buf)
            .map_err(|_| SinkError::SinkUnavailable("couldn't encode MIDI message".to_string()))?;
        connection
            .send(&buf[..])
            .map_err(|e| SinkError::SinkUnavailable(e.to_string()))
    }
}
forward_channel_ops!(MidiOutputChannel);

/// Sends everything to an external MIDI output port, thanks to the `midir`
/// crate. All sixteen channels share one connection, which closes when the
/// sink is dropped.
#[derive(Debug)]
pub struct MidiOutputSink {
    bank: ChannelBank<MidiOutputChannel>,
    connection: Rc<RefCell<SharedConnection>>,
}
impl MidiOutputSink {
    /// Connects to the first port whose name contains `port_name`, or to the
    /// first port of all if no name is given.
    pub fn connect(port_name: Option<&str>) -> Result<Self, OutputError> {
        let midi = MidiOutput::new(CLIENT_NAME).map_err(|e| OutputError::Init(e.to_string()))?;
        let ports = midi.ports();
        if ports.is_empty() {
            return Err(OutputError::NoPorts);
        }
        let names: Vec<String> = ports
            .iter()
            .map(|port| midi.port_name(port).unwrap_or_default())
            .collect();
        let index = match port_name {
            Some(wanted) => names
                .iter()
                .position(|name| name.contains(wanted))
                .ok_or_else(|| OutputError::PortNotFound(wanted.to_string()))?,
            None => 0,
        };
        let descriptor = MidiPortDescriptor {
            index,
            name: names[index].clone(),
        };
        let connection = midi
            .connect(&ports[index], CLIENT_NAME)
            .map_err(|e| OutputError::Connect {
                name: descriptor.name.clone(),
                reason: e.to_string(),
            })?;
        log::info!("connected to MIDI output {descriptor}");

        let connection = Rc::new(RefCell::new(SharedConnection {
            port: descriptor,
            connection,
            buf: Vec::with_capacity(3),
        }));
        let channels = (0..MIDI_CHANNEL_COUNT)
            .map(|channel| MidiOutputChannel {
                channel: u4::from(channel as u8),
                connection: Rc::clone(&connection),
            })
            .collect();
        Ok(Self {
            bank: ChannelBank::new_with(channels),
            connection,
        })
    }

    pub fn port(&self) -> MidiPortDescriptor {
        self.connection.borrow().port.clone()
    }
}
impl SoundSink for MidiOutputSink {
    fn channel_count(&self) -> usize {
        self.bank.channel_count()
    }

    fn channel_mut(&mut self, channel: MidiChannel) -> Result<&mut dyn ChannelSink, SinkError> {
        self.bank.channel_mut(channel)
    }
}
