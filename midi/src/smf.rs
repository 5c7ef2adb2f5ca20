// Copyright (c) 2023 Mike Tsao. All rights reserved.

use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tickwalk_core::{
    midi::{KeySignature, Message, MetaEvent, SmpteOffset, TextKind, TimeSignature},
    sequence::{Sequence, SequenceError, Track, TrackEvent},
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("only metrical (ticks per beat) timing is supported")]
    UnsupportedTimingFormat,
    #[error("couldn't read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not a valid Standard MIDI File: {0}")]
    Parse(String),
    #[error(transparent)]
    InvalidSequence(#[from] SequenceError),
}

/// Turns a Standard MIDI File into a [Sequence].
///
/// Delta times become absolute ticks, each track counting from zero. The
/// song's length is its last event.
pub struct SmfLoader {}
impl SmfLoader {
    pub fn load(path: impl AsRef<Path>) -> Result<Sequence, LoadError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("read {} bytes from {}", data.len(), path.display());
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Sequence, LoadError> {
        let smf = Smf::parse(data).map_err(|e| LoadError::Parse(e.to_string()))?;
        let resolution = match smf.header.timing {
            Timing::Metrical(ticks_per_beat) => ticks_per_beat.as_int(),
            Timing::Timecode(..) => return Err(LoadError::UnsupportedTimingFormat),
        };
        if let midly::Format::Sequential = smf.header.format {
            log::warn!("format 2 file: its tracks will play together, not one after another");
        }

        let mut tracks = Vec::with_capacity(smf.tracks.len());
        for (track_number, raw_track) in smf.tracks.iter().enumerate() {
            // Each track's delta times start over at zero.
            let mut tick = 0_u64;
            let mut events = Vec::with_capacity(raw_track.len());
            for raw in raw_track.iter() {
                tick += raw.delta.as_int() as u64;
                match Self::convert(raw.kind) {
                    Some(message) => events.push(TrackEvent::new_with(tick, message)),
                    None => log::debug!("track {track_number}: skipped escape event at {tick}"),
                }
            }
            log::debug!("track {track_number}: {} events", events.len());
            tracks.push(Track::from(events));
        }
        Ok(Sequence::new_with(resolution, tracks)?)
    }

    fn convert(kind: TrackEventKind) -> Option<Message> {
        let message = match kind {
            TrackEventKind::Midi { channel, message } => Message::Channel {
                channel: channel.as_int(),
                message,
            },
            TrackEventKind::SysEx(bytes) => Message::SysEx(bytes.to_vec()),
            TrackEventKind::Escape(_) => return None,
            TrackEventKind::Meta(meta) => Message::Meta(Self::convert_meta(meta)),
        };
        Some(message)
    }

    fn convert_meta(meta: MetaMessage) -> MetaEvent {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        match meta {
            MetaMessage::TrackNumber(n) => MetaEvent::SequenceNumber(n),
            MetaMessage::Text(b) => MetaEvent::Text(TextKind::Text, text(b)),
            MetaMessage::Copyright(b) => MetaEvent::Text(TextKind::Copyright, text(b)),
            MetaMessage::TrackName(b) => MetaEvent::TrackName(text(b)),
            MetaMessage::InstrumentName(b) => MetaEvent::InstrumentName(text(b)),
            MetaMessage::Lyric(b) => MetaEvent::Text(TextKind::Lyric, text(b)),
            MetaMessage::Marker(b) => MetaEvent::Text(TextKind::Marker, text(b)),
            MetaMessage::CuePoint(b) => MetaEvent::Text(TextKind::CuePoint, text(b)),
            MetaMessage::ProgramName(b) => MetaEvent::Text(TextKind::ProgramName, text(b)),
            MetaMessage::DeviceName(b) => MetaEvent::Text(TextKind::DeviceName, text(b)),
            MetaMessage::MidiChannel(channel) => MetaEvent::ChannelPrefix(channel.as_int()),
            MetaMessage::MidiPort(port) => MetaEvent::MidiPort(port.as_int()),
            MetaMessage::EndOfTrack => MetaEvent::EndOfTrack,
            MetaMessage::Tempo(tempo) => MetaEvent::SetTempo(tempo.as_int()),
            MetaMessage::SmpteOffset(time) => MetaEvent::SmpteOffset(SmpteOffset {
                hours: time.hour(),
                minutes: time.minute(),
                seconds: time.second(),
                frames: time.frame(),
                subframes: time.subframe(),
            }),
            MetaMessage::TimeSignature(numerator, denominator_exp, _, _) => {
                MetaEvent::TimeSignature(TimeSignature {
                    numerator,
                    denominator_exp,
                })
            }
            MetaMessage::KeySignature(accidentals, minor) => {
                MetaEvent::KeySignature(KeySignature {
                    accidentals,
                    is_major: !minor,
                })
            }
            MetaMessage::SequencerSpecific(b) => MetaEvent::SequencerSpecific(b.to_vec()),
            MetaMessage::Unknown(kind, b) => MetaEvent::Unknown(kind, b.to_vec()),
        }
    }
}
