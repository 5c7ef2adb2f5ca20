// Copyright (c) 2023 Mike Tsao. All rights reserved.

pub use midly::{
    num::{u14, u4, u7},
    MidiMessage, PitchBend,
};

use crate::GM_PERCUSSION_CHANNEL;
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::fmt::Display;
use strum_macros::Display;

pub type MidiChannel = u8;

/// The controller number that asks a channel to release every sounding note.
pub const ALL_NOTES_OFF_CONTROLLER: u8 = 123;

/// The centre (no bend) position of a 14-bit pitch-bend value.
pub const PITCH_BEND_CENTER: u16 = 8192;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Returns the scientific-pitch name of a MIDI key, e.g. 60 is "C4".
pub fn note_name(key: u8) -> String {
    let octave = (key / 12) as i8 - 1;
    format!("{}{}", NOTE_NAMES[(key % 12) as usize], octave)
}

/// The kinds of free-text meta events. They all carry a string and none of
/// them affect playback.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum TextKind {
    #[strum(serialize = "Text event")]
    Text,
    #[strum(serialize = "Copyright notice")]
    Copyright,
    #[strum(serialize = "Lyric")]
    Lyric,
    #[strum(serialize = "Marker")]
    Marker,
    #[strum(serialize = "Cue point")]
    CuePoint,
    #[strum(serialize = "Program name")]
    ProgramName,
    #[strum(serialize = "Device name")]
    DeviceName,
}

/// An SMPTE start offset. Under tick-based timing it's informational only.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SmpteOffset {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub subframes: u8,
}
impl Display for SmpteOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:02}.{:02}",
            self.hours, self.minutes, self.seconds, self.frames, self.subframes
        )
    }
}

/// A time signature as a Standard MIDI File stores it: the denominator is a
/// power of two.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator_exp: u8,
}
impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator_exp: 2,
        }
    }
}
impl TimeSignature {
    pub fn denominator(&self) -> u32 {
        1_u32.checked_shl(self.denominator_exp.into()).unwrap_or(0)
    }
}
impl Display for TimeSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator())
    }
}

/// Number of sharps (positive) or flats (negative) around C, plus the mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeySignature {
    pub accidentals: i8,
    pub is_major: bool,
}
impl Default for KeySignature {
    fn default() -> Self {
        Self {
            accidentals: 0,
            is_major: true,
        }
    }
}
impl Display for KeySignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.is_major { "Major" } else { "Minor" };
        match self.accidentals {
            0 => write!(f, "Key of C ({mode})"),
            n if n > 0 => write!(f, "Key of {n} sharps ({mode})"),
            n => write!(f, "Key of {} flats ({mode})", n.unsigned_abs()),
        }
    }
}

/// Meta events: non-audible data that changes how the rest of a track is
/// interpreted, or that just describes it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MetaEvent {
    SequenceNumber(Option<u16>),
    Text(TextKind, String),
    TrackName(String),
    InstrumentName(String),
    ChannelPrefix(MidiChannel),
    MidiPort(u8),
    EndOfTrack,
    SetTempo(u32),
    SmpteOffset(SmpteOffset),
    TimeSignature(TimeSignature),
    KeySignature(KeySignature),
    SequencerSpecific(Vec<u8>),
    Unknown(u8, Vec<u8>),
}

/// Everything a track can hold. This is a closed set, so the dispatcher can
/// match it exhaustively.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Message {
    Channel {
        channel: MidiChannel,
        message: MidiMessage,
    },
    Meta(MetaEvent),
    SysEx(Vec<u8>),
}
impl Message {
    pub fn note_on(channel: MidiChannel, key: u8, vel: u8) -> Self {
        Message::Channel {
            channel,
            message: MidiMessage::NoteOn {
                key: u7::from(key),
                vel: u7::from(vel),
            },
        }
    }

    pub fn note_off(channel: MidiChannel, key: u8, vel: u8) -> Self {
        Message::Channel {
            channel,
            message: MidiMessage::NoteOff {
                key: u7::from(key),
                vel: u7::from(vel),
            },
        }
    }

    pub fn program_change(channel: MidiChannel, program: u8) -> Self {
        Message::Channel {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::from(program),
            },
        }
    }

    pub fn set_tempo(microseconds_per_beat: u32) -> Self {
        Message::Meta(MetaEvent::SetTempo(microseconds_per_beat))
    }

    pub fn is_channel_message(&self) -> bool {
        matches!(self, Message::Channel { .. })
    }
}

/// Converts microseconds per beat into beats per minute, for display.
pub fn tempo_to_bpm(microseconds_per_beat: u32) -> f64 {
    if microseconds_per_beat == 0 {
        return 0.0;
    }
    60_000_000.0 / microseconds_per_beat as f64
}

fn describe_key(channel: MidiChannel, key: u8) -> String {
    if channel == GM_PERCUSSION_CHANNEL {
        if let Some(drum) = GeneralMidiPercussionProgram::from_u8(key) {
            return drum.to_string();
        }
    }
    note_name(key)
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Channel { channel, message } => {
                write!(f, "Ch{channel}\t")?;
                match message {
                    MidiMessage::NoteOn { key, vel } => write!(
                        f,
                        "{} On  | force: {}",
                        describe_key(*channel, key.as_int()),
                        vel.as_int()
                    ),
                    MidiMessage::NoteOff { key, .. } => {
                        write!(f, "{} Off |", describe_key(*channel, key.as_int()))
                    }
                    MidiMessage::Aftertouch { key, vel } => write!(
                        f,
                        "Poly Pressure: {} {}",
                        describe_key(*channel, key.as_int()),
                        vel.as_int()
                    ),
                    MidiMessage::Controller { controller, value } => write!(
                        f,
                        "Control Change: ({:02X}, {:02X})",
                        controller.as_int(),
                        value.as_int()
                    ),
                    MidiMessage::ProgramChange { program } => {
                        match GeneralMidiProgram::from_u8(program.as_int()) {
                            Some(name) => write!(f, "Program Change: {name}"),
                            None => write!(f, "Program Change: {}", program.as_int()),
                        }
                    }
                    MidiMessage::ChannelAftertouch { vel } => {
                        write!(f, "Channel Pressure: {}", vel.as_int())
                    }
                    MidiMessage::PitchBend { bend } => {
                        write!(f, "Pitch Bend: {}", bend.0.as_int())
                    }
                }
            }
            Message::Meta(meta) => match meta {
                MetaEvent::SequenceNumber(n) => match n {
                    Some(n) => write!(f, "Sequence Number: {n}"),
                    None => write!(f, "Sequence Number: (track index)"),
                },
                MetaEvent::Text(kind, text) => write!(f, "{kind}: {text}"),
                MetaEvent::TrackName(name) => write!(f, "Track name: {name}"),
                MetaEvent::InstrumentName(name) => write!(f, "Instrument name: {name}"),
                MetaEvent::ChannelPrefix(channel) => {
                    write!(f, "MIDI channel prefix: {channel}")
                }
                MetaEvent::MidiPort(port) => write!(f, "MIDI port: {port}"),
                MetaEvent::EndOfTrack => write!(f, "End of track"),
                MetaEvent::SetTempo(tempo) => {
                    write!(f, "Set tempo: {:.2} BPM", tempo_to_bpm(*tempo))
                }
                MetaEvent::SmpteOffset(offset) => write!(f, "SMPTE offset: {offset}"),
                MetaEvent::TimeSignature(ts) => write!(f, "Time signature: {ts}"),
                MetaEvent::KeySignature(ks) => write!(f, "Key signature: {ks}"),
                MetaEvent::SequencerSpecific(bytes) => {
                    write!(f, "Sequencer-specific event:")?;
                    for b in bytes {
                        write!(f, " {b:02X}")?;
                    }
                    Ok(())
                }
                MetaEvent::Unknown(kind, _) => write!(f, "Unknown meta event {kind:02X}"),
            },
            Message::SysEx(bytes) => {
                write!(f, "Sysex message:")?;
                for b in bytes {
                    write!(f, " {b:02X}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Display, Primitive, Debug)]
pub enum GeneralMidiProgram {
    AcousticGrand = 0,
    BrightAcoustic = 1,
    ElectricGrand = 2,
    HonkyTonk = 3,
    ElectricPiano1 = 4,
    ElectricPiano2 = 5,
    Harpsichord = 6,
    Clav = 7,
    Celesta = 8,
    Glockenspiel = 9,
    MusicBox = 10,
    Vibraphone = 11,
    Marimba = 12,
    Xylophone = 13,
    TubularBells = 14,
    Dulcimer = 15,
    DrawbarOrgan = 16,
    PercussiveOrgan = 17,
    RockOrgan = 18,
    ChurchOrgan = 19,
    ReedOrgan = 20,
    Accordion = 21,
    Harmonica = 22,
    TangoAccordion = 23,
    AcousticGuitarNylon = 24,
    AcousticGuitarSteel = 25,
    ElectricGuitarJazz = 26,
    ElectricGuitarClean = 27,
    ElectricGuitarMuted = 28,
    OverdrivenGuitar = 29,
    DistortionGuitar = 30,
    GuitarHarmonics = 31,
    AcousticBass = 32,
    ElectricBassFinger = 33,
    ElectricBassPick = 34,
    FretlessBass = 35,
    SlapBass1 = 36,
    SlapBass2 = 37,
    SynthBass1 = 38,
    SynthBass2 = 39,
    Violin = 40,
    Viola = 41,
    Cello = 42,
    Contrabass = 43,
    TremoloStrings = 44,
    PizzicatoStrings = 45,
    OrchestralHarp = 46,
    Timpani = 47,
    StringEnsemble1 = 48,
    StringEnsemble2 = 49,
    Synthstrings1 = 50,
    Synthstrings2 = 51,
    ChoirAahs = 52,
    VoiceOohs = 53,
    SynthVoice = 54,
    OrchestraHit = 55,
    Trumpet = 56,
    Trombone = 57,
    Tuba = 58,
    MutedTrumpet = 59,
    FrenchHorn = 60,
    BrassSection = 61,
    Synthbrass1 = 62,
    Synthbrass2 = 63,
    SopranoSax = 64,
    AltoSax = 65,
    TenorSax = 66,
    BaritoneSax = 67,
    Oboe = 68,
    EnglishHorn = 69,
    Bassoon = 70,
    Clarinet = 71,
    Piccolo = 72,
    Flute = 73,
    Recorder = 74,
    PanFlute = 75,
    BlownBottle = 76,
    Shakuhachi = 77,
    Whistle = 78,
    Ocarina = 79,
    Lead1Square = 80,
    Lead2Sawtooth = 81,
    Lead3Calliope = 82,
    Lead4Chiff = 83,
    Lead5Charang = 84,
    Lead6Voice = 85,
    Lead7Fifths = 86,
    Lead8BassLead = 87,
    Pad1NewAge = 88,
    Pad2Warm = 89,
    Pad3Polysynth = 90,
    Pad4Choir = 91,
    Pad5Bowed = 92,
    Pad6Metallic = 93,
    Pad7Halo = 94,
    Pad8Sweep = 95,
    Fx1Rain = 96,
    Fx2Soundtrack = 97,
    Fx3Crystal = 98,
    Fx4Atmosphere = 99,
    Fx5Brightness = 100,
    Fx6Goblins = 101,
    Fx7Echoes = 102,
    Fx8SciFi = 103,
    Sitar = 104,
    Banjo = 105,
    Shamisen = 106,
    Koto = 107,
    Kalimba = 108,
    Bagpipe = 109,
    Fiddle = 110,
    Shanai = 111,
    TinkleBell = 112,
    Agogo = 113,
    SteelDrums = 114,
    Woodblock = 115,
    TaikoDrum = 116,
    MelodicTom = 117,
    SynthDrum = 118,
    ReverseCymbal = 119,
    GuitarFretNoise = 120,
    BreathNoise = 121,
    Seashore = 122,
    BirdTweet = 123,
    TelephoneRing = 124,
    Helicopter = 125,
    Applause = 126,
    Gunshot = 127,
}

/// Key numbers of the General MIDI percussion map (channel 10).
#[derive(Clone, Copy, Display, Primitive, Debug)]
pub enum GeneralMidiPercussionProgram {
    AcousticBassDrum = 35,
    ElectricBassDrum = 36,
    SideStick = 37,
    AcousticSnare = 38,
    HandClap = 39,
    ElectricSnare = 40,
    LowFloorTom = 41,
    ClosedHiHat = 42,
    HighFloorTom = 43,
    PedalHiHat = 44,
    LowTom = 45,
    OpenHiHat = 46,
    LowMidTom = 47,
    HiMidTom = 48,
    CrashCymbal1 = 49,
    HighTom = 50,
    RideCymbal1 = 51,
    ChineseCymbal = 52,
    RideBell = 53,
    Tambourine = 54,
    SplashCymbal = 55,
    Cowbell = 56,
    CrashCymbal2 = 57,
    Vibraslap = 58,
    RideCymbal2 = 59,
    HighBongo = 60,
    LowBongo = 61,
    MuteHighConga = 62,
    OpenHighConga = 63,
    LowConga = 64,
    HighTimbale = 65,
    LowTimbale = 66,
    HighAgogo = 67,
    LowAgogo = 68,
    Cabasa = 69,
    Maracas = 70,
    ShortWhistle = 71,
    LongWhistle = 72,
    ShortGuiro = 73,
    LongGuiro = 74,
    Claves = 75,
    HighWoodblock = 76,
    LowWoodblock = 77,
    MuteCuica = 78,
    OpenCuica = 79,
    MuteTriangle = 80,
    OpenTriangle = 81,
}
