// Copyright (c) 2023 Mike Tsao. All rights reserved.

//! The CLI (command-line interface) tool plays and inspects MIDI files.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tickwalk::{app_version, play_simulated, PlaybackScheduler, TrackState};
use tickwalk_core::{
    config::PlaybackConfig,
    midi::{Message, MetaEvent},
    sequence::Sequence,
    time::{ManualClock, MidiTicks, TempoMap},
    traits::{SoundSink, Terminates},
    NANOS_PER_SECOND,
};
use tickwalk_midi::{smf::SmfLoader, LoggingSink};
use tickwalk_settings::PlaybackSettings;

#[derive(Parser, Debug)]
#[clap(author, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable debug mode
    #[clap(short = 'd', long, value_parser)]
    debug: bool,

    /// Print version and exit
    #[clap(short = 'v', long, value_parser)]
    version: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a MIDI file
    Play {
        /// The Standard MIDI File to play
        file: PathBuf,

        /// Output port (any port whose name contains this text)
        #[clap(short = 'p', long)]
        port: Option<String>,

        /// Playback speed; 2.0 is twice as fast
        #[clap(short = 's', long)]
        speed: Option<f64>,

        /// Sound a metronome along with the song
        #[clap(short = 'm', long, value_parser)]
        metronome: bool,

        /// How long to let the last notes ring, in milliseconds
        #[clap(long)]
        grace_ms: Option<u64>,

        /// YAML playback settings. Flags override them.
        #[clap(long)]
        settings: Option<PathBuf>,

        /// Log what would be played, as fast as possible, without sound
        #[clap(long, value_parser)]
        dry_run: bool,
    },
    /// List the events in a MIDI file
    Dump {
        /// The Standard MIDI File to list
        file: PathBuf,
    },
    /// List the MIDI output ports
    Ports,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.debug { "debug" } else { "info" }),
    )
    .init();

    if args.version {
        println!("tickwalk-cli {}", app_version());
        return Ok(());
    }

    match args.command {
        Some(Command::Play {
            file,
            port,
            speed,
            metronome,
            grace_ms,
            settings,
            dry_run,
        }) => {
            let mut settings = match settings {
                Some(path) => PlaybackSettings::new_from_yaml_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => PlaybackSettings::default(),
            };
            if let Some(speed) = speed {
                settings.speed = speed;
            }
            if let Some(grace_ms) = grace_ms {
                settings.grace_period_ms = grace_ms;
            }
            if metronome {
                settings.metronome.enabled = true;
            }
            let config = settings.into_config()?;
            let sequence = load(&file)?;

            if dry_run {
                let mut scheduler = PlaybackScheduler::new_with(
                    sequence,
                    LoggingSink::default(),
                    ManualClock::new(),
                    config,
                )?;
                let nanos = play_simulated(&mut scheduler)?;
                println!(
                    "{} events, {} sink calls, {:.3}s",
                    scheduler.dispatched_count(),
                    scheduler.sink().sent(),
                    nanos as f64 / NANOS_PER_SECOND as f64
                );
                Ok(())
            } else {
                play_live(sequence, port.as_deref(), config, settings.poll_interval())
            }
        }
        Some(Command::Dump { file }) => dump(&load(&file)?),
        Some(Command::Ports) => list_ports(),
        None => Err(anyhow!("nothing to do; try --help")),
    }
}

fn load(path: &Path) -> anyhow::Result<Sequence> {
    SmfLoader::load(path).with_context(|| format!("loading {}", path.display()))
}

fn run_until_finished<S: SoundSink>(
    sequence: Sequence,
    sink: S,
    config: PlaybackConfig,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    let mut scheduler = PlaybackScheduler::new(sequence, sink, config)?;
    scheduler.start();
    while !scheduler.is_finished() {
        scheduler.catch_up()?;
        std::thread::sleep(scheduler.time_until_wakeup(poll_interval));
    }
    Ok(())
}

#[cfg(feature = "midi-output")]
fn play_live(
    sequence: Sequence,
    port: Option<&str>,
    config: PlaybackConfig,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    let sink = tickwalk_midi::MidiOutputSink::connect(port)?;
    println!("Playing to {}", sink.port());
    run_until_finished(sequence, sink, config, poll_interval)
}

#[cfg(not(feature = "midi-output"))]
fn play_live(
    sequence: Sequence,
    port: Option<&str>,
    config: PlaybackConfig,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    if port.is_some() {
        log::warn!("built without MIDI output; ignoring the port and logging instead");
    }
    run_until_finished(sequence, LoggingSink::default(), config, poll_interval)
}

#[cfg(feature = "midi-output")]
fn list_ports() -> anyhow::Result<()> {
    let ports = tickwalk_midi::list_output_ports()?;
    if ports.is_empty() {
        println!("No MIDI output ports");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

#[cfg(not(feature = "midi-output"))]
fn list_ports() -> anyhow::Result<()> {
    Err(anyhow!("built without MIDI output support"))
}

fn dump(sequence: &Sequence) -> anyhow::Result<()> {
    // Tempo changes from every track, in the order playback would see them.
    let mut tempo_changes: Vec<(MidiTicks, usize, u32)> = Vec::default();
    for (index, track) in sequence.tracks().iter().enumerate() {
        for event in track.events() {
            if let Message::Meta(MetaEvent::SetTempo(tempo)) = event.message {
                tempo_changes.push((event.tick, index, tempo));
            }
        }
    }
    tempo_changes.sort_by_key(|(tick, track, _)| (*tick, *track));
    let mut tempo_map = TempoMap::new_with(
        sequence.resolution(),
        tickwalk_core::DEFAULT_MICROSECONDS_PER_BEAT,
    );
    for (tick, _, tempo) in tempo_changes {
        tempo_map.set_tempo(tick, tempo);
    }

    println!(
        "{} ticks per beat, {} ticks, {:.3}s",
        sequence.resolution(),
        sequence.tick_length(),
        tempo_map.ticks_to_nanos(sequence.tick_length()) as f64 / NANOS_PER_SECOND as f64
    );
    for (index, track) in sequence.tracks().iter().enumerate() {
        let mut state = TrackState::default();
        track.events().iter().for_each(|e| state.apply(&e.message));
        println!();
        println!("Track {index}: {state}, {} events", track.len());
        for event in track.events() {
            println!("{:>10}  {}", event.tick.0, event.message);
        }
    }
    Ok(())
}
