// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use mlive::command::Command;
use mlive::emitter::{Emitter, DEFAULT_DURATION_UNIT};
use mlive::timer::TokioTimer;
use mlive::{config, midi, notes};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A coalescing MIDI event emitter."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available MIDI output devices.
    Devices {},
    /// Sends a note off for every note on every channel of a device.
    Panic {
        /// The device name to quiet.
        device_name: String,
    },
    /// Plays a single note through the emitter.
    Play {
        /// The device name to play through.
        device_name: String,
        /// The note to play, as a name ("c#3") or a MIDI note number.
        note: String,
        /// The velocity to play the note with.
        #[arg(short, long, default_value_t = 100)]
        velocity: u8,
        /// The note duration, in duration units.
        #[arg(short, long, default_value_t = 30)]
        duration: u32,
        /// The channel to play the note on (1-16).
        #[arg(short, long, default_value_t = 1)]
        channel: u8,
        /// The path to an emitter config with timing settings.
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = midi::list_devices()?;
            if devices.is_empty() {
                println!("No MIDI output devices found.");
                return Ok(());
            }

            println!("MIDI Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Panic { device_name } => {
            let device = midi::get_device(&device_name)?;
            for channel in 0..16 {
                for note in 0..=127 {
                    if let Some(event) = Command::note_off(channel, note).to_midi_event() {
                        device.emit(event)?;
                    }
                }
            }
        }
        Commands::Play {
            device_name,
            note,
            velocity,
            duration,
            channel,
            config,
        } => {
            let device = midi::get_device(&device_name)?;
            let mut emitter = Emitter::new(device, Arc::new(TokioTimer::new()));

            let mut duration_unit = DEFAULT_DURATION_UNIT;
            let mut late_note_offset = Duration::ZERO;
            if let Some(config) = config {
                let config = config::load(&PathBuf::from(config))?;
                duration_unit = config.duration_unit();
                late_note_offset = config.late_note_offset()?;
                emitter.set_timing(duration_unit, Some(late_note_offset));
            }

            let number = note
                .parse::<u8>()
                .ok()
                .filter(|number| *number <= 127)
                .or_else(|| notes::note_number(&note))
                .ok_or_else(|| format!("invalid note {}", note))?;

            // Channels are 1-indexed on the command line.
            let channel = channel.clamp(1, 16) - 1;
            let command = Command::note_on_with_duration(channel, number, velocity, duration)
                .ok_or("velocity and duration must be nonzero")?;

            emitter.append(command);
            emitter.flush()?;

            // Stay alive until the scheduled note off has gone out.
            let wait = duration_unit * duration + late_note_offset + Duration::from_millis(100);
            tokio::time::sleep(wait).await;
        }
    }

    Ok(())
}
