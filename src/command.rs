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
use midly::{
    live::LiveEvent,
    num::{u14, u4, u7},
};

/// The largest controller number that is a regular control change. Controllers
/// 120-127 are channel mode messages and are not emitted by this crate.
const MAX_CONTROLLER: u8 = 119;

/// A high-level musical command queued by the caller. All fields are clamped
/// to their MIDI ranges by the constructors, so downstream consumers never
/// re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Turns a note on and leaves it on until an explicit note off.
    NoteOn { channel: u4, note: u7, velocity: u7 },

    /// Turns a note on and schedules its note off `duration` duration units
    /// in the future.
    NoteOnWithDuration {
        channel: u4,
        note: u7,
        velocity: u7,
        duration: u32,
    },

    /// Turns a note off.
    NoteOff { channel: u4, note: u7 },

    /// Sets a continuous controller to a value.
    ControlChange {
        channel: u4,
        controller: u7,
        value: u7,
    },

    /// Bends pitch. The two 7-bit halves form a 14-bit value centered at 8192.
    PitchBend { channel: u4, lsb: u7, msb: u7 },

    /// Turns off every currently-playing note on the channel.
    ResetNotes { channel: u4 },
}

impl Command {
    /// Creates a note on command. A velocity of zero would act as a note off
    /// on most devices, so it produces no command instead.
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Option<Command> {
        let velocity = u7::from_int_lossy(velocity);
        if velocity.as_int() == 0 {
            return None;
        }
        Some(Command::NoteOn {
            channel: u4::from_int_lossy(channel),
            note: u7::from_int_lossy(note),
            velocity,
        })
    }

    /// Creates a note on command with a duration in duration units. Zero
    /// velocity and zero duration both produce no command.
    pub fn note_on_with_duration(
        channel: u8,
        note: u8,
        velocity: u8,
        duration: u32,
    ) -> Option<Command> {
        let velocity = u7::from_int_lossy(velocity);
        if velocity.as_int() == 0 || duration == 0 {
            return None;
        }
        Some(Command::NoteOnWithDuration {
            channel: u4::from_int_lossy(channel),
            note: u7::from_int_lossy(note),
            velocity,
            duration,
        })
    }

    /// Creates a note off command.
    pub fn note_off(channel: u8, note: u8) -> Command {
        Command::NoteOff {
            channel: u4::from_int_lossy(channel),
            note: u7::from_int_lossy(note),
        }
    }

    /// Creates a control change command. The controller number is clamped to
    /// the regular control change range.
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Command {
        Command::ControlChange {
            channel: u4::from_int_lossy(channel),
            controller: u7::from_int_lossy(controller.min(MAX_CONTROLLER)),
            value: u7::from_int_lossy(value),
        }
    }

    /// Creates a pitch bend command from a float in [-1, 1], where -1 and 1
    /// are the minimum and maximum bend and 0 is centered.
    pub fn pitch_bend(channel: u8, value: f32) -> Command {
        let value = value.clamp(-1.0, 1.0);
        // The wire value is 14 bits with the center at 8192.
        let bend = (8192 + (8191.0 * value).round() as i32) as u16;
        Command::PitchBend {
            channel: u4::from_int_lossy(channel),
            lsb: u7::from_int_lossy((bend & 0x7F) as u8),
            msb: u7::from_int_lossy(((bend >> 7) & 0x7F) as u8),
        }
    }

    /// Creates a reset notes command.
    pub fn reset_notes(channel: u8) -> Command {
        Command::ResetNotes {
            channel: u4::from_int_lossy(channel),
        }
    }

    /// The channel this command applies to.
    pub fn channel(&self) -> u4 {
        match self {
            Command::NoteOn { channel, .. }
            | Command::NoteOnWithDuration { channel, .. }
            | Command::NoteOff { channel, .. }
            | Command::ControlChange { channel, .. }
            | Command::PitchBend { channel, .. }
            | Command::ResetNotes { channel } => *channel,
        }
    }

    /// Converts the command to a MIDI live event. Reset notes has no single
    /// event representation: it is expanded against the note grid at send
    /// time, so it returns none here.
    pub fn to_midi_event(&self) -> Option<LiveEvent<'static>> {
        match *self {
            Command::NoteOn {
                channel,
                note,
                velocity,
            }
            | Command::NoteOnWithDuration {
                channel,
                note,
                velocity,
                ..
            } => Some(LiveEvent::Midi {
                channel,
                message: midly::MidiMessage::NoteOn {
                    key: note,
                    vel: velocity,
                },
            }),
            Command::NoteOff { channel, note } => Some(note_off_event(channel, note)),
            Command::ControlChange {
                channel,
                controller,
                value,
            } => Some(LiveEvent::Midi {
                channel,
                message: midly::MidiMessage::Controller { controller, value },
            }),
            Command::PitchBend { channel, lsb, msb } => Some(LiveEvent::Midi {
                channel,
                message: midly::MidiMessage::PitchBend {
                    bend: midly::PitchBend(u14::from_int_lossy(
                        (u16::from(msb.as_int()) << 7) | u16::from(lsb.as_int()),
                    )),
                },
            }),
            Command::ResetNotes { .. } => None,
        }
    }
}

/// Builds a note off live event. Also used when expanding reset notes and
/// when a scheduled note off fires.
pub(crate) fn note_off_event(channel: u4, note: u7) -> LiveEvent<'static> {
    LiveEvent::Midi {
        channel,
        message: midly::MidiMessage::NoteOff {
            key: note,
            vel: u7::from(0),
        },
    }
}
