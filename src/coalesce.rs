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
use crate::command::Command;
use crate::state::{NoteGrid, NUM_NOTES};

/// The result of coalescing one drained batch: commands to send now, in
/// batch order, and note ons deferred to a slightly later send because their
/// note is already playing.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CoalescedBatch {
    pub immediate: Vec<Command>,
    pub deferred: Vec<Command>,
}

/// One bit per channel, keyed by note or controller number. Marks keys
/// already claimed by a later command of the same kind during the backward
/// pass.
struct ChannelClaims {
    bits: [u16; NUM_NOTES],
}

impl ChannelClaims {
    fn new() -> ChannelClaims {
        ChannelClaims {
            bits: [0; NUM_NOTES],
        }
    }

    fn claimed(&self, key: u8, channel_bit: u16) -> bool {
        self.bits[key as usize] & channel_bit != 0
    }

    fn claim(&mut self, key: u8, channel_bit: u16) {
        self.bits[key as usize] |= channel_bit;
    }
}

/// Reduces a batch to the minimal command set that reaches the same device
/// state, then splits out retriggered note ons.
///
/// The backward pass walks right to left and drops commands that a later
/// command supersedes: a note on is dropped if a later note off, note on, or
/// reset claims its key ("later in the batch wins"); continuous state (CC,
/// pitch bend) keeps only the last write per key. The forward pass replaces
/// each surviving note on whose note is already sounding with a note off and
/// moves the original into the deferred list, so the off and the retriggering
/// on are never delivered at the same timestamp. An off whose only purpose
/// was cancelling an on earlier in the same batch is elided when the note
/// isn't sounding, since it could not change device state.
///
/// The batch is never mutated; survivors are tracked in a parallel marker
/// array. Reads the grid's playing flags but sends nothing.
pub fn coalesce(batch: &[Command], notes: &NoteGrid) -> CoalescedBatch {
    let mut keep = vec![true; batch.len()];

    let mut note_ons = ChannelClaims::new();
    let mut note_offs = ChannelClaims::new();
    let mut cancelled_ons = ChannelClaims::new();
    let mut controllers = ChannelClaims::new();
    let mut pitch_bends: u16 = 0;
    let mut notes_reset: u16 = 0;

    for (i, command) in batch.iter().enumerate().rev() {
        let channel_bit = 1u16 << command.channel().as_int();
        match *command {
            Command::NoteOn { note, .. } | Command::NoteOnWithDuration { note, .. } => {
                let note = note.as_int();
                if note_offs.claimed(note, channel_bit) {
                    // A later off cancels this on. Remember the key so the
                    // off itself can be elided when the note isn't sounding.
                    keep[i] = false;
                    cancelled_ons.claim(note, channel_bit);
                } else if note_ons.claimed(note, channel_bit) || notes_reset & channel_bit != 0 {
                    keep[i] = false;
                } else {
                    note_ons.claim(note, channel_bit);
                }
            }
            Command::NoteOff { note, .. } => {
                // Never dropped; claims the key so earlier ons cancel.
                note_offs.claim(note.as_int(), channel_bit);
            }
            Command::ControlChange { controller, .. } => {
                let controller = controller.as_int();
                if controllers.claimed(controller, channel_bit) {
                    keep[i] = false;
                } else {
                    controllers.claim(controller, channel_bit);
                }
            }
            Command::PitchBend { .. } => {
                if pitch_bends & channel_bit != 0 {
                    keep[i] = false;
                } else {
                    pitch_bends |= channel_bit;
                }
            }
            Command::ResetNotes { .. } => {
                // Idempotent, always survives.
                notes_reset |= channel_bit;
            }
        }
    }

    let mut coalesced = CoalescedBatch {
        immediate: Vec::with_capacity(batch.len()),
        deferred: Vec::new(),
    };

    for (i, command) in batch.iter().enumerate() {
        if !keep[i] {
            continue;
        }
        match *command {
            Command::NoteOn { channel, note, .. }
            | Command::NoteOnWithDuration { channel, note, .. }
                if notes.is_playing(channel, note) =>
            {
                // Retrigger split: turn the sounding note off now, replay the
                // on in the deferred batch.
                coalesced.deferred.push(*command);
                coalesced.immediate.push(Command::NoteOff { channel, note });
            }
            Command::NoteOff { channel, note }
                if cancelled_ons.claimed(note.as_int(), 1u16 << channel.as_int())
                    && !notes.is_playing(channel, note) =>
            {
                // The on this off cancelled never reached the device and the
                // note isn't sounding, so the off would be a no-op.
            }
            _ => coalesced.immediate.push(*command),
        }
    }

    coalesced
}
