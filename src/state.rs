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
use midly::num::{u4, u7};

pub const NUM_CHANNELS: usize = 16;
pub const NUM_NOTES: usize = 128;

/// Per-note playing state and generation counters for all 16 channels.
///
/// The generation counter is bumped on every note on send and snapshotted
/// into scheduled note off tasks; a task whose snapshot no longer matches
/// has been superseded by a retrigger and must not fire. The counter is a
/// u8 and wraps: a stale note off is misidentified as current only if the
/// same note is retriggered an exact multiple of 256 times while its
/// duration is still pending.
///
/// The grid is shared between the caller context and timer callbacks, and
/// is always accessed under a single mutex.
pub struct NoteGrid {
    playing: [[bool; NUM_NOTES]; NUM_CHANNELS],
    generation: [[u8; NUM_NOTES]; NUM_CHANNELS],
}

impl NoteGrid {
    /// Creates a grid with no notes playing.
    pub fn new() -> NoteGrid {
        NoteGrid {
            playing: [[false; NUM_NOTES]; NUM_CHANNELS],
            generation: [[0; NUM_NOTES]; NUM_CHANNELS],
        }
    }

    /// Returns true if the note is currently playing on the channel.
    pub fn is_playing(&self, channel: u4, note: u7) -> bool {
        self.playing[channel.as_int() as usize][note.as_int() as usize]
    }

    /// Marks the note as playing or not playing.
    pub fn set_playing(&mut self, channel: u4, note: u7, playing: bool) {
        self.playing[channel.as_int() as usize][note.as_int() as usize] = playing;
    }

    /// The current generation of the note.
    pub fn generation(&self, channel: u4, note: u7) -> u8 {
        self.generation[channel.as_int() as usize][note.as_int() as usize]
    }

    /// Increments the note's generation, wrapping, and returns the new value.
    pub fn bump_generation(&mut self, channel: u4, note: u7) -> u8 {
        let slot = &mut self.generation[channel.as_int() as usize][note.as_int() as usize];
        *slot = slot.wrapping_add(1);
        *slot
    }

    /// The notes currently playing on the channel.
    pub fn playing_notes(&self, channel: u4) -> Vec<u7> {
        self.playing[channel.as_int() as usize]
            .iter()
            .enumerate()
            .filter(|(_, playing)| **playing)
            .map(|(note, _)| u7::from_int_lossy(note as u8))
            .collect()
    }

    /// Clears the playing flags for a single channel.
    pub fn clear_channel(&mut self, channel: u4) {
        self.playing[channel.as_int() as usize] = [false; NUM_NOTES];
    }

    /// Clears all playing flags. Generation counters persist so that note
    /// off tasks scheduled before the reset stay cancellable.
    pub fn reset(&mut self) {
        self.playing = [[false; NUM_NOTES]; NUM_CHANNELS];
    }
}

impl Default for NoteGrid {
    fn default() -> NoteGrid {
        NoteGrid::new()
    }
}

#[cfg(test)]
mod test {
    use midly::num::{u4, u7};

    use super::NoteGrid;

    #[test]
    fn playing_flags_are_per_channel_and_note() {
        let mut grid = NoteGrid::new();
        let (ch0, ch1) = (u4::from(0), u4::from(1));
        let note = u7::from(60);

        assert!(!grid.is_playing(ch0, note));
        grid.set_playing(ch0, note, true);
        assert!(grid.is_playing(ch0, note));
        assert!(!grid.is_playing(ch1, note));

        grid.set_playing(ch0, note, false);
        assert!(!grid.is_playing(ch0, note));
    }

    #[test]
    fn generation_wraps() {
        let mut grid = NoteGrid::new();
        let (channel, note) = (u4::from(0), u7::from(10));
        for _ in 0..255 {
            grid.bump_generation(channel, note);
        }
        assert_eq!(255, grid.generation(channel, note));
        assert_eq!(0, grid.bump_generation(channel, note));
    }

    #[test]
    fn reset_clears_playing_but_not_generations() {
        let mut grid = NoteGrid::new();
        let (channel, note) = (u4::from(2), u7::from(64));
        grid.set_playing(channel, note, true);
        grid.bump_generation(channel, note);

        grid.reset();
        assert!(!grid.is_playing(channel, note));
        assert_eq!(1, grid.generation(channel, note));
    }

    #[test]
    fn playing_notes_lists_only_playing() {
        let mut grid = NoteGrid::new();
        let channel = u4::from(3);
        grid.set_playing(channel, u7::from(60), true);
        grid.set_playing(channel, u7::from(64), true);
        grid.set_playing(u4::from(4), u7::from(67), true);

        assert_eq!(
            vec![u7::from(60), u7::from(64)],
            grid.playing_notes(channel)
        );
        grid.clear_channel(channel);
        assert!(grid.playing_notes(channel).is_empty());
    }
}
