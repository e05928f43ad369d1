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
//! A coalescing MIDI event emitter for live scripted performances.
//!
//! Callers queue high-level musical commands and flush them in batches. A
//! flush deduplicates the batch, defers note ons that would race with their
//! own note offs, and schedules timed note offs for duration-bearing notes,
//! then sends the result to a MIDI output device.

pub mod coalesce;
pub mod command;
pub mod config;
pub mod emitter;
pub mod midi;
pub mod notes;
pub mod queue;
pub mod state;
pub mod timer;
