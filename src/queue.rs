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
use std::mem;

use crate::command::Command;

/// Initial queue capacity. The queue grows geometrically past this.
const INITIAL_CAPACITY: usize = 64;

/// An append-only buffer of commands accumulated between flushes. Insertion
/// order is the caller's causal order and is preserved through the flush.
/// Only the caller context appends and drains, so no locking is needed here.
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    /// Creates an empty queue.
    pub fn new() -> CommandQueue {
        CommandQueue {
            commands: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Appends a command to the end of the queue.
    pub fn append(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Takes ownership of the current batch and leaves the queue empty.
    /// Commands appended afterwards belong to the next batch.
    pub fn drain_for_flush(&mut self) -> Vec<Command> {
        mem::replace(&mut self.commands, Vec::with_capacity(INITIAL_CAPACITY))
    }

    /// Discards all pending commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if no commands are pending.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> CommandQueue {
        CommandQueue::new()
    }
}
