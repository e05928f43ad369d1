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
use std::time::Duration;

use tokio::runtime::Handle;

/// A one-shot deferred execution facility. Tasks are fire-and-forget: there
/// is no cancellation API and each task runs exactly once. The task may run
/// on any thread.
pub trait Timer: Send + Sync {
    /// Runs the task once after the delay.
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>);
}

/// A timer that runs tasks on the tokio runtime.
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    /// Creates a timer bound to the current tokio runtime. Must be called
    /// from within a runtime context.
    pub fn new() -> TokioTimer {
        TokioTimer {
            handle: Handle::current(),
        }
    }
}

impl Timer for TokioTimer {
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
