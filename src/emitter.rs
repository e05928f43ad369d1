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
use std::{error::Error, sync::Arc, time::Duration};

use midly::num::{u4, u7};
use parking_lot::Mutex;
use tracing::{debug, error, span, Level, Span};

use crate::{
    coalesce::coalesce,
    command::{note_off_event, Command},
    midi,
    queue::CommandQueue,
    state::NoteGrid,
    timer::Timer,
};

/// How long "1" is for duration arguments. Roughly 1/60 sec by default.
pub const DEFAULT_DURATION_UNIT: Duration = Duration::from_millis(16);

/// How long to wait between sending a note off and a note on for the same
/// note. Zero by default; can be raised if a device shows timestamp issues.
pub const DEFAULT_LATE_NOTE_OFFSET: Duration = Duration::ZERO;

/// Sends commands to the device and maintains the note grid. Cloned into
/// timer tasks so deferred batches and scheduled note offs share the same
/// device and state as the caller context.
#[derive(Clone)]
struct Dispatcher {
    device: Arc<dyn midi::Device>,
    timer: Arc<dyn Timer>,
    notes: Arc<Mutex<NoteGrid>>,
    duration_unit: Duration,
}

impl Dispatcher {
    /// Applies a single command to the device and the note grid. The caller
    /// holds the grid lock; scheduled tasks created here take it themselves
    /// when they later fire. `offset_units` reduces the note off countdown
    /// for commands sent from a deferred batch.
    fn send(
        &self,
        command: &Command,
        notes: &mut NoteGrid,
        offset_units: f64,
    ) -> Result<(), Box<dyn Error>> {
        match *command {
            Command::NoteOn { channel, note, .. } => {
                notes.bump_generation(channel, note);
                self.emit(command)?;
                notes.set_playing(channel, note, true);
            }
            Command::NoteOnWithDuration {
                channel,
                note,
                duration,
                ..
            } => {
                let generation = notes.bump_generation(channel, note);
                self.emit(command)?;
                notes.set_playing(channel, note, true);
                self.schedule_note_off(channel, note, generation, duration, offset_units);
            }
            Command::NoteOff { channel, note } => {
                self.emit(command)?;
                notes.set_playing(channel, note, false);
            }
            Command::ControlChange { .. } | Command::PitchBend { .. } => self.emit(command)?,
            Command::ResetNotes { channel } => {
                // Only turn off notes currently playing, to avoid message
                // congestion. Zero playing notes means zero messages.
                for note in notes.playing_notes(channel) {
                    self.device.emit(note_off_event(channel, note))?;
                }
                notes.clear_channel(channel);
            }
        }

        Ok(())
    }

    fn emit(&self, command: &Command) -> Result<(), Box<dyn Error>> {
        match command.to_midi_event() {
            Some(event) => self.device.emit(event),
            None => Ok(()),
        }
    }

    /// Schedules the note off for a duration-bearing note on. The task
    /// captures the generation at send time; if the note has been
    /// retriggered by the time it fires, the newer trigger owns the note and
    /// the task does nothing. That mismatch is the designed cancellation
    /// path, not a failure.
    fn schedule_note_off(
        &self,
        channel: u4,
        note: u7,
        generation: u8,
        duration: u32,
        offset_units: f64,
    ) {
        let delay = self
            .duration_unit
            .mul_f64((f64::from(duration) - offset_units).max(0.0));

        let dispatcher = self.clone();
        self.timer.schedule_once(
            delay,
            Box::new(move || {
                let mut notes = dispatcher.notes.lock();
                if notes.generation(channel, note) != generation {
                    return;
                }

                match dispatcher.device.emit(note_off_event(channel, note)) {
                    Ok(()) => notes.set_playing(channel, note, false),
                    Err(e) => error!(
                        err = format!("{:?}", e),
                        "Error sending scheduled note off."
                    ),
                }
            }),
        );
    }
}

/// Accumulates musical commands from a scripted caller and flushes them to a
/// MIDI output device as a minimal, race-free message stream.
///
/// Appends and flushes happen on the caller's thread; scheduled note offs
/// and deferred retrigger batches run on the timer and synchronize with the
/// caller through the shared note grid.
pub struct Emitter {
    dispatcher: Dispatcher,
    queue: CommandQueue,
    late_note_offset: Duration,
    span: Span,
}

impl Emitter {
    /// Creates an emitter with default timing for the given device and timer.
    pub fn new(device: Arc<dyn midi::Device>, timer: Arc<dyn Timer>) -> Emitter {
        Emitter {
            dispatcher: Dispatcher {
                device,
                timer,
                notes: Arc::new(Mutex::new(NoteGrid::new())),
                duration_unit: DEFAULT_DURATION_UNIT,
            },
            queue: CommandQueue::new(),
            late_note_offset: DEFAULT_LATE_NOTE_OFFSET,
            span: span!(Level::INFO, "emitter"),
        }
    }

    /// Reconfigures the timing. `duration_unit` is how long one duration
    /// tick lasts; `late_note_offset`, when given, is how long retriggered
    /// notes are deferred after a flush. Process-wide, no per-call override.
    pub fn set_timing(&mut self, duration_unit: Duration, late_note_offset: Option<Duration>) {
        self.dispatcher.duration_unit = duration_unit;
        if let Some(late_note_offset) = late_note_offset {
            self.late_note_offset = late_note_offset;
        }
    }

    /// Adds a command to the pending batch. Nothing is sent until `flush`.
    pub fn append(&mut self, command: Command) {
        self.queue.append(command);
    }

    /// Number of commands waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains the pending batch, coalesces it, and sends the result: the
    /// immediate list now and the deferred retrigger list after the late
    /// note offset. Transport errors on the immediate sends propagate;
    /// deferred sends log errors instead, since no caller is waiting.
    pub fn flush(&mut self) -> Result<(), Box<dyn Error>> {
        let _enter = self.span.enter();

        let batch = self.queue.drain_for_flush();
        if batch.is_empty() {
            return Ok(());
        }

        let mut notes = self.dispatcher.notes.lock();
        let coalesced = coalesce(&batch, &notes);
        debug!(
            batched = batch.len(),
            immediate = coalesced.immediate.len(),
            deferred = coalesced.deferred.len(),
            "Flushing command batch."
        );

        for command in &coalesced.immediate {
            self.dispatcher.send(command, &mut notes, 0.0)?;
        }
        drop(notes);

        if coalesced.deferred.is_empty() {
            return Ok(());
        }

        // Deferred commands restart their duration countdowns when they are
        // actually sent, so the offset already waited is subtracted then.
        let offset_units = if self.dispatcher.duration_unit.is_zero() {
            0.0
        } else {
            self.late_note_offset.as_secs_f64() / self.dispatcher.duration_unit.as_secs_f64()
        };

        let dispatcher = self.dispatcher.clone();
        let deferred = coalesced.deferred;
        self.dispatcher.timer.schedule_once(
            self.late_note_offset,
            Box::new(move || {
                let mut notes = dispatcher.notes.lock();
                for command in &deferred {
                    if let Err(e) = dispatcher.send(command, &mut notes, offset_units) {
                        error!(
                            err = format!("{:?}", e),
                            "Error sending deferred command."
                        );
                    }
                }
            }),
        );

        Ok(())
    }

    /// Clears the pending batch and all playing flags, as at initialization.
    /// Generation counters persist so note offs scheduled before the reset
    /// remain cancellable.
    pub fn reset(&mut self) {
        let _enter = self.span.enter();
        debug!("Resetting emitter state.");

        self.queue.clear();
        self.dispatcher.notes.lock().reset();
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, sync::Arc, time::Duration};

    use midly::{live::LiveEvent, num::u4, num::u7};
    use tokio::time::sleep;

    use crate::{
        command::Command,
        midi,
        timer::{Timer, TokioTimer},
    };

    use super::Emitter;

    fn on_event(channel: u8, note: u8, velocity: u8) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: u4::from(channel),
            message: midly::MidiMessage::NoteOn {
                key: u7::from(note),
                vel: u7::from(velocity),
            },
        }
    }

    fn off_event(channel: u8, note: u8) -> LiveEvent<'static> {
        LiveEvent::Midi {
            channel: u4::from(channel),
            message: midly::MidiMessage::NoteOff {
                key: u7::from(note),
                vel: u7::from(0),
            },
        }
    }

    /// An emitter wired to a mock device, with a 10ms duration unit so
    /// duration tests stay fast.
    fn test_emitter(late_note_offset: Duration) -> (Emitter, midi::test::Device) {
        let device = midi::test::Device::get("mock emitter");
        let timer: Arc<dyn Timer> = Arc::new(TokioTimer::new());
        let mut emitter = Emitter::new(Arc::new(device.clone()), timer);
        emitter.set_timing(Duration::from_millis(10), Some(late_note_offset));
        (emitter, device)
    }

    #[tokio::test]
    async fn flush_sends_surviving_commands_in_order() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.append(Command::control_change(0, 7, 100));
        emitter.append(Command::note_on(0, 60, 90).unwrap());
        emitter.append(Command::pitch_bend(0, 0.0));
        emitter.flush()?;

        assert_eq!(
            vec![
                Command::control_change(0, 7, 100).to_midi_event().unwrap(),
                on_event(0, 60, 90),
                Command::pitch_bend(0, 0.0).to_midi_event().unwrap(),
            ],
            device.emitted_events()
        );

        Ok(())
    }

    #[tokio::test]
    async fn flushing_an_empty_queue_twice_sends_nothing() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.flush()?;
        emitter.flush()?;
        assert!(device.emitted_events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn cancelling_pair_sends_nothing() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.append(Command::note_on(0, 60, 100).unwrap());
        emitter.append(Command::note_off(0, 60));
        emitter.flush()?;

        assert!(device.emitted_events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn duration_note_gets_a_scheduled_off() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        // 2 duration units of 10ms each.
        emitter.append(Command::note_on_with_duration(1, 64, 90, 2).unwrap());
        emitter.flush()?;
        assert_eq!(vec![on_event(1, 64, 90)], device.emitted_events());

        sleep(Duration::from_millis(200)).await;
        assert_eq!(
            vec![on_event(1, 64, 90), off_event(1, 64)],
            device.emitted_events()
        );

        Ok(())
    }

    #[tokio::test]
    async fn retrigger_supersedes_the_scheduled_off() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.append(Command::note_on_with_duration(0, 60, 90, 5).unwrap());
        emitter.flush()?;

        // Retrigger before the 50ms duration elapses. The coalescer splits
        // this into an immediate off and a deferred on; the deferred on
        // bumps the generation, so the original scheduled off never fires.
        emitter.append(Command::note_on(0, 60, 100).unwrap());
        emitter.flush()?;

        sleep(Duration::from_millis(250)).await;
        assert_eq!(
            vec![on_event(0, 60, 90), off_event(0, 60), on_event(0, 60, 100)],
            device.emitted_events()
        );

        Ok(())
    }

    #[tokio::test]
    async fn late_note_offset_defers_the_retrigger() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::from_millis(100));

        emitter.append(Command::note_on(0, 60, 90).unwrap());
        emitter.flush()?;
        device.reset_emitted_events();

        emitter.append(Command::note_on(0, 60, 100).unwrap());
        emitter.flush()?;

        // Only the substituted off goes out at flush time.
        assert_eq!(vec![off_event(0, 60)], device.emitted_events());

        sleep(Duration::from_millis(300)).await;
        assert_eq!(
            vec![off_event(0, 60), on_event(0, 60, 100)],
            device.emitted_events()
        );

        Ok(())
    }

    #[tokio::test]
    async fn deferred_duration_note_reduces_its_countdown() -> Result<(), Box<dyn Error>> {
        // 20ms offset = 2 duration units of 10ms.
        let (mut emitter, device) = test_emitter(Duration::from_millis(20));

        emitter.append(Command::note_on(2, 10, 5).unwrap());
        emitter.flush()?;
        device.reset_emitted_events();

        // 4 units total; the deferred send counts down only the remaining 2.
        emitter.append(Command::note_on_with_duration(2, 10, 5, 4).unwrap());
        emitter.flush()?;

        sleep(Duration::from_millis(300)).await;
        assert_eq!(
            vec![off_event(2, 10), on_event(2, 10, 5), off_event(2, 10)],
            device.emitted_events()
        );

        Ok(())
    }

    #[tokio::test]
    async fn reset_notes_expands_to_playing_notes_only() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.append(Command::note_on(0, 60, 90).unwrap());
        emitter.append(Command::note_on(0, 64, 90).unwrap());
        emitter.append(Command::note_on(1, 67, 90).unwrap());
        emitter.flush()?;
        device.reset_emitted_events();

        emitter.append(Command::reset_notes(0));
        emitter.flush()?;

        assert_eq!(
            vec![off_event(0, 60), off_event(0, 64)],
            device.emitted_events()
        );

        // Channel 1 is untouched: a second reset there turns its note off.
        device.reset_emitted_events();
        emitter.append(Command::reset_notes(1));
        emitter.flush()?;
        assert_eq!(vec![off_event(1, 67)], device.emitted_events());

        Ok(())
    }

    #[tokio::test]
    async fn reset_notes_on_a_silent_channel_is_a_noop() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.append(Command::reset_notes(5));
        emitter.flush()?;
        assert!(device.emitted_events().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn reset_clears_pending_commands_and_playing_state() -> Result<(), Box<dyn Error>> {
        let (mut emitter, device) = test_emitter(Duration::ZERO);

        emitter.append(Command::note_on(0, 60, 90).unwrap());
        emitter.flush()?;
        emitter.append(Command::control_change(0, 7, 1));
        assert_eq!(1, emitter.pending());

        emitter.reset();
        assert_eq!(0, emitter.pending());
        device.reset_emitted_events();

        // The note is no longer considered playing, so a new on for it is
        // not retrigger-split.
        emitter.append(Command::note_on(0, 60, 90).unwrap());
        emitter.flush()?;
        assert_eq!(vec![on_event(0, 60, 90)], device.emitted_events());

        Ok(())
    }
}
