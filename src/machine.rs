// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Running interpreters concurrently, each on its own thread
//!
//! Machines never share memory. They coordinate purely through the channels they're wired to:
//! an `IN` instruction blocks until a value arrives, and an `OUT` instruction blocks until the
//! output channel accepts the value.
//!
//! # Example
//!
//! ```
//! use intcode::prelude::*;
//! use intcode::machine::{Event, Machine};
//!
//! // read a value, output double it, halt
//! let machine = Machine::launch(Interpreter::new([3, 0, 102, 2, 0, 0, 4, 0, 99])).unwrap();
//! assert_eq!(machine.next_event(), Some(Event::AwaitingInput));
//! machine.send(21).unwrap();
//! assert_eq!(machine.next_event(), Some(Event::Output(42)));
//! assert_eq!(machine.next_event(), Some(Event::Halted));
//! assert!(machine.join().unwrap().is_halted());
//! ```

use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, unbounded};

use crate::ports::{ChannelInput, OutputSink};
use crate::{Interpreter, InterpreterError, State};

/// What a machine thread hands back once it stops: the interpreter, for inspecting its memory,
/// or the error that stopped it
pub type MachineResult = Result<Interpreter, InterpreterError>;

/// Run `interpreter` on a new thread named after `id`, reading from `inputs` and writing to
/// `outputs`.
///
/// The thread finishes when the program halts or fails. Running out of input counts as a
/// failure ([`InterpreterError::InputDisconnected`]), since with blocking inputs it can only
/// mean every producer is gone.
pub fn spawn_with<I, O>(
    id: usize,
    mut interpreter: Interpreter,
    mut inputs: I,
    mut outputs: O,
) -> io::Result<JoinHandle<MachineResult>>
where
    I: Iterator<Item = i64> + Send + 'static,
    O: OutputSink + Send + 'static,
{
    thread::Builder::new()
        .name(format!("intcode-{id}"))
        .spawn(move || {
            tracing::debug!(id, "machine started");
            let result = match interpreter.run_with(&mut inputs, &mut outputs) {
                Ok(State::Halted) => Ok(interpreter),
                Ok(State::Awaiting) => Err(InterpreterError::InputDisconnected),
                Err(e) => Err(e),
            };
            match &result {
                Ok(_) => tracing::debug!(id, "machine halted"),
                Err(e) if e.is_disconnect() => tracing::debug!(id, "machine disconnected: {e}"),
                Err(e) => tracing::warn!(id, "machine failed: {e}"),
            }
            result
        })
}

/// Run `interpreter` on a new thread, wired to a pair of channel endpoints
pub fn spawn(
    id: usize,
    interpreter: Interpreter,
    inputs: Receiver<i64>,
    outputs: Sender<i64>,
) -> io::Result<JoinHandle<MachineResult>> {
    spawn_with(id, interpreter, ChannelInput::new(inputs), outputs)
}

/// Something a [Machine] reports to its controller
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Event {
    /// The machine wants input, and none is queued
    AwaitingInput,
    /// The machine executed an `OUT` instruction
    Output(i64),
    /// The machine executed a `HALT` instruction
    Halted,
}

/// Input that announces [`Event::AwaitingInput`] before blocking on an empty queue
struct AnnouncingInput {
    inputs: Receiver<i64>,
    events: Sender<Event>,
}

impl Iterator for AnnouncingInput {
    type Item = i64;
    fn next(&mut self) -> Option<i64> {
        match self.inputs.try_recv() {
            Ok(value) => return Some(value),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => (),
        }
        self.events.send(Event::AwaitingInput).ok()?;
        self.inputs.recv().ok()
    }
}

struct EventSink(Sender<Event>);

impl OutputSink for EventSink {
    fn emit(&mut self, value: i64) -> Result<(), InterpreterError> {
        self.0
            .send(Event::Output(value))
            .map_err(|_| InterpreterError::OutputDisconnected)
    }
}

/// A machine running on its own thread, driven interactively by its controller.
///
/// The controller feeds it input with [`Machine::send`] and observes what it does with
/// [`Machine::next_event`]. Events are handed over without buffering, so the machine runs in
/// lockstep with whoever is reading them.
#[derive(Debug)]
pub struct Machine {
    inputs: Sender<i64>,
    events: Receiver<Event>,
    handle: JoinHandle<MachineResult>,
}

impl Machine {
    /// Start running `interpreter` on a new thread
    pub fn launch(interpreter: Interpreter) -> io::Result<Self> {
        Self::launch_with(interpreter, [])
    }

    /// Start running `interpreter` on a new thread, with `initial` already queued as input
    pub fn launch_with(
        interpreter: Interpreter,
        initial: impl IntoIterator<Item = i64>,
    ) -> io::Result<Self> {
        let (input_tx, input_rx) = unbounded();
        for value in initial {
            // the receiver is still held here, so this can't fail
            let _ = input_tx.send(value);
        }
        let (event_tx, event_rx) = bounded(0);
        let halt_tx = event_tx.clone();
        let inputs = AnnouncingInput {
            inputs: input_rx,
            events: event_tx.clone(),
        };
        let handle = thread::Builder::new()
            .name("intcode-interactive".into())
            .spawn(move || {
                let mut interpreter = interpreter;
                let mut inputs = inputs;
                let result = match interpreter.run_with(&mut inputs, &mut EventSink(event_tx)) {
                    Ok(State::Halted) => {
                        // the controller may have stopped listening, which is fine
                        let _ = halt_tx.send(Event::Halted);
                        Ok(interpreter)
                    }
                    Ok(State::Awaiting) => Err(InterpreterError::InputDisconnected),
                    Err(e) => Err(e),
                };
                if let Err(e) = &result {
                    tracing::debug!("interactive machine stopped: {e}");
                }
                result
            })?;
        Ok(Self {
            inputs: input_tx,
            events: event_rx,
            handle,
        })
    }

    /// Queue a value for the machine's next `IN` instruction.
    ///
    /// Fails only if the machine has already stopped.
    pub fn send(&self, value: i64) -> Result<(), InterpreterError> {
        self.inputs
            .send(value)
            .map_err(|_| InterpreterError::InputDisconnected)
    }

    /// Block until the machine does something observable. Returns [`None`] once the machine's
    /// thread has finished and every event has been received.
    pub fn next_event(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    /// Receive the next output, answering every request for input with `idle_input`.
    ///
    /// Returns [`None`] if the machine halts or stops first.
    pub fn next_output(&self, idle_input: i64) -> Option<i64> {
        loop {
            match self.next_event()? {
                Event::Output(value) => break Some(value),
                Event::AwaitingInput => self.send(idle_input).ok()?,
                Event::Halted => break None,
            }
        }
    }

    /// Receive the next `N` outputs as a group, such as an `(x, y, tile)` display update,
    /// answering requests for input like [`Machine::next_output`].
    ///
    /// Returns [`None`] if the machine halts or stops before the group is complete.
    pub fn next_outputs<const N: usize>(&self, idle_input: i64) -> Option<[i64; N]> {
        let mut group = [0; N];
        for slot in &mut group {
            *slot = self.next_output(idle_input)?;
        }
        Some(group)
    }

    /// Stop feeding the machine and wait for its thread to finish.
    ///
    /// A machine still waiting for input is stopped with
    /// [`InterpreterError::InputDisconnected`]. Events that were never received are discarded.
    pub fn join(self) -> MachineResult {
        let Self {
            inputs,
            events,
            handle,
        } = self;
        drop(inputs);
        drop(events);
        match handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
