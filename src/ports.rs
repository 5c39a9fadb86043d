// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Endpoints an [Interpreter](crate::Interpreter) reads input from and writes output to
//!
//! Input is any [`Iterator<Item = i64>`]; an `IN` instruction pulls one value from it, and an
//! exhausted iterator stops the interpreter in the [Awaiting](crate::State::Awaiting) state.
//! Output goes into an [OutputSink].

use crossbeam_channel::{Receiver, Sender};

use crate::InterpreterError;

/// Somewhere for an interpreter's `OUT` instructions to send values
pub trait OutputSink {
    /// Accept one output value, blocking if the sink can't take it yet
    fn emit(&mut self, value: i64) -> Result<(), InterpreterError>;
}

impl OutputSink for Vec<i64> {
    fn emit(&mut self, value: i64) -> Result<(), InterpreterError> {
        self.push(value);
        Ok(())
    }
}

impl OutputSink for Sender<i64> {
    fn emit(&mut self, value: i64) -> Result<(), InterpreterError> {
        self.send(value)
            .map_err(|_| InterpreterError::OutputDisconnected)
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn emit(&mut self, value: i64) -> Result<(), InterpreterError> {
        (**self).emit(value)
    }
}

/// Blocking input from a channel, which ends once every sender is gone and the channel is drained
#[derive(Debug, Clone)]
pub struct ChannelInput {
    receiver: Receiver<i64>,
}

impl ChannelInput {
    /// Read input from `receiver`
    pub fn new(receiver: Receiver<i64>) -> Self {
        Self { receiver }
    }
}

impl Iterator for ChannelInput {
    type Item = i64;
    fn next(&mut self) -> Option<i64> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn channel_sink_and_input() {
        let (in_tx, in_rx) = unbounded();
        let (mut out_tx, out_rx) = unbounded();
        in_tx.send(41).unwrap();
        drop(in_tx);

        // IN 0, ADD 0 #1 0, OUT 0, HALT
        let mut interp = Interpreter::new([3, 0, 101, 1, 0, 0, 4, 0, 99]);
        let state = interp
            .run_with(&mut ChannelInput::new(in_rx), &mut out_tx)
            .unwrap();
        assert_eq!(state, State::Halted);
        assert_eq!(out_rx.try_recv(), Ok(42));
    }

    #[test]
    fn closed_input_channel_awaits() {
        let (in_tx, in_rx) = unbounded::<i64>();
        drop(in_tx);
        let mut interp = Interpreter::new([3, 0, 99]);
        let state = interp
            .run_with(&mut ChannelInput::new(in_rx), &mut Vec::new())
            .unwrap();
        assert_eq!(state, State::Awaiting);
    }

    #[test]
    fn closed_output_channel_is_reported() {
        let (mut out_tx, out_rx) = unbounded();
        drop(out_rx);
        let mut interp = Interpreter::new([104, 1, 99]);
        assert_eq!(
            interp.run_with(&mut empty(), &mut out_tx),
            Err(InterpreterError::OutputDisconnected)
        );
        // nothing was executed, so the instruction can be retried
        assert!(!interp.is_poisoned());
        assert_eq!(interp.instr_ptr(), 0);
    }
}
