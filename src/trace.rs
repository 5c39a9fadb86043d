// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Opt-in recording of every instruction an [Interpreter] executes
//!
//! Tracing is started with [`Interpreter::start_trace`], and the recorded [Trace] is retrieved with
//! [`Interpreter::end_trace`].
use std::fmt::{self, Display};

use super::{Interpreter, OpCode, ParamMode};

/// One parameter of a traced instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracedParam {
    /// The int as it appeared in the instruction
    pub raw: i64,
    /// What it resolved to. For a destination parameter, this is the value stored there.
    pub resolved: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Information about a single executed instruction, which can be queried with its various
/// methods, or converted into a [String] using its [Display] impl.
pub struct TracedInstr {
    op_int: i64,
    instr_ptr: i64,
    rel_base: i64,
    opcode: OpCode,
    modes: [ParamMode; 3],
    params: Vec<TracedParam>,
}

impl TracedInstr {
    /// Return the relative base at the time the traced instruction was executed
    pub fn rel_base(&self) -> i64 {
        self.rel_base
    }

    /// Return the instruction pointer's position when the traced instruction was executed
    pub fn instr_ptr(&self) -> i64 {
        self.instr_ptr
    }

    /// Return the actual integer of the traced instruction
    pub fn op_int(&self) -> i64 {
        self.op_int
    }

    /// Return the opcode of the traced instruction
    pub fn op_code(&self) -> OpCode {
        self.opcode
    }

    /// Return the parameters of the traced instruction, in order
    pub fn params(&self) -> &[TracedParam] {
        &self.params
    }

    /// If the instruction stored a value in memory, return that value
    pub fn stored_val(&self) -> Option<i64> {
        match self.opcode {
            OpCode::Add | OpCode::Mul | OpCode::Lt | OpCode::Eq | OpCode::In => {
                self.params.last().map(|p| p.resolved)
            }
            OpCode::Out | OpCode::Jnz | OpCode::Jz | OpCode::Rbo | OpCode::Halt => None,
        }
    }

    /// Return an array of the parameter modes of the traced instruction
    pub fn param_modes(&self) -> [ParamMode; 3] {
        self.modes
    }

    /// Whether the traced instruction moved the instruction pointer somewhere other than the
    /// following instruction
    pub fn jumped(&self) -> bool {
        match (self.opcode, self.params.first()) {
            (OpCode::Jnz, Some(p)) => p.resolved != 0,
            (OpCode::Jz, Some(p)) => p.resolved == 0,
            _ => false,
        }
    }
}

impl Interpreter {
    /// Begin a [Trace] of executed instructions. If a trace is already running, this replaces that
    /// trace and returns in a [`Some`], otherwise, it returns [`None`].
    ///
    /// # Example
    /// ```
    /// # use intcode::prelude::*;
    /// let mut interp = Interpreter::new([1101, 90, 9, 4, 0]);
    /// interp.start_trace();
    /// interp.run_through_inputs(empty()).unwrap();
    /// let trace = interp.end_trace().unwrap();
    /// assert_eq!(trace.0.len(), 2);
    /// assert_eq!(trace.0[0].stored_val(), Some(99));
    /// ```
    pub fn start_trace(&mut self) -> Option<Trace> {
        self.trace.replace(Trace::default())
    }

    /// Stop tracing executed instructions into a [Trace]. If no trace was active, returns [`None`]
    ///
    /// see [Interpreter::start_trace]
    pub fn end_trace(&mut self) -> Option<Trace> {
        self.trace.take()
    }

    /// Get a view of the current trace
    pub fn show_trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// A log of instructions that an [Interpreter] has executed since a call to
/// [Interpreter::start_trace]
pub struct Trace(pub Vec<TracedInstr>);

impl Trace {
    pub(crate) fn push(
        &mut self,
        op_int: i64,
        instr_ptr: i64,
        rel_base: i64,
        resolved_params: &[(i64, i64)],
    ) {
        let Ok((opcode, modes)) = Interpreter::parse_op(instr_ptr, op_int) else {
            // only successfully decoded instructions are ever executed
            return;
        };
        self.0.push(TracedInstr {
            op_int,
            instr_ptr,
            rel_base,
            opcode,
            modes,
            params: resolved_params
                .iter()
                .map(|&(raw, resolved)| TracedParam { raw, resolved })
                .collect(),
        });
    }
}

impl Display for TracedInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ip {:>6} | rbo {:>6} | {:05} {}",
            self.instr_ptr, self.rel_base, self.op_int, self.opcode
        )?;
        for (i, (param, mode)) in self.params.iter().zip(self.modes).enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{mode}{} => {}", param.raw, param.resolved)?;
        }
        match self.opcode {
            OpCode::Jnz | OpCode::Jz if self.jumped() => f.write_str(" (jumped)"),
            OpCode::Rbo => match self.params.first() {
                Some(p) => write!(f, " (base now {})", self.rel_base + p.resolved),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

impl Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.0 {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}
