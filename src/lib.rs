// SPDX-FileCopyrightText: 2024 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD
#![warn(missing_docs)]

//! Library providing an Intcode virtual machine, plus the wiring to run several of them at once
//!
//! The interpreter is fully functional, with all of the [Opcodes] and [Parameter Modes] defined in
//! the completed Intcode computer for [Day 9].
//!
//! # Example
//!
//! ```rust
//! use intcode::prelude::*;
//! let mut interpreter = Interpreter::new(vec![104, 1024, 99]);
//!
//! assert_eq!(
//!     interpreter.run_through_inputs(std::iter::empty()).unwrap(),
//!     (vec![1024], State::Halted)
//! );
//! ```
//!
//! Machines can also be run on their own threads and wired together with channels. The
//! [pipeline] module chains machines output-to-input, and the [network] module routes addressed
//! packets between many of them:
//!
//! ```rust
//! use intcode::prelude::*;
//! use intcode::pipeline::{Pipeline, PipelineConfig, Topology};
//!
//! let program: Program = "3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,\
//!     27,4,27,1001,28,-1,28,1005,28,6,99,0,0,5".parse().unwrap();
//! let pipeline = Pipeline::new(program, PipelineConfig::default().topology(Topology::Ring));
//! assert_eq!(pipeline.run(&[9, 8, 7, 6, 5], 0).unwrap(), 139629729);
//! ```
//!
//! [Opcodes]: https://esolangs.org/wiki/Intcode#Opcodes
//! [Parameter Modes]: https://esolangs.org/wiki/Intcode#Parameter_Modes
//! [Day 9]: https://adventofcode.com/2019/day/9

/// A dense memory buffer which grows with zeroes whenever an address past its end is used.
mod mmu;

/// Decoding, operand resolution, and the shared logic behind groups of similar instructions
mod internals;

pub mod machine;
pub mod network;
pub mod pipeline;
pub mod ports;
pub mod program;
pub mod trace;

use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};
use std::ops::Index;

/// A small module that re-exports items needed when working with the Intcode interpreter
pub mod prelude {
    pub use crate::ports::OutputSink;
    pub use crate::program::Program;
    pub use crate::{Interpreter, InterpreterError, State};
    pub use std::iter::empty;
}

use mmu::IntcodeMem;
use ports::OutputSink;
use trace::Trace;

/// The state of the intcode system, returned whenever the intcode system has stopped.
///
/// [Awaiting](State::Awaiting) means that there are more instructions to execute, but all input
/// has been consumed and the next instruction requires input.
///
/// [Halted](State::Halted) means that a `HALT` instruction has been executed. Once it's been
/// returned, no more instructions will be executed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Execution is awaiting input
    Awaiting,
    /// Execution has halted
    Halted,
}

/// The result of executing a single instruction
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StepOutcome {
    /// The instruction completed and the next one can be executed
    Running,
    /// The interpreter stopped, either by halting or by running out of input
    Stopped(State),
}

/// An error occurred when executing an intcode instruction
///
/// Any error other than the disconnection variants poisons the interpreter: it will refuse to
/// execute anything else, and its memory is left as it was when the error occurred.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum InterpreterError {
    /// An invalid opcode was encountered
    UnrecognizedOpcode {
        /// instruction pointer of the offending instruction
        ip: i64,
        /// the full integer the opcode was decoded from
        instruction: i64,
        /// the two low decimal digits of `instruction`
        opcode: i64,
    },
    /// An unknown parameter mode was encountered
    UnknownMode(i64),
    /// A negative memory address was encountered
    NegativeMemAccess(i64),
    /// An instruction tried to write to an immediate destination
    WriteToImmediate(i64),
    /// A jump instruction tried to move the instruction pointer to a negative address
    JumpToNegative(i64),
    /// Adding an offset to the relative base overflowed, either while resolving a relative
    /// parameter or while adjusting the base itself
    AddressOverflow {
        /// the relative base
        base: i64,
        /// what was added to it
        offset: i64,
    },
    /// An instruction was executed after a previous instruction failed
    Poisoned,
    /// Every producer feeding the interpreter's input channel went away
    InputDisconnected,
    /// The consumer of the interpreter's output channel went away
    OutputDisconnected,
}

impl InterpreterError {
    /// Whether the error came from the other side of a channel going away, rather than from the
    /// program itself
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::InputDisconnected | Self::OutputDisconnected)
    }
}

impl Display for InterpreterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedOpcode {
                ip,
                instruction,
                opcode,
            } => write!(
                f,
                "invalid opcode: ip={ip}, instruction={instruction}, opcode={opcode}"
            ),
            Self::UnknownMode(mode) => write!(f, "encountered unknown parameter mode {mode}"),
            Self::NegativeMemAccess(i) => write!(f, "attempted to access negative address {i}"),
            Self::WriteToImmediate(i) => write!(f, "code attempted to write to immediate {i}"),
            Self::JumpToNegative(i) => write!(f, "code attempted to jump to negative address {i}"),
            Self::AddressOverflow { base, offset } => {
                write!(f, "relative base {base} plus {offset} overflows")
            }
            Self::Poisoned => write!(f, "interpreter is poisoned by an earlier error"),
            Self::InputDisconnected => write!(f, "input channel was closed while awaiting input"),
            Self::OutputDisconnected => write!(f, "output channel was closed while sending"),
        }
    }
}

impl Error for InterpreterError {}

/// An error type that stores the negative address an access was attempted at
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NegativeMemAccess(pub i64);

impl Display for NegativeMemAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempted to access negative address {}", self.0)
    }
}

impl Error for NegativeMemAccess {}

impl From<NegativeMemAccess> for InterpreterError {
    fn from(NegativeMemAccess(i): NegativeMemAccess) -> Self {
        Self::NegativeMemAccess(i)
    }
}

/// Parameter mode for Intcode instruction
///
/// Intcode instruction parameters each have a mode:  [positional], [immediate], or [relative].
///
/// When executing an intcode instruction, the instruction's parameters are interpreted in
/// accordance with their associated modes.
///
/// [positional]: ParamMode::Positional
/// [immediate]: ParamMode::Immediate
/// [relative]: ParamMode::Relative
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ParamMode {
    /// Positional Mode
    ///
    /// A parameter in positional mode evaluates to the value at the address specified by the
    /// parameter.
    Positional = 0,
    /// Immediate Mode
    ///
    /// A parameter in immediate mode evaluates directly to the value specified. Instructions which
    /// write to memory may not use immediate mode for their destinations.
    #[doc(alias = "#")]
    Immediate = 1,
    /// Relative Mode
    ///
    /// A parameter in relative mode evaluates to the value at the address specified by the
    /// parameter, added to the [Relative Base], which starts out as `0` but can be modified
    /// throughout the program's execution.
    ///
    /// [Relative Base]: https://adventofcode.com/2019/day/9
    #[doc(alias = "@")]
    Relative = 2,
}

impl Display for ParamMode {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamMode::Positional => Ok(()),
            ParamMode::Immediate => write!(fmt, "#"),
            ParamMode::Relative => write!(fmt, "@"),
        }
    }
}

impl TryFrom<i64> for ParamMode {
    type Error = InterpreterError;
    fn try_from(i: i64) -> Result<Self, Self::Error> {
        match i {
            0 => Ok(ParamMode::Positional),
            1 => Ok(ParamMode::Immediate),
            2 => Ok(ParamMode::Relative),
            _ => Err(Self::Error::UnknownMode(i)),
        }
    }
}

impl ParamMode {
    /// Extract the three parameter modes from the hundreds, thousands and ten thousands places of
    /// `instruction`
    pub fn extract(instruction: i64) -> Result<[Self; 3], InterpreterError> {
        Ok([
            ((instruction / 100) % 10).try_into()?,  // C (hundreds place)
            ((instruction / 1000) % 10).try_into()?, // B (thousands place)
            (instruction / 10000).try_into()?,       // A (ten thousands place)
        ])
    }
}

/// An Intcode opcode
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[allow(missing_docs, reason = "names are self-explanatory")]
pub enum OpCode {
    Add = 1,
    Mul = 2,
    In = 3,
    Out = 4,
    Jnz = 5,
    Jz = 6,
    Lt = 7,
    Eq = 8,
    Rbo = 9,
    Halt = 99,
}

impl OpCode {
    /// The number of ints the instruction occupies, including the opcode itself
    pub const fn width(self) -> i64 {
        match self {
            OpCode::Add | OpCode::Mul | OpCode::Lt | OpCode::Eq => 4,
            OpCode::Jnz | OpCode::Jz => 3,
            OpCode::In | OpCode::Out | OpCode::Rbo => 2,
            OpCode::Halt => 1,
        }
    }
}

impl TryFrom<i64> for OpCode {
    type Error = i64;
    fn try_from(i: i64) -> Result<Self, i64> {
        match i {
            1 => Ok(OpCode::Add),
            2 => Ok(OpCode::Mul),
            3 => Ok(OpCode::In),
            4 => Ok(OpCode::Out),
            5 => Ok(OpCode::Jnz),
            6 => Ok(OpCode::Jz),
            7 => Ok(OpCode::Lt),
            8 => Ok(OpCode::Eq),
            9 => Ok(OpCode::Rbo),
            99 => Ok(OpCode::Halt),
            n => Err(n),
        }
    }
}

impl Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpCode::Add => "ADD",
            OpCode::Mul => "MUL",
            OpCode::In => "IN",
            OpCode::Out => "OUT",
            OpCode::Jnz => "JNZ",
            OpCode::Jz => "JZ",
            OpCode::Lt => "LT",
            OpCode::Eq => "EQ",
            OpCode::Rbo => "RBO",
            OpCode::Halt => "HALT",
        };
        f.write_str(name)
    }
}

/// An intcode interpreter, which provides optional tracing of instructions executed.
///
/// Each interpreter owns its memory exclusively; cloning one produces a fully independent machine
/// at the same point of execution.
#[derive(Clone)]
pub struct Interpreter {
    index: i64,
    rel_offset: i64,
    code: IntcodeMem,
    halted: bool,
    poisoned: bool,
    trace: Option<Trace>,
}

// ignore the trace field
impl PartialEq for Interpreter {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.rel_offset == other.rel_offset
            && self.halted == other.halted
            && self.poisoned == other.poisoned
            && self.code == other.code
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("Interpreter")
            .field("code", &self.code)
            .field("rbo", &self.rel_offset)
            .field("ip", &self.index)
            .field("halted", &self.halted)
            .field("poisoned", &self.poisoned)
            .field("tracing", &self.trace.is_some())
            .finish()
    }
}

impl Index<u64> for Interpreter {
    type Output = i64;

    fn index(&self, i: u64) -> &Self::Output {
        usize::try_from(i).map_or(&0, |i| &self.code[i])
    }
}

impl Interpreter {
    /// Create a new interpreter. Collects `code` into the starting memory state.
    pub fn new(code: impl IntoIterator<Item = i64>) -> Self {
        Self {
            index: 0,
            rel_offset: 0,
            code: code.into_iter().collect(),
            halted: false,
            poisoned: false,
            trace: None,
        }
    }

    /// Create a new interpreter with at least `min_len` cells of memory allocated up front.
    ///
    /// Memory grows on demand regardless, so this only avoids repeated reallocation for programs
    /// known to use addresses well past their own end.
    pub fn with_memory(code: impl IntoIterator<Item = i64>, min_len: usize) -> Self {
        let mut interp = Self::new(code);
        interp.code.reserve_zeroed(min_len);
        interp
    }

    /// Manually set a memory location
    #[doc(alias("poke", "write"))]
    pub fn mem_override(&mut self, location: i64, value: i64) -> Result<(), NegativeMemAccess> {
        *self.code.cell(Self::address(location)?) = value;
        Ok(())
    }

    /// Get the memory at `address`
    #[doc(alias = "peek")]
    pub fn mem_get(&self, address: i64) -> Result<i64, NegativeMemAccess> {
        Self::address(address).map(|a| self.code.get(a))
    }

    /// Get `len` cells of memory starting at `start`. Cells past the end of memory read as `0`,
    /// and memory isn't grown to cover them.
    ///
    /// # Example
    /// ```
    /// # use intcode::prelude::*;
    /// let interp = Interpreter::new([104, 7, 99]);
    /// assert_eq!(&*interp.mem_range(1, 4).unwrap(), &[7, 99, 0, 0]);
    /// assert!(interp.mem_range(-1, 2).is_err());
    /// ```
    pub fn mem_range(&self, start: i64, len: usize) -> Result<Cow<'_, [i64]>, NegativeMemAccess> {
        let start = Self::address(start)?;
        Ok(self.code.get_range(start..start.saturating_add(len)))
    }

    /// The currently allocated memory, including any cells added by growth
    pub fn memory(&self) -> &[i64] {
        self.code.as_slice()
    }

    /// Consume the interpreter, returning its memory
    pub fn into_memory(self) -> Vec<i64> {
        self.code.into_iter().collect()
    }

    /// The instruction pointer
    pub fn instr_ptr(&self) -> i64 {
        self.index
    }

    /// The relative base used by [`ParamMode::Relative`] parameters
    pub fn rel_base(&self) -> i64 {
        self.rel_offset
    }

    /// Whether a `HALT` instruction has been executed
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Whether a previous instruction failed, preventing further execution
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Execute a single instruction.
    ///
    /// An `IN` instruction pulls exactly one value from `inputs`; if there is none, nothing is
    /// changed and [`StepOutcome::Stopped(State::Awaiting)`](StepOutcome::Stopped) is returned.
    /// No other instruction touches `inputs`.
    pub fn exec_instruction(
        &mut self,
        inputs: &mut impl Iterator<Item = i64>,
        outputs: &mut impl OutputSink,
    ) -> Result<StepOutcome, InterpreterError> {
        if self.poisoned {
            return Err(InterpreterError::Poisoned);
        }
        if self.halted {
            return Ok(StepOutcome::Stopped(State::Halted));
        }

        let outcome = self.dispatch(inputs, outputs);
        if let Err(ref e) = outcome
            && !e.is_disconnect()
        {
            self.poisoned = true;
            tracing::warn!(ip = self.index, rbo = self.rel_offset, "{e}");
        }
        outcome
    }

    /// Execute until either the program halts, or it tries to read input that `inputs` can't
    /// provide, returning the [`State`] it stopped in.
    pub fn run_with(
        &mut self,
        inputs: &mut impl Iterator<Item = i64>,
        outputs: &mut impl OutputSink,
    ) -> Result<State, InterpreterError> {
        loop {
            if let StepOutcome::Stopped(state) = self.exec_instruction(inputs, outputs)? {
                break Ok(state);
            }
        }
    }

    /// Execute until either the program halts, or it tries to read nonexistent input.
    /// If the interpreter stopped, returns `Ok((v, s))`, where `v` is a [`Vec<i64>`] containing all
    /// outputs that it found, and `s` is the [`State`] at the time it stopped.
    ///
    /// On error, it will return an [`InterpreterError`] that reflects the error.
    pub fn run_through_inputs(
        &mut self,
        inputs: impl IntoIterator<Item = i64>,
    ) -> Result<(Vec<i64>, State), InterpreterError> {
        let mut outputs = Vec::new();
        let state = self.run_with(&mut inputs.into_iter(), &mut outputs)?;
        Ok((outputs, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::empty;
    /// Example program from day 9, which takes no input and outputs its own code
    #[test]
    fn quine() {
        let quine_code = vec![
            109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
        ];
        let mut interpreter = Interpreter::new(quine_code.clone());
        let (outputs, State::Halted) = interpreter.run_through_inputs(empty()).unwrap() else {
            panic!("Did not halt");
        };
        assert_eq!(quine_code, outputs);
    }

    #[test]
    fn add_to_self() {
        let mut interpreter = Interpreter::new([1, 0, 0, 0, 99]);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Ok((vec![], State::Halted))
        );
        assert_eq!(interpreter[0], 2);
        assert!(interpreter.is_halted());
    }

    /// Ensure that failure due to missing input leaves the interpreter in a sane state that can
    /// be recovered from
    #[test]
    fn missing_input_recoverable() {
        let mut interpreter = Interpreter::new(vec![3, 10, 4, 10, 99]);
        let old_state = interpreter.clone();

        let failed_run = interpreter.run_through_inputs(empty());

        // make sure that the failure returned the right state and left `interpreter` unchanged
        assert_eq!(failed_run, Ok((vec![], State::Awaiting)));
        assert_eq!(interpreter, old_state);

        // make sure that interpreter can still be used
        assert_eq!(
            interpreter.run_through_inputs(vec![1]),
            Ok((vec![1], State::Halted))
        );
    }

    #[test]
    fn halted_interpreter_stays_halted() {
        let mut interpreter = Interpreter::new([104, 5, 99]);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Ok((vec![5], State::Halted))
        );
        let ip = interpreter.instr_ptr();
        assert_eq!(
            interpreter.run_through_inputs([1, 2, 3]),
            Ok((vec![], State::Halted))
        );
        assert_eq!(interpreter.instr_ptr(), ip);
    }

    #[test]
    fn write_to_immediate_poisons() {
        for code in [
            vec![11101, 1, 1, 5, 99, 0],
            vec![11102, 1, 1, 5, 99, 0],
            vec![11107, 1, 1, 5, 99, 0],
            vec![11108, 1, 1, 5, 99, 0],
            vec![103, 5, 99],
        ] {
            let mut interpreter = Interpreter::new(code);
            let before = interpreter.clone();
            assert_eq!(
                interpreter.run_through_inputs([1]),
                Err(InterpreterError::WriteToImmediate(5))
            );
            assert!(interpreter.is_poisoned());
            assert_eq!(interpreter.instr_ptr(), before.instr_ptr());
            assert_eq!(interpreter.memory(), before.memory());
            assert_eq!(
                interpreter.run_through_inputs([1]),
                Err(InterpreterError::Poisoned)
            );
        }
    }

    #[test]
    fn unrecognized_opcode_reports_context() {
        let mut interpreter = Interpreter::new([1101, 1, 1, 5, 1042, 0]);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Err(InterpreterError::UnrecognizedOpcode {
                ip: 4,
                instruction: 1042,
                opcode: 42
            })
        );
    }

    #[test]
    fn negative_addresses_are_fatal() {
        assert_eq!(
            Interpreter::new([4, -1, 99]).run_through_inputs(empty()),
            Err(InterpreterError::NegativeMemAccess(-1))
        );
        // relative base pushed below zero
        assert_eq!(
            Interpreter::new([109, -5, 204, 1, 99]).run_through_inputs(empty()),
            Err(InterpreterError::NegativeMemAccess(-4))
        );
        assert_eq!(
            Interpreter::new([1105, 1, -3]).run_through_inputs(empty()),
            Err(InterpreterError::JumpToNegative(-3))
        );
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(
            Interpreter::new([1101, i64::MAX, 1, 0, 4, 0, 99]).run_through_inputs(empty()),
            Ok((vec![i64::MIN], State::Halted))
        );
        assert_eq!(
            Interpreter::new([1102, i64::MAX, 2, 0, 4, 0, 99]).run_through_inputs(empty()),
            Ok((vec![-2], State::Halted))
        );
    }

    #[test]
    fn relative_overflow_is_fatal() {
        let overflow = InterpreterError::AddressOverflow {
            base: i64::MAX,
            offset: 1,
        };
        // OUT @1 with the base at i64::MAX
        let mut interpreter = Interpreter::new([109, i64::MAX, 204, 1, 99]);
        assert_eq!(interpreter.run_through_inputs(empty()), Err(overflow.clone()));
        assert_eq!(interpreter.rel_base(), i64::MAX);
        // RBO #1 with the base at i64::MAX
        let mut interpreter = Interpreter::new([109, i64::MAX, 109, 1, 99]);
        assert_eq!(interpreter.run_through_inputs(empty()), Err(overflow));
        assert_eq!(interpreter.rel_base(), i64::MAX);
        assert!(interpreter.is_poisoned());
    }

    #[test]
    fn awaiting_does_not_grow_memory() {
        let mut interpreter = Interpreter::new([3, 1000, 99]);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Ok((vec![], State::Awaiting))
        );
        assert_eq!(interpreter.memory().len(), 3);
        assert_eq!(
            interpreter.run_through_inputs([7]),
            Ok((vec![], State::Halted))
        );
        assert_eq!(interpreter.memory().len(), 1001);
        assert_eq!(interpreter.mem_get(1000), Ok(7));
    }

    #[test]
    fn unknown_mode_is_fatal() {
        assert_eq!(
            Interpreter::new([304, 0, 99]).run_through_inputs(empty()),
            Err(InterpreterError::UnknownMode(3))
        );
    }

    #[test]
    fn relative_base_persists() {
        // RBO #10, RBO #5, OUT @-15 (address 0 holds 109), HALT
        let mut interpreter = Interpreter::new([109, 10, 109, 5, 204, -15, 99]);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Ok((vec![109], State::Halted))
        );
        assert_eq!(interpreter.rel_base(), 15);
    }

    #[test]
    fn self_modifying_code() {
        // writes 99 over the instruction at address 4, which would otherwise output 7
        let mut interpreter = Interpreter::new([1101, 90, 9, 4, 104, 7, 99]);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Ok((vec![], State::Halted))
        );
        assert_eq!(interpreter.mem_get(4), Ok(99));
    }

    #[test]
    fn memory_grows_on_write() {
        let mut interpreter = Interpreter::with_memory([1101, 2, 3, 1000, 4, 1000, 99], 16);
        assert_eq!(interpreter.memory().len(), 16);
        assert_eq!(
            interpreter.run_through_inputs(empty()),
            Ok((vec![5], State::Halted))
        );
        assert_eq!(interpreter.memory().len(), 1001);
        assert_eq!(interpreter.mem_get(999), Ok(0));
        assert_eq!(interpreter.mem_get(-1), Err(NegativeMemAccess(-1)));
    }
}
