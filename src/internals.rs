// SPDX-FileCopyrightText: 2024 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

use super::*;

impl Interpreter {
    // Given a 5 digit number, digits ABCDE are used as follows:
    // DE is the two-digit opcode
    // C is the 1st parameter's mode
    // B is the 2nd parameter's mode
    // A is the 3rd parameter's mode
    //
    // So *0*1202 would be parsed as follows:
    //
    // Opcode 02 is multiply
    // C=2: 1st parameter is in relative mode
    // B=1: 2nd parameter is in immediate mode
    // A=0: 3rd parameter is in positional mode
    pub(crate) fn parse_op(ip: i64, op: i64) -> Result<(OpCode, [ParamMode; 3]), InterpreterError> {
        let opcode = OpCode::try_from(op % 100).map_err(|opcode| {
            InterpreterError::UnrecognizedOpcode {
                ip,
                instruction: op,
                opcode,
            }
        })?;
        Ok((opcode, ParamMode::extract(op)?))
    }

    /// Convert a signed address into an index into memory
    pub(crate) fn address(address: i64) -> Result<usize, NegativeMemAccess> {
        usize::try_from(address).map_err(|_| NegativeMemAccess(address))
    }

    /// Address of the `offset`th int of the current instruction
    pub(crate) fn param_address(&self, offset: i64) -> Result<usize, NegativeMemAccess> {
        Self::address(self.index.saturating_add(offset))
    }

    /// The raw, unresolved `offset`th int of the current instruction
    pub(crate) fn raw_param(&self, offset: i64) -> Result<i64, NegativeMemAccess> {
        self.param_address(offset).map(|address| self.code.get(address))
    }

    /// `raw` offset from the relative base
    pub(crate) fn relative(&self, raw: i64) -> Result<i64, InterpreterError> {
        self.rel_offset
            .checked_add(raw)
            .ok_or(InterpreterError::AddressOverflow {
                base: self.rel_offset,
                offset: raw,
            })
    }

    /// Processes the `offset`th parameter of the current instruction into a concrete value using
    /// the method appropriate for `mode`, growing memory if the value lives past its end.
    pub(crate) fn resolve_param(
        &mut self,
        mode: ParamMode,
        offset: i64,
    ) -> Result<i64, InterpreterError> {
        let raw = self.raw_param(offset)?;
        match mode {
            ParamMode::Positional => Ok(*self.code.cell(Self::address(raw)?)),
            ParamMode::Immediate => Ok(raw),
            ParamMode::Relative => Ok(*self.code.cell(Self::address(self.relative(raw)?)?)),
        }
    }

    /// Turns the `offset`th parameter of the current instruction into a concrete index according
    /// to `mode`. Memory is only grown once something is written there.
    pub(crate) fn resolve_dest(&self, mode: ParamMode, offset: i64) -> Result<usize, InterpreterError> {
        let raw = self.raw_param(offset)?;
        match mode {
            ParamMode::Positional => Ok(Self::address(raw)?),
            ParamMode::Immediate => Err(InterpreterError::WriteToImmediate(raw)),
            ParamMode::Relative => Ok(Self::address(self.relative(raw)?)?),
        }
    }

    /// Decode the instruction at the instruction pointer and execute it
    pub(crate) fn dispatch(
        &mut self,
        inputs: &mut impl Iterator<Item = i64>,
        outputs: &mut impl OutputSink,
    ) -> Result<StepOutcome, InterpreterError> {
        let ip = self.index;
        let instruction = self.raw_param(0)?;
        let (opcode, modes) = Self::parse_op(ip, instruction)?;
        tracing::trace!(ip, rbo = self.rel_offset, instruction, %opcode);

        match opcode {
            OpCode::Add => self.op3(modes, i64::wrapping_add),
            OpCode::Mul => self.op3(modes, i64::wrapping_mul),
            OpCode::Lt => self.op3(modes, |a, b| i64::from(a < b)),
            OpCode::Eq => self.op3(modes, |a, b| i64::from(a == b)),
            OpCode::In => self.input(modes, inputs),
            OpCode::Out => self.output(modes, outputs),
            OpCode::Jnz => self.jump(modes, |v| v != 0),
            OpCode::Jz => self.jump(modes, |v| v == 0),
            OpCode::Rbo => {
                let offset = self.resolve_param(modes[0], 1)?;
                let base = self.relative(offset)?;
                self.trace([(self.raw_param(1)?, offset)]);
                self.rel_offset = base;
                self.index += OpCode::Rbo.width();
                Ok(StepOutcome::Running)
            }
            OpCode::Halt => {
                self.trace([]);
                self.halted = true;
                Ok(StepOutcome::Stopped(State::Halted))
            }
        }
    }

    /// common logic of all 4 instructions that take 3 parameters
    pub(crate) fn op3(
        &mut self,
        modes: [ParamMode; 3],
        operation: impl Fn(i64, i64) -> i64,
    ) -> Result<StepOutcome, InterpreterError> {
        let a = self.resolve_param(modes[0], 1)?;
        let b = self.resolve_param(modes[1], 2)?;
        let dest = self.resolve_dest(modes[2], 3)?;
        let val = operation(a, b);
        self.trace([
            (self.raw_param(1)?, a),
            (self.raw_param(2)?, b),
            (self.raw_param(3)?, val),
        ]);
        self.code[dest] = val;
        self.index += 4;
        Ok(StepOutcome::Running)
    }

    pub(crate) fn input(
        &mut self,
        modes: [ParamMode; 3],
        inputs: &mut impl Iterator<Item = i64>,
    ) -> Result<StepOutcome, InterpreterError> {
        // an invalid destination must fail before any input is consumed
        let dest = self.resolve_dest(modes[0], 1)?;
        let Some(input) = inputs.next() else {
            return Ok(StepOutcome::Stopped(State::Awaiting));
        };
        self.trace([(self.raw_param(1)?, input)]);
        self.code[dest] = input;
        self.index += 2;
        Ok(StepOutcome::Running)
    }

    pub(crate) fn output(
        &mut self,
        modes: [ParamMode; 3],
        outputs: &mut impl OutputSink,
    ) -> Result<StepOutcome, InterpreterError> {
        let val = self.resolve_param(modes[0], 1)?;
        outputs.emit(val)?;
        self.trace([(self.raw_param(1)?, val)]);
        self.index += 2;
        Ok(StepOutcome::Running)
    }

    pub(crate) fn jump(
        &mut self,
        modes: [ParamMode; 3],
        func: impl Fn(i64) -> bool,
    ) -> Result<StepOutcome, InterpreterError> {
        let expr = self.resolve_param(modes[0], 1)?;
        let dest = self.resolve_param(modes[1], 2)?;
        if func(expr) && dest < 0 {
            return Err(InterpreterError::JumpToNegative(dest));
        }
        self.trace([(self.raw_param(1)?, expr), (self.raw_param(2)?, dest)]);
        if func(expr) {
            self.index = dest;
        } else {
            self.index += 3;
        }
        Ok(StepOutcome::Running)
    }

    /// Record the instruction at the instruction pointer in the active trace, if there is one.
    ///
    /// Must be called before the instruction pointer or relative base are changed.
    pub(crate) fn trace<const N: usize>(&mut self, resolved_params: [(i64, i64); N]) {
        let op_int = self.raw_param(0).unwrap_or_default();
        if let Some(trace) = self.trace.as_mut() {
            trace.push(op_int, self.index, self.rel_offset, &resolved_params);
        }
    }
}
