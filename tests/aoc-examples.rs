//! Check the example programs from the Advent of Code 2019 puzzle descriptions.
// SPDX-FileCopyrightText: 2024 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

use std::iter::once;

use either::Either;
use intcode::prelude::*;
use intcode::trace::Trace;
use intcode::{OpCode, ParamMode, StepOutcome};
use itertools::Itertools;

/// Load an example the same way a program file is loaded
fn load(text: &str) -> Interpreter {
    Program::parse(text).unwrap().interpreter()
}

/// Run until the machine stops. Outputs of a halted run are on the left, outputs of a run that
/// stopped for more input are on the right.
fn finish(
    interp: &mut Interpreter,
    inputs: impl IntoIterator<Item = i64>,
) -> Result<Either<Vec<i64>, Vec<i64>>, InterpreterError> {
    let (output, state) = interp.run_through_inputs(inputs)?;
    Ok(match state {
        State::Halted => Either::Left(output),
        State::Awaiting => Either::Right(output),
    })
}

/// Check the opcode, address and stored value of every traced step
fn assert_steps(Trace(steps): Trace, expected: &[(OpCode, i64, Option<i64>)]) {
    let actual = steps
        .iter()
        .map(|step| (step.op_code(), step.instr_ptr(), step.stored_val()));
    for (actual, &expected) in actual.zip_eq(expected) {
        assert_eq!(actual, expected);
    }
}

mod day2 {
    use crate::*;

    #[test]
    fn extended_example() {
        let mut interp = load("1,9,10,3,2,3,11,0,99,30,40,50");
        interp.start_trace();
        assert_eq!(finish(&mut interp, empty()), Ok(Either::Left(vec![])));
        assert_steps(
            interp.end_trace().unwrap(),
            &[
                (OpCode::Add, 0, Some(70)),
                (OpCode::Mul, 4, Some(3500)),
                (OpCode::Halt, 8, None),
            ],
        );
        assert_eq!(interp.mem_range(0, 4).unwrap().into_owned(), vec![3500, 9, 10, 70]);
    }

    #[test]
    fn final_memory() {
        let cases: [(&str, &[i64]); 4] = [
            ("1,0,0,0,99", &[2, 0, 0, 0, 99]),
            ("2,3,0,3,99", &[2, 3, 0, 6, 99]),
            ("2,4,4,5,99,0", &[2, 4, 4, 5, 99, 9801]),
            ("1,1,1,4,99,5,6,0,99", &[30, 1, 1, 4, 2, 5, 6, 0, 99]),
        ];
        for (code, expected) in cases {
            let mut interp = load(code);
            assert!(finish(&mut interp, empty()).unwrap().is_left(), "{code}");
            assert_eq!(interp.memory(), expected, "{code}");
        }
    }
}

mod day5 {
    use crate::*;

    #[test]
    fn echo() {
        for value in [i64::MIN, -1, 0, 1, 1234, i64::MAX] {
            let mut interp = load("3,0,4,0,99");
            assert_eq!(finish(&mut interp, [value]), Ok(Either::Left(vec![value])));
        }
    }

    /// both examples store 99 over their own final instruction, and then halt there
    #[test]
    fn immediate_operands() {
        for (code, modes) in [
            ("1002,4,3,4,33", [ParamMode::Positional, ParamMode::Immediate, ParamMode::Positional]),
            ("1101,100,-1,4,0", [ParamMode::Immediate, ParamMode::Immediate, ParamMode::Positional]),
        ] {
            let mut interp = load(code);
            interp.start_trace();
            assert_eq!(finish(&mut interp, empty()), Ok(Either::Left(vec![])));
            let trace = interp.end_trace().unwrap();
            assert_eq!(trace.0[0].param_modes(), modes);
            assert_eq!(trace.0[1].instr_ptr(), 4);
            assert_eq!(interp.mem_get(4), Ok(99));
        }
    }

    #[test]
    fn comparisons() {
        let cases: [(&str, OpCode, fn(i64) -> bool); 4] = [
            ("3,9,8,9,10,9,4,9,99,-1,8", OpCode::Eq, |n| n == 8),
            ("3,9,7,9,10,9,4,9,99,-1,8", OpCode::Lt, |n| n < 8),
            ("3,3,1108,-1,8,3,4,3,99", OpCode::Eq, |n| n == 8),
            ("3,3,1107,-1,8,3,4,3,99", OpCode::Lt, |n| n < 8),
        ];
        for (code, op, holds) in cases {
            for input in [7, 8, 9] {
                let verdict = i64::from(holds(input));
                let mut interp = load(code);
                interp.start_trace();
                assert_eq!(finish(&mut interp, [input]), Ok(Either::Left(vec![verdict])));
                assert_steps(
                    interp.end_trace().unwrap(),
                    &[
                        (OpCode::In, 0, Some(input)),
                        (op, 2, Some(verdict)),
                        (OpCode::Out, 6, None),
                        (OpCode::Halt, 8, None),
                    ],
                );
            }
        }
    }

    /// The jump examples output 0 for an input of 0, and 1 otherwise. The first one jumps when the
    /// input is zero, the second one when it isn't.
    #[test]
    fn jumps() {
        let cases = [
            ("3,12,6,12,15,1,13,14,13,4,13,99,-1,0,1,9", true),
            ("3,3,1105,-1,9,1101,0,0,12,4,12,99,1", false),
        ];
        for (code, jumps_on_zero) in cases {
            for input in [0, -3, 5] {
                let mut interp = load(code);
                let mut output = Vec::new();
                assert_eq!(
                    interp.exec_instruction(&mut empty(), &mut output),
                    Ok(StepOutcome::Stopped(State::Awaiting))
                );
                assert_eq!(interp.instr_ptr(), 0);
                assert_eq!(
                    interp.exec_instruction(&mut once(input), &mut output),
                    Ok(StepOutcome::Running)
                );
                interp.start_trace();
                assert_eq!(
                    interp.exec_instruction(&mut empty(), &mut output),
                    Ok(StepOutcome::Running)
                );
                let Trace(steps) = interp.end_trace().unwrap();
                assert_eq!(steps.len(), 1);
                assert_eq!(steps[0].jumped(), (input == 0) == jumps_on_zero, "{code} <- {input}");
                assert!(output.is_empty());
                assert_eq!(
                    finish(&mut interp, empty()),
                    Ok(Either::Left(vec![i64::from(input != 0)]))
                );
            }
        }
    }

    /// outputs 999 below 8, 1000 at 8, and 1001 above 8
    #[test]
    fn compare_to_eight() {
        const CODE: &str = "3,21,1008,21,8,20,1005,20,22,107,8,21,20,1006,20,31,1106,0,36,98,0,0,\
                            1002,21,125,20,4,20,1105,1,46,104,999,1105,1,46,1101,1000,1,20,4,20,\
                            1105,1,46,98,99";
        let program = Program::parse(CODE).unwrap();
        for (input, expected) in [(-40, 999), (7, 999), (8, 1000), (9, 1001), (4000, 1001)] {
            let mut interp = program.interpreter();
            assert_eq!(finish(&mut interp, [input]), Ok(Either::Left(vec![expected])));
        }
    }
}

mod day9 {
    use crate::*;

    #[test]
    fn big_numbers() {
        let mut interp = load("1102,34915192,34915192,7,4,7,99,0");
        let output = finish(&mut interp, empty()).unwrap().unwrap_left();
        assert_eq!(output, vec![1_219_070_632_396_864]);
        assert_eq!(output[0].to_string().len(), 16);

        let mut interp = load("104,1125899906842624,99");
        assert_eq!(
            finish(&mut interp, empty()),
            Ok(Either::Left(vec![1_125_899_906_842_624]))
        );
    }

    /// relative mode reads and writes both follow the relative base
    #[test]
    fn relative_mode_round_trip() {
        // RBO #2000, IN @0, ADD @0 @0 @1, OUT @1, HALT
        let mut interp = load("109,2000,203,0,22201,0,0,1,204,1,99");
        interp.start_trace();
        assert_eq!(finish(&mut interp, [21]), Ok(Either::Left(vec![42])));
        assert_eq!(interp.mem_range(2000, 2).unwrap().into_owned(), vec![21, 42]);
        let Trace(steps) = interp.end_trace().unwrap();
        assert_eq!(steps[0].rel_base(), 0);
        assert!(steps[1..].iter().all(|step| step.rel_base() == 2000));
    }
}

mod failures {
    use crate::*;

    /// writing through an immediate destination fails on the step that tries it
    #[test]
    fn write_to_immediate_step() {
        // OUT #1, ADD #2 #3 #7, HALT
        let program = Program::parse("104,1,11101,2,3,7,99").unwrap();
        let mut interp = program.interpreter();
        let mut output = Vec::new();
        assert_eq!(
            interp.exec_instruction(&mut empty(), &mut output),
            Ok(StepOutcome::Running)
        );
        assert_eq!(
            interp.exec_instruction(&mut empty(), &mut output),
            Err(InterpreterError::WriteToImmediate(7))
        );
        assert_eq!(
            interp.exec_instruction(&mut empty(), &mut output),
            Err(InterpreterError::Poisoned)
        );
        assert_eq!(output, vec![1]);
        assert_eq!(interp.instr_ptr(), 2);
        assert_eq!(interp.memory(), program.as_slice());
    }

    /// output produced before running out of input is kept, and the run can resume
    #[test]
    fn awaiting_keeps_output() {
        let mut interp = load("3,20,4,20,3,21,99");
        assert_eq!(finish(&mut interp, [5]), Ok(Either::Right(vec![5])));
        assert_eq!(interp.instr_ptr(), 4);
        assert_eq!(finish(&mut interp, [6]), Ok(Either::Left(vec![])));
        assert_eq!(interp.mem_get(21), Ok(6));
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let mut interp = load("1,0,0,0,42");
        assert!(matches!(
            finish(&mut interp, empty()),
            Err(InterpreterError::UnrecognizedOpcode { ip: 4, .. })
        ));
        assert!(interp.is_poisoned());
        assert_eq!(interp.mem_get(0), Ok(2));
        assert_eq!(finish(&mut interp, empty()), Err(InterpreterError::Poisoned));
    }
}
