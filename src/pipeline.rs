// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Chains of machines, each feeding its output into the next one's input
//!
//! Every stage runs the same program on its own thread. Stage `i` reads from link `i` and writes
//! to link `i + 1`. In a [ring](Topology::Ring), the last stage writes back into link `0`, so the
//! first stage keeps refining what the last one produced until every stage halts.
//!
//! # Example
//!
//! ```
//! use intcode::pipeline::{Pipeline, PipelineConfig};
//! let program = "3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0".parse().unwrap();
//! let pipeline = Pipeline::new(program, PipelineConfig::default());
//! assert_eq!(pipeline.best_signal(&[0, 1, 2, 3, 4], 0).unwrap(), (vec![4, 3, 2, 1, 0], 43210));
//! ```

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use itertools::Itertools;

use crate::InterpreterError;
use crate::machine;
use crate::ports::ChannelInput;
use crate::program::Program;

/// How the stages of a [Pipeline] are connected
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum Topology {
    /// The last stage's output is collected by the driver
    #[default]
    Chain,
    /// The last stage's output feeds back into the first stage
    Ring,
}

/// Settings for a [Pipeline]
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct PipelineConfig {
    /// How stages are connected
    pub topology: Topology,
    /// How many values each link can buffer. [`None`] means unbounded, and `Some(0)` means every
    /// value is handed over directly, blocking the sender until the receiver takes it.
    pub link_capacity: Option<usize>,
}

impl PipelineConfig {
    /// Set the [Topology]
    #[must_use]
    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the link capacity
    #[must_use]
    pub fn link_capacity(mut self, capacity: Option<usize>) -> Self {
        self.link_capacity = capacity;
        self
    }

    /// The closing link of a ring must be able to hold the final value, since the driver only
    /// starts reading it once the first stage has halted
    fn link(self, closing: bool) -> (Sender<i64>, Receiver<i64>) {
        match self.link_capacity {
            None => unbounded(),
            Some(cap) if closing && self.topology == Topology::Ring => bounded(cap.max(1)),
            Some(cap) => bounded(cap),
        }
    }
}

/// An error that stopped a [Pipeline] from producing a signal
#[derive(Debug)]
pub enum PipelineError {
    /// No phases were given, so there were no stages to run
    NoStages,
    /// A stage's thread couldn't be started
    Spawn(io::Error),
    /// A stage failed
    Machine {
        /// index of the failing stage
        stage: usize,
        /// what went wrong
        source: InterpreterError,
    },
    /// Every stage halted, but nothing was left on the closing link
    NoSignal,
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStages => write!(f, "a pipeline needs at least one stage"),
            Self::Spawn(e) => write!(f, "failed to start a stage: {e}"),
            Self::Machine { stage, source } => write!(f, "stage {stage} failed: {source}"),
            Self::NoSignal => write!(f, "every stage halted without producing a signal"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Machine { source, .. } => Some(source),
            Self::NoStages | Self::NoSignal => None,
        }
    }
}

impl From<io::Error> for PipelineError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

fn join(handle: JoinHandle<machine::MachineResult>) -> machine::MachineResult {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// A sequence of machines running the same program, each wired to the next
#[derive(Debug, Clone)]
pub struct Pipeline {
    program: Program,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline running `program` in every stage
    pub fn new(program: Program, config: PipelineConfig) -> Self {
        Self { program, config }
    }

    /// Run one stage per entry of `phases`. Each stage first receives its phase, then the first
    /// stage receives `initial`. Once every stage has halted, returns the last value left on the
    /// closing link.
    pub fn run(&self, phases: &[i64], initial: i64) -> Result<i64, PipelineError> {
        if phases.is_empty() {
            return Err(PipelineError::NoStages);
        }
        let stages = phases.len();
        let link_count = match self.config.topology {
            Topology::Chain => stages + 1,
            Topology::Ring => stages,
        };
        let closing = match self.config.topology {
            Topology::Chain => stages,
            Topology::Ring => 0,
        };
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..link_count)
            .map(|i| self.config.link(i == closing))
            .unzip();

        // seeds are read before anything from the link, so the driver never blocks handing them over
        let mut handles = Vec::with_capacity(stages);
        for (stage, &phase) in phases.iter().enumerate() {
            let seeds = if stage == 0 {
                vec![phase, initial]
            } else {
                vec![phase]
            };
            let inputs = seeds
                .into_iter()
                .chain(ChannelInput::new(receivers[stage].clone()));
            let output = senders[(stage + 1) % link_count].clone();
            handles.push(machine::spawn_with(
                stage,
                self.program.interpreter(),
                inputs,
                output,
            )?);
        }
        tracing::debug!(stages, topology = ?self.config.topology, "pipeline started");

        // keep only the closing link's receiver, so stages see their peers disconnect
        let result_rx = receivers[closing].clone();
        drop(senders);
        drop(receivers);

        let mut handles = handles.into_iter().enumerate();
        let mut results = Vec::with_capacity(stages);
        if self.config.topology == Topology::Ring {
            // the first stage reads the closing link of a ring until it stops
            results.extend(handles.next().map(|(stage, h)| (stage, join(h))));
        }
        // ends once the last stage stops and drops its end of the link
        let signal = result_rx.iter().last();
        results.extend(handles.map(|(stage, h)| (stage, join(h))));

        Self::check_stages(results)?;
        signal.ok_or(PipelineError::NoSignal)
    }

    /// Report the root cause if any stage failed. A failure usually strands its neighbours, and
    /// their disconnection errors are only reported if nothing else went wrong.
    fn check_stages(
        results: impl IntoIterator<Item = (usize, machine::MachineResult)>,
    ) -> Result<(), PipelineError> {
        let mut disconnect = None;
        let mut failure = None;
        for (stage, result) in results {
            match result {
                Ok(_) => (),
                Err(source) if source.is_disconnect() => {
                    disconnect.get_or_insert(PipelineError::Machine { stage, source });
                }
                Err(source) => {
                    failure.get_or_insert(PipelineError::Machine { stage, source });
                }
            }
        }
        match failure.or(disconnect) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Try every ordering of `phase_values`, returning the phases that produced the highest
    /// signal along with that signal
    pub fn best_signal(
        &self,
        phase_values: &[i64],
        initial: i64,
    ) -> Result<(Vec<i64>, i64), PipelineError> {
        let mut best: Option<(Vec<i64>, i64)> = None;
        for phases in phase_values.iter().copied().permutations(phase_values.len()) {
            let signal = self.run(&phases, initial)?;
            tracing::trace!(?phases, signal, "pipeline run finished");
            if best.as_ref().is_none_or(|&(_, b)| signal > b) {
                best = Some((phases, signal));
            }
        }
        best.ok_or(PipelineError::NoStages)
    }
}
