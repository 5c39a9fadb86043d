// SPDX-FileCopyrightText: 2025 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Run Intcode programs, alone or wired together with other copies of themselves

use intcode::network::{Network, NetworkConfig};
use intcode::pipeline::{Pipeline, PipelineConfig, Topology};
use intcode::prelude::*;
use intcode::program::Endian;
use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::io::{self, Write, stdin, stdout};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::prelude::*;

#[derive(PartialEq, Clone, Copy, ValueEnum)]
enum CodeFormat {
    /// comma-separated ASCII-encoded decimal numbers
    #[value(alias("text"))]
    #[value(alias("aoc"))]
    Ascii,
    /// little-endian 64-bit integers
    #[cfg_attr(target_endian = "little", value(alias("binary-native")))]
    #[value(name("binary-little-endian"), alias("binle"))]
    LittleEndian,
    #[cfg_attr(target_endian = "big", value(alias("binary-native")))]
    #[value(name("binary-big-endian"), alias("binbe"))]
    /// big-endian 64-bit integers
    BigEndian,
}

const VERSION: &str = concat!(env!("CARGO_CRATE_NAME"), '-', env!("CARGO_PKG_VERSION"));

#[derive(Parser)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = VERSION)]
#[command(about = "Intcode interpreter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Source {
    #[arg(help = "The intcode program to run")]
    source: PathBuf,
    #[arg(help = "Input format for the intcode")]
    #[arg(short, long)]
    #[arg(default_value = "ascii")]
    format: CodeFormat,
}

impl Source {
    fn load(&self) -> Result<Program, Box<dyn Error>> {
        let program = match self.format {
            CodeFormat::Ascii => Program::parse(&fs::read_to_string(&self.source)?)?,
            CodeFormat::LittleEndian => Program::from_bytes(&fs::read(&self.source)?, Endian::Little)?,
            CodeFormat::BigEndian => Program::from_bytes(&fs::read(&self.source)?, Endian::Big)?,
        };
        tracing::debug!(len = program.len(), source = %self.source.display(), "loaded program");
        Ok(program)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run with the given inputs, printing every output
    Run {
        #[command(flatten)]
        source: Source,
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        #[arg(help = "Comma-separated inputs")]
        input: Vec<i64>,
        #[arg(short, long, help = "Print every executed instruction to stderr")]
        trace: bool,
    },
    /// Run interactively, translating stdin and stdout to and from ASCII
    Ascii {
        #[command(flatten)]
        source: Source,
    },
    /// Find the phase ordering that gets the highest signal through a chain of machines
    Amplify {
        #[command(flatten)]
        source: Source,
        #[arg(long, help = "Feed the last machine's output back into the first")]
        feedback: bool,
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        #[arg(help = "Phase values to try every ordering of")]
        #[arg(default_value = "0,1,2,3,4")]
        phases: Vec<i64>,
        #[arg(long, help = "Values each link can buffer [default: unbounded]")]
        link_capacity: Option<usize>,
    },
    /// Run a packet-switched network of machines until its monitor repeats itself
    Network {
        #[command(flatten)]
        source: Source,
        #[arg(short = 'n', long, default_value_t = 50, help = "Number of machines")]
        size: usize,
        #[arg(long, default_value_t = 255, help = "Address of the monitor")]
        monitor: i64,
    },
}

macro_rules! to_ascii_char {
    ($e: expr) => {{
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "in macro to make it explicit"
        )]
        {
            $e as u8 as char
        }
    }};
}

fn get_line() -> Result<Vec<i64>, AsciiError> {
    let mut buf = String::new();
    stdin().read_line(&mut buf).map_err(AsciiError::IoError)?;
    match buf.chars().find(|c| !c.is_ascii()) {
        None => Ok(buf.into_bytes().into_iter().map(i64::from).collect()),
        Some(bad_char) => Err(AsciiError::InvalidAsciiChar(bad_char)),
    }
}

/// Print ASCII output as text. Anything outside of ASCII is printed as a number on its own line.
fn print_ascii(intcode_output: Vec<i64>) -> Result<(), AsciiError> {
    let mut s = String::with_capacity(intcode_output.len());
    for i in intcode_output {
        match i {
            c @ 0..128 => s.push(to_ascii_char!(c)),
            n => s.push_str(&format!("{n}\n")),
        }
    }
    let mut out = stdout().lock();
    out.write_all(s.as_bytes()).and_then(|()| out.flush()).map_err(AsciiError::IoError)
}

fn interactive_run(mut interp: Interpreter) -> Result<(), AsciiError> {
    let (output, mut state) = interp.run_through_inputs(empty())?;
    print_ascii(output)?;
    while state != State::Halted {
        let line = get_line()?;
        if line.is_empty() {
            return Err(AsciiError::EndOfInput);
        }
        let (output, new_state) = interp.run_through_inputs(line)?;
        print_ascii(output)?;
        state = new_state;
    }
    Ok(())
}

fn run(program: &Program, input: Vec<i64>, trace: bool) -> Result<(), Box<dyn Error>> {
    let mut interp = program.interpreter();
    if trace {
        interp.start_trace();
    }
    let result = interp.run_through_inputs(input);
    if let Some(trace) = interp.end_trace() {
        eprint!("{trace}");
    }
    let (output, state) = result?;
    println!("{}", output.iter().map(i64::to_string).collect::<Vec<_>>().join(","));
    if state == State::Awaiting {
        return Err("program is still awaiting input".into());
    }
    Ok(())
}

fn init_logging() -> Result<(), Box<dyn Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(io::stderr);
    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;
    match Cli::parse().command {
        Command::Run {
            source,
            input,
            trace,
        } => run(&source.load()?, input, trace)?,
        Command::Ascii { source } => interactive_run(source.load()?.interpreter())?,
        Command::Amplify {
            source,
            feedback,
            phases,
            link_capacity,
        } => {
            let topology = if feedback {
                Topology::Ring
            } else {
                Topology::Chain
            };
            let config = PipelineConfig::default()
                .topology(topology)
                .link_capacity(link_capacity);
            let (best, signal) = Pipeline::new(source.load()?, config).best_signal(&phases, 0)?;
            println!("{signal} (phases {best:?})");
        }
        Command::Network {
            source,
            size,
            monitor,
        } => {
            let config = NetworkConfig::default().size(size).monitor_address(monitor);
            let report = Network::new(source.load()?, config).run()?;
            println!("first monitor packet: {:?}", report.first_monitor_packet);
            println!("repeated wake packet: {:?}", report.repeated_wake_packet);
        }
    }
    Ok(())
}

#[derive(Debug)]
pub enum AsciiError {
    IoError(io::Error),
    InvalidAsciiChar(char),
    EndOfInput,
    InterpreterError(InterpreterError),
}

impl Error for AsciiError {}
impl Display for AsciiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsciiError::IoError(e) => write!(f, "an I/O error occurred: {e}"),
            AsciiError::InvalidAsciiChar(c) => write!(f, "{c:?} is not a valid ASCII character"),
            AsciiError::EndOfInput => write!(f, "input ended while the program awaited more"),
            AsciiError::InterpreterError(e) => Display::fmt(e, f),
        }
    }
}

impl From<InterpreterError> for AsciiError {
    fn from(e: InterpreterError) -> Self {
        Self::InterpreterError(e)
    }
}
