// SPDX-FileCopyrightText: 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! A network of machines exchanging addressed packets
//!
//! Every machine runs the same program on its own thread, and is given its address as its first
//! input. Machines send packets as three consecutive outputs: a destination address, then `x`,
//! then `y`. A single router forwards `x` and `y` to the destination's input queue, or holds on to
//! packets sent to the monitor address.
//!
//! A machine asking for input while its queue is empty gets the idle input (`-1` by default)
//! instead, and that counts as an idle poll. Once every machine has idled for long enough with
//! nothing left to deliver, the router wakes address `0` with the last packet the monitor got. The
//! run ends when the monitor would deliver the same `y` twice in a row.
//!
//! Only the router thread reads or updates the idle and packet bookkeeping.

use std::error::Error;
use std::fmt::{self, Display};
use std::io;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::machine::{self, MachineResult};
use crate::ports::OutputSink;
use crate::program::Program;
use crate::InterpreterError;

/// Settings for a [Network]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NetworkConfig {
    /// Number of machines, addressed `0..size`
    pub size: usize,
    /// Address whose packets go to the monitor instead of a machine
    pub monitor_address: i64,
    /// Value a machine receives when it asks for input and none is queued
    pub idle_input: i64,
    /// How many consecutive idle polls each machine needs before the network counts as idle
    pub idle_threshold: u32,
    /// How long a machine waits for queued input before it's handed the idle input
    pub poll_interval: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            size: 50,
            monitor_address: 255,
            idle_input: -1,
            idle_threshold: 2,
            poll_interval: Duration::from_millis(1),
        }
    }
}

impl NetworkConfig {
    /// Set the number of machines
    #[must_use]
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Set the monitor address
    #[must_use]
    pub fn monitor_address(mut self, address: i64) -> Self {
        self.monitor_address = address;
        self
    }

    /// Set the idle input
    #[must_use]
    pub fn idle_input(mut self, value: i64) -> Self {
        self.idle_input = value;
        self
    }

    /// Set the idle threshold
    #[must_use]
    pub fn idle_threshold(mut self, polls: u32) -> Self {
        self.idle_threshold = polls;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn validate(&self) -> Result<(), NetworkError> {
        if self.size == 0 {
            return Err(NetworkError::InvalidConfig("size must be at least 1"));
        }
        if self.idle_threshold == 0 {
            return Err(NetworkError::InvalidConfig(
                "idle threshold must be at least 1",
            ));
        }
        if usize::try_from(self.monitor_address).is_ok_and(|a| a < self.size) {
            return Err(NetworkError::InvalidConfig(
                "monitor address collides with a machine address",
            ));
        }
        Ok(())
    }
}

/// The payload of a packet
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Packet {
    #[allow(missing_docs)]
    pub x: i64,
    #[allow(missing_docs)]
    pub y: i64,
}

/// What a [Network] observed before it settled
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct NetworkReport {
    /// The first packet ever sent to the monitor address
    pub first_monitor_packet: Packet,
    /// The monitor packet whose `y` was delivered to address `0` twice in a row
    pub repeated_wake_packet: Packet,
}

/// An error that stopped a [Network] before it settled
#[derive(Debug)]
pub enum NetworkError {
    /// The configuration can't describe a working network
    InvalidConfig(&'static str),
    /// A machine's thread couldn't be started
    Spawn(io::Error),
    /// A machine failed
    Machine {
        /// address of the failing machine
        address: usize,
        /// what went wrong
        source: InterpreterError,
    },
    /// A machine sent a packet to an address that's neither a machine nor the monitor
    Unroutable {
        /// address of the sender
        from: usize,
        /// the address it sent to
        destination: i64,
    },
    /// The network went idle before the monitor received anything, so nothing could wake it
    IdleWithoutMonitor,
    /// Every machine halted, or the machine to be woken had halted
    Stopped,
}

impl Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(why) => write!(f, "invalid network configuration: {why}"),
            Self::Spawn(e) => write!(f, "failed to start a machine: {e}"),
            Self::Machine { address, source } => write!(f, "machine {address} failed: {source}"),
            Self::Unroutable { from, destination } => {
                write!(f, "machine {from} sent a packet to unknown address {destination}")
            }
            Self::IdleWithoutMonitor => {
                write!(f, "network went idle before any packet reached the monitor")
            }
            Self::Stopped => write!(f, "machines halted before the network settled"),
        }
    }
}

impl Error for NetworkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::Machine { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for NetworkError {
    fn from(e: io::Error) -> Self {
        Self::Spawn(e)
    }
}

enum RouterMsg {
    Packet {
        from: usize,
        destination: i64,
        packet: Packet,
    },
    /// A machine polled an empty queue, having consumed `consumed` queued values so far
    Idle { from: usize, consumed: u64 },
}

/// A machine's input: its queue, or the idle input if nothing arrives in time
struct NicInput {
    id: usize,
    queue: Receiver<i64>,
    router: Sender<RouterMsg>,
    consumed: u64,
    idle_input: i64,
    poll_interval: Duration,
}

impl Iterator for NicInput {
    type Item = i64;
    fn next(&mut self) -> Option<i64> {
        match self.queue.recv_timeout(self.poll_interval) {
            Ok(value) => {
                self.consumed += 1;
                Some(value)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.router
                    .send(RouterMsg::Idle {
                        from: self.id,
                        consumed: self.consumed,
                    })
                    .ok()?;
                Some(self.idle_input)
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Groups a machine's output into packets for the router
struct NicSink {
    id: usize,
    router: Sender<RouterMsg>,
    pending: Vec<i64>,
}

impl OutputSink for NicSink {
    fn emit(&mut self, value: i64) -> Result<(), InterpreterError> {
        self.pending.push(value);
        if let [destination, x, y] = self.pending[..] {
            self.pending.clear();
            self.router
                .send(RouterMsg::Packet {
                    from: self.id,
                    destination,
                    packet: Packet { x, y },
                })
                .map_err(|_| InterpreterError::OutputDisconnected)?;
        }
        Ok(())
    }
}

/// Per-machine bookkeeping, owned by the router
struct Node {
    queue: Sender<i64>,
    handle: Option<JoinHandle<MachineResult>>,
    delivered: u64,
    idle_polls: u32,
    halted: bool,
}

impl Node {
    fn deliver(&mut self, packet: Packet) -> Result<(), NetworkError> {
        self.idle_polls = 0;
        self.delivered += 2;
        self.queue
            .send(packet.x)
            .and_then(|()| self.queue.send(packet.y))
            .map_err(|_| NetworkError::Stopped)
    }

    fn is_idle(&self, threshold: u32) -> bool {
        self.halted || (self.idle_polls >= threshold && self.queue.is_empty())
    }
}

/// A network of machines all running the same program
#[derive(Debug, Clone)]
pub struct Network {
    program: Program,
    config: NetworkConfig,
}

impl Network {
    /// Create a network running `program` on every machine
    pub fn new(program: Program, config: NetworkConfig) -> Self {
        Self { program, config }
    }

    /// Start every machine and route packets until the network settles.
    ///
    /// Machines still running afterwards are cut off from the router, and stop the next time
    /// they touch their input or output.
    pub fn run(&self) -> Result<NetworkReport, NetworkError> {
        self.config.validate()?;
        let (router_tx, router_rx) = unbounded();
        let mut nodes = Vec::with_capacity(self.config.size);
        for id in 0..self.config.size {
            let (queue_tx, queue_rx) = unbounded();
            // the address is the first thing every machine reads
            let _ = queue_tx.send(i64::try_from(id).unwrap_or(i64::MAX));
            let input = NicInput {
                id,
                queue: queue_rx,
                router: router_tx.clone(),
                consumed: 0,
                idle_input: self.config.idle_input,
                poll_interval: self.config.poll_interval,
            };
            let sink = NicSink {
                id,
                router: router_tx.clone(),
                pending: Vec::with_capacity(3),
            };
            let handle = machine::spawn_with(id, self.program.interpreter(), input, sink)?;
            nodes.push(Node {
                queue: queue_tx,
                handle: Some(handle),
                delivered: 1,
                idle_polls: 0,
                halted: false,
            });
        }
        drop(router_tx);
        tracing::debug!(size = self.config.size, "network started");
        Router {
            config: self.config,
            nodes,
            first_monitor: None,
            monitor: None,
            last_wake: None,
        }
        .route(&router_rx)
    }
}

struct Router {
    config: NetworkConfig,
    nodes: Vec<Node>,
    first_monitor: Option<Packet>,
    monitor: Option<Packet>,
    last_wake: Option<Packet>,
}

impl Router {
    fn route(mut self, inbox: &Receiver<RouterMsg>) -> Result<NetworkReport, NetworkError> {
        loop {
            match inbox.recv_timeout(self.config.poll_interval) {
                Ok(RouterMsg::Packet {
                    from,
                    destination,
                    packet,
                }) => self.forward(from, destination, packet)?,
                Ok(RouterMsg::Idle { from, consumed }) => {
                    let node = &mut self.nodes[from];
                    // polls made before the latest delivery was read don't count
                    if consumed == node.delivered {
                        node.idle_polls = node.idle_polls.saturating_add(1);
                    }
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => {
                    self.reap(true)?;
                    return Err(NetworkError::Stopped);
                }
            }
            self.reap(false)?;

            let threshold = self.config.idle_threshold;
            if self.nodes.iter().all(|n| n.is_idle(threshold)) {
                if self.nodes.iter().all(|n| n.halted) {
                    return Err(NetworkError::Stopped);
                }
                if let Some(report) = self.wake()? {
                    return Ok(report);
                }
            }
        }
    }

    fn forward(&mut self, from: usize, destination: i64, packet: Packet) -> Result<(), NetworkError> {
        self.nodes[from].idle_polls = 0;
        if destination == self.config.monitor_address {
            tracing::debug!(from, ?packet, "packet to monitor");
            self.first_monitor.get_or_insert(packet);
            self.monitor = Some(packet);
            return Ok(());
        }
        let node = usize::try_from(destination)
            .ok()
            .and_then(|d| self.nodes.get_mut(d))
            .ok_or(NetworkError::Unroutable { from, destination })?;
        tracing::trace!(from, destination, ?packet, "routing packet");
        node.deliver(packet)
    }

    /// Wake address 0 with the monitor's packet, or finish if that would repeat the last wake-up
    fn wake(&mut self) -> Result<Option<NetworkReport>, NetworkError> {
        let (Some(first), Some(packet)) = (self.first_monitor, self.monitor) else {
            return Err(NetworkError::IdleWithoutMonitor);
        };
        if self.last_wake.is_some_and(|last| last.y == packet.y) {
            tracing::debug!(?packet, "monitor repeated itself");
            return Ok(Some(NetworkReport {
                first_monitor_packet: first,
                repeated_wake_packet: packet,
            }));
        }
        tracing::debug!(?packet, "network idle, waking address 0");
        self.last_wake = Some(packet);
        self.nodes[0].deliver(packet)?;
        Ok(None)
    }

    /// Collect machines that stopped, failing if any stopped with an error of its own
    fn reap(&mut self, block: bool) -> Result<(), NetworkError> {
        for (address, node) in self.nodes.iter_mut().enumerate() {
            let finished = node
                .handle
                .as_ref()
                .is_some_and(|h| block || h.is_finished());
            if !finished {
                continue;
            }
            let Some(handle) = node.handle.take() else {
                continue;
            };
            let result = match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            };
            node.halted = true;
            match result {
                Err(source) if !source.is_disconnect() => {
                    return Err(NetworkError::Machine { address, source });
                }
                _ => tracing::debug!(address, "machine stopped"),
            }
        }
        Ok(())
    }
}
