// SPDX-FileCopyrightText: 2025 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

//! Loading Intcode programs
//!
//! A [Program] is the immutable template that interpreters copy their starting memory from. It's
//! reference counted, so handing the same program to many machines doesn't copy it until each
//! machine builds its own memory.

use std::error::Error;
use std::fmt::{self, Display};
use std::num::ParseIntError;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::Arc;

use crate::Interpreter;

/// Byte order of a binary-encoded program
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Endian {
    /// least significant byte first
    Little,
    /// most significant byte first
    Big,
}

/// An error encountered while loading a [Program]
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ProgramError {
    /// A comma-separated item was not a valid decimal `i64`
    InvalidInt {
        /// zero-based position of the item
        index: usize,
        /// the item, after trimming
        token: String,
        /// why it failed to parse
        source: ParseIntError,
    },
    /// Binary input length wasn't a multiple of 8 bytes. Contains the leftover bytes.
    IncompleteInt(Box<[u8]>),
}

impl Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInt {
                index,
                token,
                source,
            } => write!(f, "item {index} ({token:?}) is not a valid integer: {source}"),
            Self::IncompleteInt(rem) => {
                write!(f, "expected 8 bytes, got {}: {:02x?}", rem.len(), rem)
            }
        }
    }
}

impl Error for ProgramError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInt { source, .. } => Some(source),
            Self::IncompleteInt(_) => None,
        }
    }
}

/// An immutable Intcode program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program(Arc<[i64]>);

impl Program {
    /// Parse comma-separated decimal integers. Whitespace around the whole text and around each
    /// item is ignored.
    ///
    /// # Example
    ///
    /// ```
    /// use intcode::program::Program;
    /// let program = Program::parse("1,0,0,0,99\n").unwrap();
    /// assert_eq!(&program[..], &[1, 0, 0, 0, 99]);
    /// assert!(Program::parse("1,x,3").is_err());
    /// ```
    pub fn parse(text: &str) -> Result<Self, ProgramError> {
        text.trim()
            .split(',')
            .map(str::trim)
            .enumerate()
            .map(|(index, token)| {
                token.parse().map_err(|source| ProgramError::InvalidInt {
                    index,
                    token: token.to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<i64>, _>>()
            .map(Self::from)
    }

    /// Decode a program stored as packed 64-bit integers
    pub fn from_bytes(bytes: &[u8], endian: Endian) -> Result<Self, ProgramError> {
        let (chunks, remainder) = bytes.as_chunks::<8>();
        if !remainder.is_empty() {
            return Err(ProgramError::IncompleteInt(Box::from(remainder)));
        }
        let decode = match endian {
            Endian::Little => i64::from_le_bytes,
            Endian::Big => i64::from_be_bytes,
        };
        Ok(chunks.iter().map(|c| decode(*c)).collect())
    }

    /// A fresh interpreter with its own copy of the program as its memory
    pub fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.0.iter().copied())
    }

    /// A fresh interpreter like [`Program::interpreter`], with at least `min_len` cells of memory
    /// allocated up front
    pub fn interpreter_with_memory(&self, min_len: usize) -> Interpreter {
        Interpreter::with_memory(self.0.iter().copied(), min_len)
    }

    /// The program's ints
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }
}

impl Deref for Program {
    type Target = [i64];
    fn deref(&self) -> &[i64] {
        &self.0
    }
}

impl FromStr for Program {
    type Err = ProgramError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<i64>> for Program {
    fn from(v: Vec<i64>) -> Self {
        Self(v.into())
    }
}

impl From<&[i64]> for Program {
    fn from(v: &[i64]) -> Self {
        Self(v.into())
    }
}

impl FromIterator<i64> for Program {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
