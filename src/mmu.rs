// SPDX-FileCopyrightText: 2025 - 2026 Eli Array Minkoff
//
// SPDX-License-Identifier: 0BSD

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

/// Dense, zero-extended memory for a single interpreter.
///
/// Cells past the end of the buffer read as `0`. Writing to them, or asking for a [cell] there,
/// extends the buffer with zeroes up to and including the requested address. Existing cells are
/// never moved or truncated.
///
/// [cell]: IntcodeMem::cell
#[derive(Clone, Default)]
pub(super) struct IntcodeMem {
    cells: Vec<i64>,
}

impl IntcodeMem {
    /// Number of cells currently backed by the buffer
    pub(super) fn len(&self) -> usize {
        self.cells.len()
    }

    /// Zero-fill the buffer so that it holds at least `len` cells
    pub(super) fn reserve_zeroed(&mut self, len: usize) {
        if len > self.cells.len() {
            self.cells.resize(len, 0);
        }
    }

    /// Read `address`, treating unbacked cells as `0`
    pub(super) fn get(&self, address: usize) -> i64 {
        self.cells.get(address).copied().unwrap_or_default()
    }

    /// Grow the buffer if needed, then return the slot at `address`
    pub(super) fn cell(&mut self, address: usize) -> &mut i64 {
        if address >= self.cells.len() {
            self.cells.resize(address + 1, 0);
        }
        &mut self.cells[address]
    }

    /// The cells in `range`, borrowed if they're all backed, otherwise copied with the unbacked
    /// part filled with zeroes. Never grows the buffer.
    pub(super) fn get_range(&self, range: Range<usize>) -> Cow<'_, [i64]> {
        if range.end <= self.cells.len() {
            return Cow::Borrowed(&self.cells[range]);
        }
        let backed = self.cells.get(range.start..).unwrap_or_default();
        let mut v = Vec::with_capacity(range.len());
        v.extend_from_slice(backed);
        v.resize(range.len(), 0);
        Cow::Owned(v)
    }

    pub(super) fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    /// The buffer without any trailing zero cells
    fn significant(&self) -> &[i64] {
        let end = self.cells.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1);
        &self.cells[..end]
    }
}

// growth only ever appends zeroes, so trailing zeroes don't affect equality
impl PartialEq for IntcodeMem {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl FromIterator<i64> for IntcodeMem {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

impl std::ops::Index<usize> for IntcodeMem {
    type Output = i64;
    fn index(&self, i: usize) -> &i64 {
        self.cells.get(i).unwrap_or(&0)
    }
}

impl std::ops::IndexMut<usize> for IntcodeMem {
    fn index_mut(&mut self, i: usize) -> &mut i64 {
        self.cell(i)
    }
}

impl IntoIterator for IntcodeMem {
    type Item = i64;
    type IntoIter = std::vec::IntoIter<i64>;
    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl fmt::Debug for IntcodeMem {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let significant = self.significant();
        fmt.debug_struct("IntcodeMem")
            .field("len", &self.len())
            .field("cells", &significant)
            .finish()
    }
}
