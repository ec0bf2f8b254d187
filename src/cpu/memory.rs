//! Reti memory subsystem.
//!
//! Memory is sparse: only cells that were written (or loaded from a
//! memory file) are stored, every other address reads as 0.

use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Sparse Reti memory, ordered by address.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: BTreeMap<u64, i64>,
}

impl Memory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory pre-filled with `cells`.
    pub fn from_cells(cells: BTreeMap<u64, i64>) -> Self {
        Self { cells }
    }

    /// Read a cell. Unassigned addresses read as 0.
    #[inline]
    pub fn read(&self, addr: u64) -> i64 {
        self.cells.get(&addr).copied().unwrap_or(0)
    }

    /// Write a cell.
    #[inline]
    pub fn write(&mut self, addr: u64, value: i64) {
        self.cells.insert(addr, value);
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Stored cells in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, i64)> + '_ {
        self.cells.iter().map(|(&addr, &value)| (addr, value))
    }

    /// Dump up to `count` stored cells starting at address `start`.
    pub fn dump(&self, start: u64, count: usize) -> Vec<(u64, i64)> {
        self.cells
            .range(start..)
            .take(count)
            .map(|(&addr, &value)| (addr, value))
            .collect()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.cells.iter()).finish()
    }
}

impl std::fmt::Display for Memory {
    /// `{}` for empty memory, otherwise `addr: value` pairs by address.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cells.is_empty() {
            return f.write_str("{}");
        }
        for (i, (addr, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", addr, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 42);
        assert_eq!(mem.read(10), 42);
        assert_eq!(mem.len(), 1);
    }

    #[test]
    fn test_unwritten_reads_zero() {
        let mem = Memory::new();
        assert_eq!(mem.read(0), 0);
        assert_eq!(mem.read(1 << 32), 0);
        assert!(mem.is_empty());
    }

    #[test]
    fn test_dump_is_ordered() {
        let mut mem = Memory::new();
        mem.write(30, 15);
        mem.write(0, 50);
        mem.write(4, 11);

        assert_eq!(mem.dump(0, 10), vec![(0, 50), (4, 11), (30, 15)]);
        assert_eq!(mem.dump(1, 1), vec![(4, 11)]);
    }

    #[test]
    fn test_display() {
        let mut mem = Memory::new();
        assert_eq!(mem.to_string(), "{}");

        mem.write(3, -5);
        mem.write(1, 20);
        assert_eq!(mem.to_string(), "1: 20, 3: -5");
    }
}
