//! Reti register file.
//!
//! The extended instruction set has 8 registers:
//! - ACC: accumulator, the register conditional jumps test
//! - IN1, IN2: index registers for offset addressing
//! - PC: program counter (index into the instruction list)
//! - SP, BAF, DS, CS: stack pointer, frame base, data and code segment
//!
//! The minimal instruction set only has ACC, IN1, IN2 and PC.

use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

/// Widest supported register, cell or immediate.
pub const MAX_VALUE_BITS: u32 = 63;
/// Widest supported address.
pub const MAX_ADDRESS_BITS: u32 = 62;

/// A register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Register {
    Acc,
    In1,
    In2,
    Pc,
    Sp,
    Baf,
    Ds,
    Cs,
}

impl Register {
    /// Number of register slots in a [`Registers`].
    pub const COUNT: usize = 8;

    /// All registers, in display order.
    pub const ALL: [Register; Self::COUNT] = [
        Register::Acc,
        Register::In1,
        Register::In2,
        Register::Pc,
        Register::Sp,
        Register::Baf,
        Register::Ds,
        Register::Cs,
    ];

    /// Assembly name of the register.
    pub const fn name(self) -> &'static str {
        match self {
            Register::Acc => "ACC",
            Register::In1 => "IN1",
            Register::In2 => "IN2",
            Register::Pc => "PC",
            Register::Sp => "SP",
            Register::Baf => "BAF",
            Register::Ds => "DS",
            Register::Cs => "CS",
        }
    }

    /// Slot of the register inside a [`Registers`].
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit widths of the machine.
///
/// All widths describe two's complement values except `address_bits`,
/// which bounds addresses to `[0, 2^address_bits]`.
///
/// The range accessors assume widths that pass [`Limits::validate`].
/// Build limits with [`Limits::new`] unless they come from `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Width R of every register.
    pub register_bits: u32,
    /// Width A of a memory address.
    pub address_bits: u32,
    /// Width M of a memory cell.
    pub cell_bits: u32,
    /// Width I of an immediate in program text.
    pub immediate_bits: u32,
}

impl Limits {
    /// Create limits from the register, address, cell and immediate widths.
    pub fn new(register_bits: u32, address_bits: u32, cell_bits: u32, immediate_bits: u32) -> Result<Self, LimitsError> {
        let limits = Self { register_bits, address_bits, cell_bits, immediate_bits };
        limits.validate()?;
        Ok(limits)
    }

    /// Reject widths whose ranges do not fit in `i64`/`u64`.
    pub fn validate(&self) -> Result<(), LimitsError> {
        let widths = [
            ("register_bits", self.register_bits, MAX_VALUE_BITS),
            ("cell_bits", self.cell_bits, MAX_VALUE_BITS),
            ("immediate_bits", self.immediate_bits, MAX_VALUE_BITS),
            ("address_bits", self.address_bits, MAX_ADDRESS_BITS),
        ];
        for (field, bits, max) in widths {
            if bits == 0 || bits > max {
                return Err(LimitsError { field, bits, max });
            }
        }
        Ok(())
    }

    pub const fn register_min(&self) -> i64 {
        signed_min(self.register_bits)
    }

    pub const fn register_max(&self) -> i64 {
        signed_max(self.register_bits)
    }

    pub const fn cell_min(&self) -> i64 {
        signed_min(self.cell_bits)
    }

    pub const fn cell_max(&self) -> i64 {
        signed_max(self.cell_bits)
    }

    pub const fn immediate_min(&self) -> i64 {
        signed_min(self.immediate_bits)
    }

    pub const fn immediate_max(&self) -> i64 {
        signed_max(self.immediate_bits)
    }

    /// Largest valid memory address (inclusive).
    pub const fn max_address(&self) -> u64 {
        1u64 << self.address_bits
    }

    pub fn register_fits(&self, value: i128) -> bool {
        (self.register_min() as i128..=self.register_max() as i128).contains(&value)
    }

    pub fn cell_fits(&self, value: i128) -> bool {
        (self.cell_min() as i128..=self.cell_max() as i128).contains(&value)
    }

    pub fn address_fits(&self, address: i128) -> bool {
        (0..=self.max_address() as i128).contains(&address)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            register_bits: 32,
            address_bits: 32,
            cell_bits: 32,
            immediate_bits: 22,
        }
    }
}

/// A bit width outside the supported range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{field} must be between 1 and {max}, got {bits}")]
pub struct LimitsError {
    pub field: &'static str,
    pub bits: u32,
    pub max: u32,
}

const fn signed_min(bits: u32) -> i64 {
    -(1i64 << (bits - 1))
}

const fn signed_max(bits: u32) -> i64 {
    (1i64 << (bits - 1)) - 1
}

/// Render `value` as a `bits` wide two's complement binary string.
pub fn format_binary(value: i64, bits: u32) -> String {
    let mask = if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 };
    format!("{:0width$b}", (value as u64) & mask, width = bits as usize)
}

/// The Reti register file.
///
/// Every variant uses the same 8 slots; registers a variant does not
/// define simply stay at zero because the parser never names them.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    values: [i64; Register::COUNT],
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, reg: Register) -> i64 {
        self.values[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: i64) {
        self.values[reg.index()] = value;
    }

    /// The program counter.
    #[inline]
    pub fn pc(&self) -> i64 {
        self.get(Register::Pc)
    }

    /// The accumulator.
    #[inline]
    pub fn acc(&self) -> i64 {
        self.get(Register::Acc)
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> i64 {
        let old = self.pc();
        self.set(Register::Pc, old + 1);
        old
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for reg in Register::ALL {
            map.entry(&reg.name(), &self.get(reg));
        }
        map.finish()
    }
}
