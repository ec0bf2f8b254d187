//! CPU emulation for the Reti machine.
//!
//! This module implements both Reti instruction sets:
//! - sparse memory addressed by 32-bit addresses, 32-bit cells
//! - 4 or 8 registers, one of which (PC) indexes the instruction list
//! - load/store/move, arithmetic and bitwise families, relative jumps

pub mod memory;
pub mod registers;
pub mod isa;
pub mod execute;

pub use memory::Memory;
pub use registers::{Limits, LimitsError, Register, Registers, format_binary, MAX_ADDRESS_BITS, MAX_VALUE_BITS};
pub use isa::{ArgKind, Argument, InstructionSet, Op, OpKind, Opcode};
pub use execute::{Cpu, CpuError, PcUpdate, Snapshot};
