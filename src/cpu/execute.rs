//! Reti execution engine.
//!
//! Applies one resolved [`Op`] to the machine state. The engine never
//! advances the program counter on its own: it reports a [`PcUpdate`] and
//! leaves the increment to the caller.

use crate::cpu::isa::{Addressing, AluFunc, InstructionSet, Op, Operand};
use crate::cpu::registers::{Limits, Register, Registers};
use crate::cpu::Memory;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Whether the program counter should move on after an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PcUpdate {
    /// Increment the program counter by one.
    Advance,
    /// The instruction set the program counter itself.
    Jumped,
}

/// Full copy of the machine state, used for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub regs: Registers,
    pub mem: Memory,
}

/// The Reti CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Active instruction set.
    pub isa: InstructionSet,
    /// Bit widths.
    pub limits: Limits,
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Number of instructions in the loaded program.
    pub max_pc: usize,
    /// One-shot message for the current step.
    message: Option<String>,
    /// One-shot debug-only message for the current step.
    debug_message: Option<String>,
}

impl Cpu {
    /// Create a CPU with zeroed registers and empty memory.
    ///
    /// `limits` must pass [`Limits::validate`]; range checks on wider or
    /// zero widths overflow.
    pub fn new(isa: InstructionSet, limits: Limits) -> Self {
        Self {
            isa,
            limits,
            regs: Registers::new(),
            mem: Memory::new(),
            max_pc: 0,
            message: None,
            debug_message: None,
        }
    }

    /// Create a CPU with pre-filled memory.
    pub fn with_memory(isa: InstructionSet, limits: Limits, mem: Memory) -> Self {
        Self { mem, ..Self::new(isa, limits) }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regs: self.regs,
            mem: self.mem.clone(),
        }
    }

    /// Replace the machine state with `snapshot`, dropping pending messages.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.regs = snapshot.regs;
        self.mem = snapshot.mem;
        self.message = None;
        self.debug_message = None;
    }

    /// Read and clear the step message.
    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    /// Read and clear the debug message.
    pub fn take_debug_message(&mut self) -> Option<String> {
        self.debug_message.take()
    }

    /// Execute a resolved operation.
    ///
    /// All checks happen before anything is written, so a failing
    /// operation leaves the state untouched.
    pub fn execute(&mut self, op: &Op) -> Result<PcUpdate, CpuError> {
        match *op {
            // ==================== Data Transfer ====================

            Op::Load { mode, dst, offset } => {
                let addr = self.address(mode, offset, op)?;
                let value = self.mem.read(addr);
                self.write_register(dst, value as i128, op)
            }

            Op::LoadImmediate { dst, value } => self.write_register(dst, value as i128, op),

            Op::Store { mode, src, offset } => {
                let addr = self.address(mode, offset, op)?;
                let value = self.regs.get(src);
                if !self.limits.cell_fits(value as i128) {
                    return Err(CpuError::MemoryValueOutOfRange { address: addr, value });
                }
                self.mem.write(addr, value);
                Ok(PcUpdate::Advance)
            }

            Op::Move { src, dst } => {
                let value = self.regs.get(src);
                self.write_register(dst, value as i128, op)
            }

            // ==================== Arithmetic ====================

            Op::Alu { func, dst, operand } => {
                let lhs = self.regs.get(dst);
                let rhs = match operand {
                    Operand::Memory(i) => {
                        let addr = self.address(Addressing::Direct, i, op)?;
                        self.mem.read(addr)
                    }
                    Operand::Immediate(i) => i,
                    Operand::Register(src) => self.regs.get(src),
                };
                let result = alu(func, lhs, rhs, op)?;
                self.write_register(dst, result, op)
            }

            // ==================== Control Flow ====================

            Op::Jump { cond, offset } => {
                let acc = self.regs.acc();
                if cond.holds(acc) {
                    self.jump(offset)
                } else {
                    self.debug_message = Some(format!(
                        "Jump denied. Condition ACC {} 0 not met. ACC is {}",
                        cond.symbol(),
                        acc
                    ));
                    Ok(PcUpdate::Advance)
                }
            }

            Op::Nop => Ok(PcUpdate::Advance),
        }
    }

    /// Move the program counter by a signed offset.
    ///
    /// The target may equal `max_pc` (one past the last instruction); the
    /// controller reports that as running off the end of the program.
    pub fn jump(&mut self, offset: i64) -> Result<PcUpdate, CpuError> {
        let old = self.regs.pc();
        let new = old as i128 + offset as i128;
        self.check_pc(old, new)?;
        self.regs.set(Register::Pc, new as i64);
        self.debug_message = Some(format!("Jump granted. PC was PC={} and is now PC={}", old, new));
        Ok(PcUpdate::Jumped)
    }

    fn check_pc(&self, old: i64, new: i128) -> Result<(), CpuError> {
        if new < 0 {
            return Err(CpuError::NegativePc { old, new });
        }
        if new > self.max_pc as i128 {
            return Err(CpuError::PcOverflow { old, new, max: self.max_pc });
        }
        Ok(())
    }

    /// Validate and write a computed register value.
    fn write_register(&mut self, reg: Register, value: i128, op: &Op) -> Result<PcUpdate, CpuError> {
        if !self.limits.register_fits(value) {
            return Err(CpuError::RegisterOverflow {
                register: reg,
                operation: op.describe(),
            });
        }

        if reg != Register::Pc {
            self.regs.set(reg, value as i64);
            return Ok(PcUpdate::Advance);
        }

        // Writing PC directly is an implicit jump.
        let old = self.regs.pc();
        self.check_pc(old, value)?;
        self.regs.set(Register::Pc, value as i64);
        self.message = Some(format!("PC set directly to {} by {}.", value, op.describe()));
        Ok(PcUpdate::Jumped)
    }

    /// Compute and validate an effective address.
    fn address(&self, mode: Addressing, offset: i64, op: &Op) -> Result<u64, CpuError> {
        let base = match mode {
            Addressing::Direct => 0,
            Addressing::Indexed(reg) => self.regs.get(reg),
        };
        let address = base as i128 + offset as i128;
        if !self.limits.address_fits(address) {
            return Err(CpuError::MemoryAddressOutOfRange {
                address,
                operation: op.describe(),
            });
        }
        Ok(address as u64)
    }

    /// Check if the program counter points past the last instruction.
    pub fn at_end(&self) -> bool {
        self.regs.pc() >= self.max_pc as i64
    }
}

/// Apply an arithmetic function. Results are computed wide and checked
/// against the register width by the caller.
fn alu(func: AluFunc, lhs: i64, rhs: i64, op: &Op) -> Result<i128, CpuError> {
    let (l, r) = (lhs as i128, rhs as i128);
    let result = match func {
        AluFunc::Add => l + r,
        AluFunc::Sub => l - r,
        AluFunc::Mul => l * r,
        AluFunc::Div => {
            if r == 0 {
                return Err(CpuError::DivisionByZero { operation: op.describe() });
            }
            // Truncates toward zero.
            l / r
        }
        AluFunc::Mod => {
            if r == 0 {
                return Err(CpuError::DivisionByZero { operation: op.describe() });
            }
            floored_mod(l, r)
        }
        AluFunc::Xor => (lhs ^ rhs) as i128,
        AluFunc::And => (lhs & rhs) as i128,
        AluFunc::Or => (lhs | rhs) as i128,
    };
    Ok(result)
}

/// Modulo whose result takes the sign of the divisor (`-7 mod 3 == 2`,
/// `7 mod -3 == -2`).
fn floored_mod(l: i128, r: i128) -> i128 {
    let m = l % r;
    if m != 0 && (m < 0) != (r < 0) {
        m + r
    } else {
        m
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(InstructionSet::default(), Limits::default())
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("isa", &self.isa)
            .field("max_pc", &self.max_pc)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Errors that can occur while executing an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("Runtime Error: Register {register} out of range after {operation}.")]
    RegisterOverflow { register: Register, operation: String },

    #[error("Runtime Error: Memory Address {address} out of range in {operation}.")]
    MemoryAddressOutOfRange { address: i128, operation: String },

    #[error("Runtime Error: Value {value} does not fit into memory cell {address}.")]
    MemoryValueOutOfRange { address: u64, value: i64 },

    #[error("The jump decreases the program counter too much (negative PC). PC_new={new}, PC_old={old}")]
    NegativePc { old: i64, new: i128 },

    #[error("The jump increases the program counter too much, there is no instruction for the new PC. PC_new={new}, PC_old={old}, max={max}")]
    PcOverflow { old: i64, new: i128, max: usize },

    #[error("Runtime Error: division by zero in {operation}.")]
    DivisionByZero { operation: String },
}
