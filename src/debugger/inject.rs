//! Manual edits of registers and memory cells between steps.
//!
//! Values are entered either as decimal integers or as two's complement
//! binary strings. A binary string is read at its own length, so `1011`
//! is -5 and `01011` is 11.

use super::Debugger;
use crate::cpu::Register;
use std::fmt;
use thiserror::Error;

/// Number format of an injected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Radix {
    #[default]
    Decimal,
    Binary,
}

/// The location an injected value is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Register(Register),
    Cell(u64),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Register(reg) => write!(f, "register '{}'", reg),
            Target::Cell(addr) => write!(f, "memory cell '{}'", addr),
        }
    }
}

impl Debugger {
    /// Parse `input` and write it into `reg`.
    pub fn inject_register(&mut self, reg: Register, input: &str, radix: Radix) -> Result<i64, InjectError> {
        let target = Target::Register(reg);
        let limits = self.cpu.limits;
        let value = parse_value(input, radix, target, limits.register_bits, limits.register_min(), limits.register_max())?;
        self.set_register(reg, value)?;
        Ok(value)
    }

    /// Parse `address` and `input` and write the value into memory.
    pub fn inject_memory(&mut self, address: &str, input: &str, radix: Radix) -> Result<(u64, i64), InjectError> {
        let addr = self.parse_address(address)?;
        let target = Target::Cell(addr);
        let limits = self.cpu.limits;
        let value = parse_value(input, radix, target, limits.cell_bits, limits.cell_min(), limits.cell_max())?;
        self.set_memory(addr, value)?;
        Ok((addr, value))
    }

    /// Write a register directly.
    ///
    /// The value must fit the register width, and PC must stay within
    /// `[0, len]`. Injection does not create an undo step.
    pub fn set_register(&mut self, reg: Register, value: i64) -> Result<(), InjectError> {
        if !self.cpu.isa.has_register(reg) {
            return Err(InjectError::UnknownRegister {
                register: reg,
                isa: self.cpu.isa.name(),
            });
        }
        check_range(Target::Register(reg), value, self.cpu.limits.register_min(), self.cpu.limits.register_max())?;
        if reg == Register::Pc && !(0..=self.cpu.max_pc as i64).contains(&value) {
            return Err(InjectError::PcOutOfRange { value, max: self.cpu.max_pc });
        }

        tracing::debug!(register = %reg, value, "register injected");
        self.cpu.regs.set(reg, value);
        Ok(())
    }

    /// Write a memory cell directly.
    pub fn set_memory(&mut self, addr: u64, value: i64) -> Result<(), InjectError> {
        let limits = self.cpu.limits;
        if !limits.address_fits(addr as i128) {
            return Err(InjectError::AddressOutOfRange {
                input: addr.to_string(),
                max: limits.max_address(),
            });
        }
        check_range(Target::Cell(addr), value, limits.cell_min(), limits.cell_max())?;

        tracing::debug!(address = addr, value, "memory injected");
        self.cpu.mem.write(addr, value);
        Ok(())
    }

    fn parse_address(&self, input: &str) -> Result<u64, InjectError> {
        let input = input.trim();
        let address: i128 = input.parse().map_err(|_| InjectError::InvalidAddress { input: input.into() })?;
        if !self.cpu.limits.address_fits(address) {
            return Err(InjectError::AddressOutOfRange {
                input: input.into(),
                max: self.cpu.limits.max_address(),
            });
        }
        Ok(address as u64)
    }
}

fn parse_value(input: &str, radix: Radix, target: Target, bits: u32, min: i64, max: i64) -> Result<i64, InjectError> {
    let input = input.trim();
    match radix {
        Radix::Decimal => {
            let value: i128 = input.parse().map_err(|_| InjectError::NotAnInteger {
                target,
                input: input.into(),
            })?;
            if value < min as i128 {
                return Err(InjectError::TooLow { target, input: input.into(), min });
            }
            if value > max as i128 {
                return Err(InjectError::TooHigh { target, input: input.into(), max });
            }
            Ok(value as i64)
        }
        Radix::Binary => parse_binary(input, bits).map_err(|err| match err {
            BinaryError::InvalidDigits(invalid) => InjectError::InvalidBinary {
                target,
                input: input.into(),
                invalid,
            },
            BinaryError::TooLong => InjectError::TooManyBits {
                target,
                input: input.into(),
                bits: input.len(),
                max: bits,
            },
        }),
    }
}

enum BinaryError {
    InvalidDigits(String),
    TooLong,
}

/// Decode a two's complement binary string at its own length.
fn parse_binary(input: &str, max_bits: u32) -> Result<i64, BinaryError> {
    let invalid: String = input.chars().filter(|c| !matches!(c, '0' | '1')).collect();
    if !invalid.is_empty() || input.is_empty() {
        return Err(BinaryError::InvalidDigits(invalid));
    }
    if input.len() > max_bits as usize {
        return Err(BinaryError::TooLong);
    }

    let len = input.len() as u32;
    let raw = input.bytes().fold(0u64, |acc, b| (acc << 1) | u64::from(b - b'0'));
    let sign_bit = 1u64 << (len - 1);
    let value = if raw & sign_bit != 0 {
        raw as i128 - (1i128 << len)
    } else {
        raw as i128
    };
    Ok(value as i64)
}

fn check_range(target: Target, value: i64, min: i64, max: i64) -> Result<(), InjectError> {
    if value < min {
        return Err(InjectError::TooLow { target, input: value.to_string(), min });
    }
    if value > max {
        return Err(InjectError::TooHigh { target, input: value.to_string(), max });
    }
    Ok(())
}

/// Errors for rejected manual edits. The edited location keeps its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    #[error("The string '{input}' inside {target} is invalid.")]
    NotAnInteger { target: Target, input: String },

    #[error("The number '{input}' inside {target} is lower than '{min}' and invalid.")]
    TooLow { target: Target, input: String, min: i64 },

    #[error("The number '{input}' inside {target} is higher than '{max}' and invalid.")]
    TooHigh { target: Target, input: String, max: i64 },

    #[error("The string '{input}' in {target} is not a valid binary number because it contains '{invalid}'.")]
    InvalidBinary { target: Target, input: String, invalid: String },

    #[error("The number '{input}' in {target} has too many bits (bits={bits}). It may only be {max} bits long.")]
    TooManyBits { target: Target, input: String, bits: usize, max: u32 },

    #[error("Program Counter must be in [0, {max}], not {value}.")]
    PcOutOfRange { value: i64, max: usize },

    #[error("The selector '{input}' for a memory cell is not a valid address.")]
    InvalidAddress { input: String },

    #[error("Memory address '{input}' is outside [0, {max}].")]
    AddressOutOfRange { input: String, max: u64 },

    #[error("Register {register} does not exist in the {isa} instruction set.")]
    UnknownRegister { register: Register, isa: &'static str },
}
