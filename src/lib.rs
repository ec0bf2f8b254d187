//! # Reti Debugger
//!
//! A step debugger for the Reti register machine, the teaching processor of
//! the "Technische Informatik" and "Betriebssysteme" lectures.
//!
//! Programs are parsed against one of two instruction sets (a minimal
//! 4-register machine and an extended 8-register one), then executed one
//! instruction at a time. Every step can be undone, a failing instruction
//! rolls the machine back, and registers and memory can be edited in
//! between steps.

pub mod cpu;
pub mod asm;
pub mod debugger;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, InstructionSet, Limits, LimitsError, Memory, Op, Register, Registers};
pub use asm::{load_memory, parse_program, MemoryFileError, ParseError, ParserConfig, Program};
pub use debugger::{AutoStep, Debugger, InjectError, IsaMismatch, Outcome, RunState, StepReport, Termination};
pub use config::{Config, ConfigError, Overrides};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
