//! TUI debugger for Reti programs.
//!
//! Provides an interactive terminal-based debugger with:
//! - Source view with the next instruction highlighted
//! - Registers in decimal and two's complement binary
//! - Sparse memory view
//! - Step/undo/auto-step controls and value editing

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
