//! Program and memory loading for the Reti debugger.
//!
//! This module provides:
//! - A staged parser (program text → validated instruction list)
//! - A loader for initial memory files (JSON address → value maps)

pub mod parser;
pub mod memfile;

pub use parser::{parse_program, Instruction, ParseError, Parser, ParserConfig, Program, SourceLine};
pub use memfile::{load_memory, parse_memory, MemoryFileError};
