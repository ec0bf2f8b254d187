//! Initial memory files.
//!
//! A memory file is a JSON object mapping addresses to cell values.
//! Keys are strings because JSON requires it:
//!
//! ```json
//! { "0": 50, "1": 3, "30": 15, "4": 11 }
//! ```

use crate::cpu::{Limits, Memory};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

const EXAMPLE: &str = r#"{ "0": 50, "1": 3, "30": 15, "4": 11 }"#;

/// Load a memory file from disk.
///
/// No path means memory starts empty (every cell reads 0).
pub fn load_memory<P: AsRef<Path>>(path: Option<P>, limits: &Limits) -> Result<(Memory, String), MemoryFileError> {
    let Some(path) = path else {
        return Ok((
            Memory::new(),
            "No memory file given. Memory starts empty (every cell reads 0).".into(),
        ));
    };
    let path = path.as_ref();

    let content = std::fs::read_to_string(path).map_err(|e| MemoryFileError::IoError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mem = parse_memory(&content, limits)?;
    let status = format!("Memory initialized with {} cells from {}.", mem.len(), path.display());
    Ok((mem, status))
}

/// Parse the JSON content of a memory file.
pub fn parse_memory(content: &str, limits: &Limits) -> Result<Memory, MemoryFileError> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(content).map_err(|e| {
        tracing::warn!(error = %e, "memory file is not a JSON object");
        MemoryFileError::Malformed {
            message: e.to_string(),
            example: EXAMPLE,
        }
    })?;

    let mut cells = BTreeMap::new();
    let mut keys: BTreeMap<u64, String> = BTreeMap::new();
    for (key, value) in raw {
        let address: i128 = key
            .trim()
            .parse()
            .map_err(|_| MemoryFileError::InvalidKey { key: key.clone() })?;
        if !limits.address_fits(address) {
            return Err(MemoryFileError::AddressOutOfRange {
                address: key,
                max: limits.max_address(),
            });
        }
        let address = address as u64;
        if let Some(first) = keys.insert(address, key.clone()) {
            return Err(MemoryFileError::DuplicateAddress { address, first, second: key });
        }

        let value = value.as_i64().ok_or_else(|| MemoryFileError::InvalidValue {
            address: key.clone(),
            value: value.to_string(),
        })?;
        if !limits.cell_fits(value as i128) {
            return Err(MemoryFileError::ValueOutOfRange {
                address: key,
                value,
                min: limits.cell_min(),
                max: limits.cell_max(),
            });
        }

        cells.insert(address, value);
    }

    Ok(Memory::from_cells(cells))
}

/// Errors that can occur while loading a memory file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryFileError {
    #[error("unable to read {path}: {message}")]
    IoError { path: String, message: String },

    #[error("unable to decode memory file ({message}). Expected a JSON object such as:\n{example}")]
    Malformed { message: String, example: &'static str },

    #[error("memory address '{key}' is not an integer")]
    InvalidKey { key: String },

    #[error("memory address {address} is outside [0, {max}]")]
    AddressOutOfRange { address: String, max: u64 },

    #[error("memory keys '{first}' and '{second}' both name address {address}")]
    DuplicateAddress { address: u64, first: String, second: String },

    #[error("value {value} at memory address {address} is not an integer")]
    InvalidValue { address: String, value: String },

    #[error("value {value} at memory address {address} is outside [{min}, {max}]")]
    ValueOutOfRange { address: String, value: i64, min: i64, max: i64 },
}
