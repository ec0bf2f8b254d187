//! Debugger configuration.
//!
//! Settings come from an optional JSON file; every field is optional:
//!
//! ```json
//! {
//!   "isa": "minimal",
//!   "parser": { "case_sensitive": true },
//!   "limits": { "register_bits": 16, "cell_bits": 16 },
//!   "show_debug": true,
//!   "auto_step": "slow"
//! }
//! ```

use crate::asm::ParserConfig;
use crate::cpu::{InstructionSet, Limits, LimitsError};
use crate::debugger::AutoStep;
use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub isa: InstructionSet,
    pub parser: ParserConfig,
    pub limits: Limits,
    /// Show debug-only messages such as denied jumps.
    pub show_debug: bool,
    pub auto_step: AutoStep,
}

impl Config {
    /// Read and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_json(&content)?;
        tracing::debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content).map_err(|e| ConfigError::Malformed {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject widths the machine cannot represent and ambiguous syntax.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;

        let ParserConfig { comment_marker, terminator, .. } = self.parser;
        if comment_marker == terminator {
            return Err(ConfigError::SameMarker { marker: comment_marker });
        }
        for marker in [comment_marker, terminator] {
            if marker.is_whitespace() || marker.is_ascii_alphanumeric() || marker == '-' {
                return Err(ConfigError::InvalidMarker { marker });
            }
            // An inline comment strip must never split a mnemonic
            if let Some(opcode) = self.isa.opcodes().iter().find(|op| op.name.contains(marker)) {
                return Err(ConfigError::MarkerInMnemonic { marker, mnemonic: opcode.name });
            }
        }
        Ok(())
    }
}

/// Command line flags that take precedence over the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub isa: Option<InstructionSet>,
    pub no_terminator: bool,
    pub case_sensitive: bool,
    pub debug_messages: bool,
    pub auto_step: Option<AutoStep>,
}

impl Config {
    /// Apply command line flags. Flags only ever switch a setting on.
    pub fn merge(mut self, flags: Overrides) -> Self {
        if let Some(isa) = flags.isa {
            self.isa = isa;
        }
        if flags.no_terminator {
            self.parser.require_terminator = false;
        }
        if flags.case_sensitive {
            self.parser.case_sensitive = true;
        }
        if flags.debug_messages {
            self.show_debug = true;
        }
        if let Some(mode) = flags.auto_step {
            self.auto_step = mode;
        }
        self
    }
}

/// Errors that can occur while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unable to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("unable to decode config: {message}")]
    Malformed { message: String },

    #[error(transparent)]
    InvalidWidth(#[from] LimitsError),

    #[error("comment marker and terminator are both '{marker}'")]
    SameMarker { marker: char },

    #[error("'{marker}' cannot be used as comment marker or terminator")]
    InvalidMarker { marker: char },

    #[error("'{marker}' is part of the '{mnemonic}' opcode and cannot be used as comment marker or terminator")]
    MarkerInMnemonic { marker: char, mnemonic: &'static str },
}
