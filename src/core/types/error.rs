//! Error types for VAD inspection and extraction

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for snapshot analysis
///
/// Per-node and per-process variants are local failures: callers report them
/// and carry on with the next node or process. Only [`VadError::Config`] is
/// meant to stop a whole run.
#[derive(Error, Debug)]
pub enum VadError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Corrupt VAD node at {offset:#x}: {reason}")]
    CorruptNode { offset: u64, reason: String },

    #[error("Process {pid} does not have a valid address space")]
    NoAddressSpace { pid: u32 },

    #[error("VAD node at {offset:#x} has unrecognized tag {tag:?} and is not dumped")]
    BadTag { offset: u64, tag: String },

    #[error("VAD node at {offset:#x} has an invalid range {start:#x}-{end:#x}")]
    InvalidRange { offset: u64, start: u64, end: u64 },

    #[error("Region {start:#x}-{end:#x} of process {pid} is {size} bytes, above the {limit} byte limit")]
    RegionTooLarge {
        pid: u32,
        start: u64,
        end: u64,
        size: u64,
        limit: u64,
    },

    #[error("Failed to write dump {path} for process {pid}: {source}")]
    WriteFailed {
        pid: u32,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for VAD operations
pub type VadResult<T> = Result<T, VadError>;

impl VadError {
    /// Creates a corrupt node error
    pub fn corrupt_node(offset: impl Into<u64>, reason: impl fmt::Display) -> Self {
        VadError::CorruptNode {
            offset: offset.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an unresolved address space error for a process
    pub fn no_address_space(pid: u32) -> Self {
        VadError::NoAddressSpace { pid }
    }

    /// Creates a dump write failure
    pub fn write_failed(pid: u32, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VadError::WriteFailed {
            pid,
            path: path.into(),
            source,
        }
    }

    /// Whether this error should stop the whole run rather than a single
    /// node or process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VadError::Config(_))
    }
}
