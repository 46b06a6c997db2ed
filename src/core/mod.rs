//! Core module containing fundamental types for vadscope
//!
//! This module provides the foundational building blocks used throughout
//! the crate: address handling, process information and error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{Address, ProcessId, ProcessInfo, VadError, VadResult};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
