//! Core type definitions for vadscope
//!
//! This module contains the fundamental types shared by the walker, the
//! inspector and the extractor: snapshot addresses, process descriptions and
//! the error type.

mod address;
mod error;
mod process_info;

// Re-export all public types
pub use address::Address;
pub use error::{VadError, VadResult};
pub use process_info::ProcessInfo;

// Common type aliases
pub type ProcessId = u32;
