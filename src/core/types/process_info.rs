//! Process information types

use serde::{Deserialize, Serialize};

use super::{Address, ProcessId};

/// A process as recovered from the snapshot's process list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    /// Image file name as stored in the process control block
    pub name: String,
    /// Virtual address of the process control block
    pub offset: Address,
    /// Root of the VAD tree; `None` when the root pointer is null
    #[serde(default)]
    pub vad_root: Option<Address>,
}

impl ProcessInfo {
    /// Creates a new ProcessInfo
    pub fn new(pid: ProcessId, name: impl Into<String>, offset: Address) -> Self {
        ProcessInfo {
            pid,
            name: name.into(),
            offset,
            vad_root: None,
        }
    }

    /// Sets the VAD root, treating a null pointer as absent
    pub fn with_vad_root(mut self, root: Address) -> Self {
        self.vad_root = root.non_null();
        self
    }

    /// Case-insensitive image name match
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}
