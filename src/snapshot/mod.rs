//! Services consumed from the snapshot layer
//!
//! Image parsing, profile resolution, and virtual-to-physical translation are
//! provided by collaborators behind these traits. [`MemorySnapshot`] is an
//! in-memory implementation fed by a JSON manifest, used by the command line
//! front end and the tests.

mod manifest;
mod memory;

pub use manifest::{LongEntry, Manifest, PageMapping, ProcessEntry, VadEntry, VadFlagsEntry};
pub use memory::{MemorySnapshot, PagedAddressSpace, SnapshotBuilder};

use std::sync::Arc;

use crate::core::types::{Address, ProcessId, ProcessInfo, VadResult};
use crate::vad::node::{ControlArea, VadNode};

/// Default page size of the analyzed architecture
pub const PAGE_SIZE: u64 = 0x1000;

/// Translation and reads through one process's virtual address space
pub trait AddressSpace: Send + Sync {
    /// Translates a virtual address to a physical offset in the image
    fn translate(&self, vaddr: u64) -> Option<u64>;

    /// Reads physical bytes into `buf`, returning how many were available
    fn read_physical(&self, paddr: u64, buf: &mut [u8]) -> usize;

    fn page_size(&self) -> u64 {
        PAGE_SIZE
    }

    /// Fills `buf` from `vaddr`. Bytes on pages that do not translate, or
    /// that the image cannot supply, read as zero.
    fn zread(&self, vaddr: u64, buf: &mut [u8]) {
        buf.fill(0);
        let page_size = self.page_size().max(1);
        let mut done = 0usize;

        while done < buf.len() {
            let Some(current) = vaddr.checked_add(done as u64) else {
                break;
            };
            let in_page = page_size - current % page_size;
            let chunk = (buf.len() - done).min(usize::try_from(in_page).unwrap_or(usize::MAX));

            if let Some(paddr) = self.translate(current) {
                self.read_physical(paddr, &mut buf[done..done + chunk]);
            }
            done += chunk;
        }
    }
}

/// Turns tree references into typed records
pub trait RecordMaterializer: Send + Sync {
    /// Reads the VAD at `reference`. Fails with
    /// [`VadError::CorruptNode`](crate::VadError::CorruptNode) when the record
    /// does not look like a VAD.
    fn materialize(&self, reference: Address) -> VadResult<VadNode>;

    /// Reads the control area at `reference`, `Ok(None)` when it cannot be
    /// resolved.
    fn control_area(&self, reference: Address) -> VadResult<Option<ControlArea>>;
}

/// A process together with its address space
#[derive(Clone)]
pub struct Process {
    pub info: ProcessInfo,
    pub space: Arc<dyn AddressSpace>,
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process").field("info", &self.info).finish()
    }
}

/// Enumerates the processes found in the snapshot
pub trait ProcessSource {
    fn processes(&self) -> VadResult<Vec<Process>>;
}

/// Restricts analysis to selected processes. An empty filter keeps all.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    pub pids: Vec<ProcessId>,
    pub name: Option<String>,
}

impl ProcessFilter {
    pub fn matches(&self, info: &ProcessInfo) -> bool {
        let pid_ok = self.pids.is_empty() || self.pids.contains(&info.pid);
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |name| info.name_matches(name));
        pid_ok && name_ok
    }

    pub fn apply(&self, processes: Vec<Process>) -> Vec<Process> {
        processes
            .into_iter()
            .filter(|process| self.matches(&process.info))
            .collect()
    }
}
