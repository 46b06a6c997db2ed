//! In-memory snapshot built from a manifest

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::manifest::{Manifest, ProcessEntry, VadEntry};
use super::{AddressSpace, Process, ProcessSource, RecordMaterializer, PAGE_SIZE};
use crate::core::types::{Address, VadError, VadResult};
use crate::vad::node::{ControlArea, VadNode};

/// Page-table backed address space over a shared physical buffer
#[derive(Debug, Clone)]
pub struct PagedAddressSpace {
    /// Virtual page base to physical page base
    pages: HashMap<u64, u64>,
    physical: Arc<[u8]>,
    page_size: u64,
}

impl PagedAddressSpace {
    pub fn new(pages: HashMap<u64, u64>, physical: Arc<[u8]>, page_size: u64) -> Self {
        PagedAddressSpace {
            pages,
            physical,
            page_size: page_size.max(1),
        }
    }
}

impl AddressSpace for PagedAddressSpace {
    fn translate(&self, vaddr: u64) -> Option<u64> {
        let within = vaddr % self.page_size;
        let base = self.pages.get(&(vaddr - within))?;
        base.checked_add(within)
    }

    fn read_physical(&self, paddr: u64, buf: &mut [u8]) -> usize {
        let Ok(start) = usize::try_from(paddr) else {
            return 0;
        };
        if start >= self.physical.len() {
            return 0;
        }
        let n = buf.len().min(self.physical.len() - start);
        buf[..n].copy_from_slice(&self.physical[start..start + n]);
        n
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }
}

/// A snapshot held entirely in memory
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    processes: Vec<ProcessEntry>,
    vads: HashMap<Address, VadEntry>,
    control_areas: HashMap<Address, ControlArea>,
    physical: Arc<[u8]>,
    page_size: u64,
}

impl MemorySnapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Builds a snapshot from a parsed manifest and raw physical bytes
    pub fn from_manifest(manifest: Manifest, physical: Vec<u8>) -> Self {
        let mut builder = SnapshotBuilder {
            page_size: manifest.page_size,
            physical,
            ..Default::default()
        };
        for process in manifest.processes {
            builder = builder.process(process);
        }
        for vad in manifest.vads {
            builder = builder.vad(vad);
        }
        for control_area in manifest.control_areas {
            builder = builder.control_area(control_area);
        }
        builder.build()
    }

    /// Loads a manifest file and the image it names
    pub fn open(path: impl AsRef<Path>) -> VadResult<Self> {
        let path = path.as_ref();
        let manifest = Manifest::load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let physical = match manifest.image_path(base) {
            Some(image) => fs::read(&image).map_err(|err| {
                VadError::Snapshot(format!("cannot read image {}: {}", image.display(), err))
            })?,
            None => Vec::new(),
        };

        info!(
            manifest = %path.display(),
            processes = manifest.processes.len(),
            vads = manifest.vads.len(),
            image_bytes = physical.len(),
            "Loaded snapshot"
        );
        Ok(Self::from_manifest(manifest, physical))
    }

    fn address_space(&self, entry: &ProcessEntry) -> PagedAddressSpace {
        let pages = entry
            .pages
            .iter()
            .map(|mapping| {
                let vaddr = mapping.vaddr.as_u64();
                (vaddr - vaddr % self.page_size, mapping.paddr.as_u64())
            })
            .collect();
        PagedAddressSpace::new(pages, Arc::clone(&self.physical), self.page_size)
    }
}

impl ProcessSource for MemorySnapshot {
    fn processes(&self) -> VadResult<Vec<Process>> {
        Ok(self
            .processes
            .iter()
            .map(|entry| Process {
                info: entry.info(),
                space: Arc::new(self.address_space(entry)),
            })
            .collect())
    }
}

impl RecordMaterializer for MemorySnapshot {
    fn materialize(&self, reference: Address) -> VadResult<VadNode> {
        let entry = self.vads.get(&reference).ok_or_else(|| {
            VadError::corrupt_node(reference, "no record at this address in the snapshot")
        })?;
        entry.to_node()
    }

    fn control_area(&self, reference: Address) -> VadResult<Option<ControlArea>> {
        if reference.is_null() {
            return Ok(None);
        }
        let control_area = self.control_areas.get(&reference).cloned();
        if control_area.is_none() {
            debug!(offset = %reference, "Control area not present in snapshot");
        }
        Ok(control_area)
    }
}

/// Incremental construction of a [`MemorySnapshot`]
#[derive(Debug)]
pub struct SnapshotBuilder {
    processes: Vec<ProcessEntry>,
    vads: HashMap<Address, VadEntry>,
    control_areas: HashMap<Address, ControlArea>,
    physical: Vec<u8>,
    page_size: u64,
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        SnapshotBuilder {
            processes: Vec::new(),
            vads: HashMap::new(),
            control_areas: HashMap::new(),
            physical: Vec::new(),
            page_size: PAGE_SIZE,
        }
    }
}

impl SnapshotBuilder {
    pub fn process(mut self, process: ProcessEntry) -> Self {
        self.processes.push(process);
        self
    }

    pub fn vad(mut self, vad: VadEntry) -> Self {
        self.vads.insert(vad.offset, vad);
        self
    }

    /// Inserts a record whose tag bytes are garbage
    pub fn corrupt_vad(self, offset: u64) -> Self {
        self.vad(VadEntry::short_modern(offset, 0, 0).tag("\u{0}\u{1}\u{2}\u{3}"))
    }

    pub fn control_area(mut self, control_area: ControlArea) -> Self {
        self.control_areas.insert(control_area.offset, control_area);
        self
    }

    pub fn physical(mut self, physical: Vec<u8>) -> Self {
        self.physical = physical;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn build(self) -> MemorySnapshot {
        MemorySnapshot {
            processes: self.processes,
            vads: self.vads,
            control_areas: self.control_areas,
            physical: Arc::from(self.physical),
            page_size: self.page_size.max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_is_corrupt() {
        let snapshot = MemorySnapshot::builder().build();
        let err = snapshot.materialize(Address::new(0x40)).unwrap_err();
        assert!(matches!(err, VadError::CorruptNode { offset: 0x40, .. }));
    }

    #[test]
    fn test_corrupt_vad_fails_materialization() {
        let snapshot = MemorySnapshot::builder().corrupt_vad(0x40).build();
        assert!(snapshot.materialize(Address::new(0x40)).is_err());
    }

    #[test]
    fn test_control_area_lookup() {
        let snapshot = MemorySnapshot::builder()
            .control_area(ControlArea {
                offset: Address::new(0xca00),
                segment: Address::new(0x5e00),
                dereference_list: Default::default(),
                number_of_section_references: 1,
                number_of_pfn_references: 2,
                number_of_mapped_views: 3,
                number_of_user_references: 4,
                waiting_for_deletion: Address::null(),
                flags: 0x80,
                file_object: None,
            })
            .build();

        assert!(snapshot.control_area(Address::null()).unwrap().is_none());
        assert!(snapshot.control_area(Address::new(0xbad0)).unwrap().is_none());
        let ca = snapshot.control_area(Address::new(0xca00)).unwrap().unwrap();
        assert_eq!(ca.number_of_mapped_views, 3);
    }

    #[test]
    fn test_process_address_space() {
        let snapshot = MemorySnapshot::builder()
            .process(
                ProcessEntry::new(8, "smss.exe", 0x8100_0000)
                    .vad_root(0x40)
                    .map_page(0x1000, 0x3000)
                    .map_page(0x8100_0000, 0x0),
            )
            .physical(vec![7u8; 0x4000])
            .build();

        let processes = snapshot.processes().unwrap();
        assert_eq!(processes.len(), 1);
        let process = &processes[0];
        assert_eq!(process.info.pid, 8);
        assert_eq!(process.space.translate(0x1010), Some(0x3010));
        assert_eq!(process.space.translate(0x8100_0000), Some(0));
        assert_eq!(process.space.translate(0x2000), None);

        let mut buf = [0u8; 4];
        assert_eq!(process.space.read_physical(0x3ffe, &mut buf), 2);
        assert_eq!(buf, [7, 7, 0, 0]);
    }

    #[test]
    fn test_open_resolves_relative_image() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("mem.raw"), vec![0x41u8; 0x1000]).unwrap();
        fs::write(
            dir.path().join("case.json"),
            r#"{"image": "mem.raw", "processes": [
                {"pid": 4, "name": "System", "offset": "0x1000", "pages": [{"vaddr": "0x1000", "paddr": "0x0"}]}
            ]}"#,
        )
        .unwrap();

        let snapshot = MemorySnapshot::open(dir.path().join("case.json")).unwrap();
        let processes = snapshot.processes().unwrap();
        let mut buf = [0u8; 2];
        processes[0].space.zread(0x1000, &mut buf);
        assert_eq!(buf, [0x41, 0x41]);
    }

    #[test]
    fn test_open_missing_image_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("case.json"), r#"{"image": "absent.raw"}"#).unwrap();
        let err = MemorySnapshot::open(dir.path().join("case.json")).unwrap_err();
        assert!(matches!(err, VadError::Snapshot(_)));
    }
}
