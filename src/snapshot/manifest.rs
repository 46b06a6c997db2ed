//! JSON manifest describing a pre-parsed snapshot
//!
//! The manifest carries the output of the external collaborators: the process
//! list, materialized VAD records, control areas, and per-process page
//! mappings. Physical bytes come from a raw image file next to it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::types::{Address, ProcessId, ProcessInfo, VadError, VadResult};
use crate::vad::flags::Protection;
use crate::vad::node::{
    BaseFlags, ControlArea, LegacyTypeFlags, LegacyVadFlags, LongFields, ModernVadFlags, TagClass,
    VadNode, VadRecord, VadTag,
};

/// Top-level manifest document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Raw physical image, relative to the manifest's directory
    #[serde(default)]
    pub image: Option<PathBuf>,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    #[serde(default)]
    pub processes: Vec<ProcessEntry>,
    #[serde(default)]
    pub vads: Vec<VadEntry>,
    #[serde(default)]
    pub control_areas: Vec<ControlArea>,
}

fn default_page_size() -> u64 {
    super::PAGE_SIZE
}

impl Manifest {
    /// Reads a manifest from disk
    pub fn load(path: impl AsRef<Path>) -> VadResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Image path resolved against `base`
    pub fn image_path(&self, base: &Path) -> Option<PathBuf> {
        self.image.as_ref().map(|image| {
            if image.is_absolute() {
                image.clone()
            } else {
                base.join(image)
            }
        })
    }
}

/// One virtual page mapped onto the physical image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMapping {
    pub vaddr: Address,
    pub paddr: Address,
}

/// A process from the process list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: ProcessId,
    pub name: String,
    /// Virtual address of the process control block
    pub offset: Address,
    #[serde(default)]
    pub vad_root: Option<Address>,
    #[serde(default)]
    pub pages: Vec<PageMapping>,
}

impl ProcessEntry {
    pub fn new(pid: ProcessId, name: impl Into<String>, offset: u64) -> Self {
        ProcessEntry {
            pid,
            name: name.into(),
            offset: Address::new(offset),
            vad_root: None,
            pages: Vec::new(),
        }
    }

    pub fn vad_root(mut self, root: u64) -> Self {
        self.vad_root = Address::new(root).non_null();
        self
    }

    pub fn map_page(mut self, vaddr: u64, paddr: u64) -> Self {
        self.pages.push(PageMapping {
            vaddr: Address::new(vaddr),
            paddr: Address::new(paddr),
        });
        self
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name.clone(),
            offset: self.offset,
            vad_root: self.vad_root.and_then(Address::non_null),
        }
    }
}

/// Decoded `_MMVAD_FLAGS`. A present `vad_type` selects the modern layout,
/// otherwise `legacy` supplies the individual type bits.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VadFlagsEntry {
    #[serde(default)]
    pub raw: u64,
    #[serde(default)]
    pub commit_charge: u64,
    #[serde(default)]
    pub protection: u8,
    #[serde(default)]
    pub private_memory: bool,
    #[serde(default)]
    pub vad_type: Option<u8>,
    #[serde(default)]
    pub legacy: LegacyTypeFlags,
}

/// Long-record fields
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LongEntry {
    #[serde(default)]
    pub control_area: Address,
    #[serde(default)]
    pub first_prototype_pte: Address,
    #[serde(default)]
    pub last_contiguous_pte: Address,
    #[serde(default)]
    pub flags2: u32,
}

/// A VAD record as stored in the manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadEntry {
    pub offset: Address,
    pub tag: String,
    pub start: Address,
    pub end: Address,
    #[serde(default)]
    pub parent: Option<Address>,
    #[serde(default)]
    pub left: Option<Address>,
    #[serde(default)]
    pub right: Option<Address>,
    #[serde(default)]
    pub flags: VadFlagsEntry,
    #[serde(default)]
    pub long: Option<LongEntry>,
}

impl VadEntry {
    fn with_tag(tag: &str, offset: u64, start: u64, end: u64) -> Self {
        VadEntry {
            offset: Address::new(offset),
            tag: tag.to_string(),
            start: Address::new(start),
            end: Address::new(end),
            parent: None,
            left: None,
            right: None,
            flags: VadFlagsEntry {
                protection: 4,
                private_memory: true,
                ..Default::default()
            },
            long: None,
        }
    }

    /// `VadS` record with a packed type field
    pub fn short_modern(offset: u64, start: u64, end: u64) -> Self {
        let mut entry = Self::with_tag("VadS", offset, start, end);
        entry.flags.vad_type = Some(0);
        entry
    }

    /// `VadS` record with individual type bits
    pub fn short_legacy(offset: u64, start: u64, end: u64) -> Self {
        Self::with_tag("VadS", offset, start, end)
    }

    /// `Vad ` record with a packed type field
    pub fn long_modern(offset: u64, start: u64, end: u64) -> Self {
        let mut entry = Self::with_tag("Vad ", offset, start, end);
        entry.flags.vad_type = Some(0);
        entry.flags.private_memory = false;
        entry.long = Some(LongEntry::default());
        entry
    }

    /// `Vad ` record with individual type bits
    pub fn long_legacy(offset: u64, start: u64, end: u64) -> Self {
        let mut entry = Self::with_tag("Vad ", offset, start, end);
        entry.flags.private_memory = false;
        entry.long = Some(LongEntry::default());
        entry
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn parent(mut self, parent: u64) -> Self {
        self.parent = Address::new(parent).non_null();
        self
    }

    pub fn left(mut self, left: u64) -> Self {
        self.left = Address::new(left).non_null();
        self
    }

    pub fn right(mut self, right: u64) -> Self {
        self.right = Address::new(right).non_null();
        self
    }

    pub fn protection(mut self, protection: u8) -> Self {
        self.flags.protection = protection;
        self
    }

    pub fn private_memory(mut self, private_memory: bool) -> Self {
        self.flags.private_memory = private_memory;
        self
    }

    pub fn vad_type(mut self, vad_type: u8) -> Self {
        self.flags.vad_type = Some(vad_type);
        self
    }

    pub fn legacy_types(mut self, types: LegacyTypeFlags) -> Self {
        self.flags.vad_type = None;
        self.flags.legacy = types;
        self
    }

    pub fn control_area(mut self, control_area: u64) -> Self {
        self.long.get_or_insert_with(LongEntry::default).control_area = Address::new(control_area);
        self
    }

    pub fn prototype_ptes(mut self, first: u64, last: u64) -> Self {
        let long = self.long.get_or_insert_with(LongEntry::default);
        long.first_prototype_pte = Address::new(first);
        long.last_contiguous_pte = Address::new(last);
        self
    }

    pub fn flags2(mut self, flags2: u32) -> Self {
        self.long.get_or_insert_with(LongEntry::default).flags2 = flags2;
        self
    }

    /// Validates the entry and builds the typed node. The tag decides the
    /// record shape: long tags need long fields, anything else is read as a
    /// short record.
    pub fn to_node(&self) -> VadResult<VadNode> {
        let tag = VadTag::parse(self.offset, &self.tag)?;

        let base = BaseFlags {
            raw: self.flags.raw,
            commit_charge: self.flags.commit_charge,
            protection: Protection(self.flags.protection),
            private_memory: self.flags.private_memory,
        };

        let long = match tag.class() {
            TagClass::Long => {
                let long = self.long.ok_or_else(|| {
                    VadError::corrupt_node(
                        self.offset,
                        format!("tag {:?} names a long record without long fields", self.tag),
                    )
                })?;
                Some(LongFields {
                    control_area: long.control_area,
                    first_prototype_pte: long.first_prototype_pte,
                    last_contiguous_pte: long.last_contiguous_pte,
                    flags2: long.flags2,
                })
            }
            TagClass::Short | TagClass::Unrecognized => None,
        };

        let record = match (self.flags.vad_type, long) {
            (Some(vad_type), None) => VadRecord::ShortModern {
                flags: ModernVadFlags { base, vad_type },
            },
            (Some(vad_type), Some(long)) => VadRecord::LongModern {
                flags: ModernVadFlags { base, vad_type },
                long,
            },
            (None, None) => VadRecord::ShortLegacy {
                flags: LegacyVadFlags {
                    base,
                    types: self.flags.legacy,
                },
            },
            (None, Some(long)) => VadRecord::LongLegacy {
                flags: LegacyVadFlags {
                    base,
                    types: self.flags.legacy,
                },
                long,
            },
        };

        Ok(VadNode {
            offset: self.offset,
            start: self.start,
            end: self.end,
            tag,
            parent: self.parent.and_then(Address::non_null),
            left: self.left.and_then(Address::non_null),
            right: self.right.and_then(Address::non_null),
            record,
        })
    }
}
