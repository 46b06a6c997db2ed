//! Typed view over a single VAD record
//!
//! Records come in four layouts: short or long, each with either the legacy
//! per-type boolean flags or the packed `VadType` code. The layout is fixed
//! when the record is materialized, so consumers match on [`VadRecord`]
//! instead of probing for fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::flags::{Protection, VadType};
use crate::core::types::{Address, VadError, VadResult};

/// Four-byte pool tag at the head of a VAD allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VadTag([u8; 4]);

/// What a tag says about the record behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TagClass {
    /// `VadS` or `VadF`
    Short,
    /// `Vad `, `Vadl` or `Vadm`
    Long,
    /// Printable, but not a VAD tag
    Unrecognized,
}

impl VadTag {
    /// Validates raw tag bytes. Non-printable bytes mean the record is not a
    /// VAD at all.
    pub fn from_bytes(offset: Address, bytes: [u8; 4]) -> VadResult<Self> {
        if bytes.iter().all(|b| (0x20..=0x7e).contains(b)) {
            Ok(VadTag(bytes))
        } else {
            Err(VadError::corrupt_node(
                offset,
                format!("implausible tag bytes {:02x?}", bytes),
            ))
        }
    }

    /// Validates a tag given as text
    pub fn parse(offset: Address, tag: &str) -> VadResult<Self> {
        let bytes: [u8; 4] = tag.as_bytes().try_into().map_err(|_| {
            VadError::corrupt_node(offset, format!("tag {:?} is not four bytes", tag))
        })?;
        Self::from_bytes(offset, bytes)
    }

    pub fn class(&self) -> TagClass {
        match &self.0 {
            b"VadS" | b"VadF" => TagClass::Short,
            b"Vad " | b"Vadl" | b"Vadm" => TagClass::Long,
            _ => TagClass::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &str {
        // Validated as printable ASCII on construction
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for VadTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for VadTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Flag bits common to both layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BaseFlags {
    /// The whole flags word as read from the record
    pub raw: u64,
    pub commit_charge: u64,
    pub protection: Protection,
    pub private_memory: bool,
}

/// Individual type bits found in pre-Vista `_MMVAD_FLAGS`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyTypeFlags {
    pub physical_mapping: bool,
    pub image_map: bool,
    pub user_physical_pages: bool,
    pub write_watch: bool,
    pub large_pages: bool,
}

impl LegacyTypeFlags {
    /// Names of the bits that are set, in declaration order
    pub fn set_names(&self) -> Vec<&'static str> {
        [
            ("PhysicalMapping", self.physical_mapping),
            ("ImageMap", self.image_map),
            ("UserPhysicalPages", self.user_physical_pages),
            ("WriteWatch", self.write_watch),
            ("LargePages", self.large_pages),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Maps the individual bits onto the packed type enumeration. The first
    /// set bit wins; no bits means `VadNone`.
    pub fn vad_type(&self) -> VadType {
        if self.physical_mapping {
            VadType::DevicePhysicalMemory
        } else if self.image_map {
            VadType::ImageMap
        } else if self.user_physical_pages {
            VadType::Awe
        } else if self.write_watch {
            VadType::WriteWatch
        } else if self.large_pages {
            VadType::LargePages
        } else {
            VadType::None
        }
    }
}

/// `_MMVAD_FLAGS` with individual type bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LegacyVadFlags {
    pub base: BaseFlags,
    pub types: LegacyTypeFlags,
}

/// `_MMVAD_FLAGS` with a packed `VadType` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModernVadFlags {
    pub base: BaseFlags,
    /// Raw field value; may be out of range in a forged record
    pub vad_type: u8,
}

/// Fields only present in long records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LongFields {
    /// Raw control area pointer; null when absent
    pub control_area: Address,
    pub first_prototype_pte: Address,
    pub last_contiguous_pte: Address,
    /// Raw `u2.VadFlags2` word
    pub flags2: u32,
}

/// The record layouts a VAD can be materialized as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum VadRecord {
    ShortLegacy {
        flags: LegacyVadFlags,
    },
    ShortModern {
        flags: ModernVadFlags,
    },
    LongLegacy {
        flags: LegacyVadFlags,
        long: LongFields,
    },
    LongModern {
        flags: ModernVadFlags,
        long: LongFields,
    },
}

impl VadRecord {
    pub fn base_flags(&self) -> &BaseFlags {
        match self {
            VadRecord::ShortLegacy { flags } | VadRecord::LongLegacy { flags, .. } => &flags.base,
            VadRecord::ShortModern { flags } | VadRecord::LongModern { flags, .. } => &flags.base,
        }
    }

    pub fn long_fields(&self) -> Option<&LongFields> {
        match self {
            VadRecord::ShortLegacy { .. } | VadRecord::ShortModern { .. } => None,
            VadRecord::LongLegacy { long, .. } | VadRecord::LongModern { long, .. } => Some(long),
        }
    }

    /// Packed type code, only for modern layouts
    pub fn vad_type_code(&self) -> Option<u8> {
        match self {
            VadRecord::ShortModern { flags } | VadRecord::LongModern { flags, .. } => {
                Some(flags.vad_type)
            }
            VadRecord::ShortLegacy { .. } | VadRecord::LongLegacy { .. } => None,
        }
    }

    /// Individual type bits, only for legacy layouts
    pub fn legacy_type_flags(&self) -> Option<&LegacyTypeFlags> {
        match self {
            VadRecord::ShortLegacy { flags } | VadRecord::LongLegacy { flags, .. } => {
                Some(&flags.types)
            }
            VadRecord::ShortModern { .. } | VadRecord::LongModern { .. } => None,
        }
    }

    /// Semantic type regardless of layout. `None` only when a modern record
    /// carries an out-of-range code.
    pub fn vad_type(&self) -> Option<VadType> {
        match self {
            VadRecord::ShortModern { flags } | VadRecord::LongModern { flags, .. } => {
                VadType::from_code(flags.vad_type)
            }
            VadRecord::ShortLegacy { flags } | VadRecord::LongLegacy { flags, .. } => {
                Some(flags.types.vad_type())
            }
        }
    }

    pub fn is_long(&self) -> bool {
        self.long_fields().is_some()
    }

    pub fn layout_name(&self) -> &'static str {
        match self {
            VadRecord::ShortLegacy { .. } => "short/legacy",
            VadRecord::ShortModern { .. } => "short/modern",
            VadRecord::LongLegacy { .. } => "long/legacy",
            VadRecord::LongModern { .. } => "long/modern",
        }
    }
}

/// One VAD as read from the snapshot
///
/// Links to other nodes are plain addresses; nodes never own each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VadNode {
    /// Location of the record in the snapshot, used as its identity
    pub offset: Address,
    /// First byte of the region
    pub start: Address,
    /// Last byte of the region (inclusive)
    pub end: Address,
    pub tag: VadTag,
    pub parent: Option<Address>,
    pub left: Option<Address>,
    pub right: Option<Address>,
    pub record: VadRecord,
}

impl VadNode {
    /// Whether `start <= end`
    pub fn is_well_formed(&self) -> bool {
        self.start <= self.end
    }

    /// Region length in bytes, `None` for inverted or full-width ranges
    pub fn size(&self) -> Option<u64> {
        if !self.is_well_formed() {
            return None;
        }
        (self.end.as_u64() - self.start.as_u64()).checked_add(1)
    }

    pub fn protection(&self) -> Protection {
        self.record.base_flags().protection
    }

    pub fn is_private_memory(&self) -> bool {
        self.record.base_flags().private_memory
    }

    /// Child links in the order the walker descends them
    pub fn children(&self) -> impl Iterator<Item = Address> {
        [self.left, self.right].into_iter().flatten()
    }
}

/// Dereference list links of a control area
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    pub flink: Address,
    pub blink: Address,
}

/// The file backing a mapped section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub offset: Address,
    /// Address of the name's character buffer
    pub name_buffer: Address,
    pub name: String,
}

/// Backing section metadata for a shared mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlArea {
    pub offset: Address,
    #[serde(default)]
    pub segment: Address,
    #[serde(default)]
    pub dereference_list: ListEntry,
    #[serde(default)]
    pub number_of_section_references: u64,
    #[serde(default)]
    pub number_of_pfn_references: u64,
    #[serde(default)]
    pub number_of_mapped_views: u64,
    #[serde(default)]
    pub number_of_user_references: u64,
    #[serde(default)]
    pub waiting_for_deletion: Address,
    /// Raw `u.Flags` word
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub file_object: Option<FileObject>,
}

impl fmt::Display for BaseFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommitCharge: {}, Protection: {}, PrivateMemory: {}",
            self.commit_charge,
            self.protection.code(),
            u8::from(self.private_memory)
        )
    }
}

impl fmt::Display for VadRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VadRecord::ShortLegacy { flags } | VadRecord::LongLegacy { flags, .. } => {
                write!(f, "{}", flags.base)?;
                for name in flags.types.set_names() {
                    write!(f, ", {}: 1", name)?;
                }
                Ok(())
            }
            VadRecord::ShortModern { flags } | VadRecord::LongModern { flags, .. } => {
                write!(f, "{}, VadType: {}", flags.base, flags.vad_type)
            }
        }
    }
}
