//! VAD records, their flags, and tree traversal

pub mod flags;
pub mod inspector;
pub mod node;
pub mod walker;

pub use flags::{decode_protection, decode_vad_type, Protection, VadType};
pub use inspector::{ExtendedDescription, RegionDescription, RegionInspector};
pub use node::{
    BaseFlags, ControlArea, FileObject, LegacyTypeFlags, LegacyVadFlags, ListEntry, LongFields,
    ModernVadFlags, TagClass, VadNode, VadRecord, VadTag,
};
pub use walker::{
    walk, SkippedNode, Truncation, TruncationReason, VadWalker, WalkEntry, WalkLimits, WalkReport,
};
