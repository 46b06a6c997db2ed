//! Structured per-region descriptions

use serde::Serialize;
use tracing::{debug, warn};

use super::flags::{decode_protection, decode_vad_type};
use super::node::{ControlArea, LongFields, VadNode, VadRecord, VadTag};
use crate::core::types::Address;
use crate::snapshot::RecordMaterializer;

/// Long-record details
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedDescription {
    pub first_prototype_pte: Address,
    pub last_contiguous_pte: Address,
    pub flags2: u32,
}

impl From<&LongFields> for ExtendedDescription {
    fn from(long: &LongFields) -> Self {
        ExtendedDescription {
            first_prototype_pte: long.first_prototype_pte,
            last_contiguous_pte: long.last_contiguous_pte,
            flags2: long.flags2,
        }
    }
}

/// Everything known about one region, ready for rendering
///
/// Optional sections are absent when the record layout or the mapping kind
/// does not carry them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionDescription {
    pub offset: Address,
    pub start: Address,
    pub end: Address,
    pub tag: VadTag,
    pub layout: &'static str,
    pub flags_raw: u64,
    /// Flag fields rendered as `Name: value` pairs
    pub flags: String,
    pub protection: String,
    /// Only for layouts with a packed type field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vad_type: Option<String>,
    /// Only for layouts with individual type bits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_type_flags: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_area: Option<ControlArea>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedDescription>,
}

/// Builds [`RegionDescription`]s, resolving control areas on demand
pub struct RegionInspector<'a> {
    materializer: &'a dyn RecordMaterializer,
}

impl<'a> RegionInspector<'a> {
    pub fn new(materializer: &'a dyn RecordMaterializer) -> Self {
        RegionInspector { materializer }
    }

    pub fn inspect(&self, node: &VadNode) -> RegionDescription {
        let base = node.record.base_flags();

        let (vad_type, legacy_type_flags, long) = match &node.record {
            VadRecord::ShortModern { flags } => {
                (Some(decode_vad_type(u64::from(flags.vad_type))), None, None)
            }
            VadRecord::LongModern { flags, long } => (
                Some(decode_vad_type(u64::from(flags.vad_type))),
                None,
                Some(long),
            ),
            VadRecord::ShortLegacy { flags } => (None, Some(flags.types.set_names()), None),
            VadRecord::LongLegacy { flags, long } => {
                (None, Some(flags.types.set_names()), Some(long))
            }
        };

        let control_area = match long {
            Some(long) if !base.private_memory => self.resolve_control_area(node, long.control_area),
            _ => None,
        };

        RegionDescription {
            offset: node.offset,
            start: node.start,
            end: node.end,
            tag: node.tag,
            layout: node.record.layout_name(),
            flags_raw: base.raw,
            flags: node.record.to_string(),
            protection: decode_protection(u64::from(base.protection.code())).into_owned(),
            vad_type: vad_type.map(|label| label.into_owned()),
            legacy_type_flags,
            control_area,
            extended: long.map(ExtendedDescription::from),
        }
    }

    fn resolve_control_area(&self, node: &VadNode, reference: Address) -> Option<ControlArea> {
        let reference = reference.non_null()?;
        match self.materializer.control_area(reference) {
            Ok(Some(control_area)) if !control_area.offset.is_null() => Some(control_area),
            Ok(_) => {
                debug!(vad = %node.offset, control_area = %reference, "Control area unresolved");
                None
            }
            Err(err) => {
                warn!(vad = %node.offset, control_area = %reference, error = %err, "Failed to read control area");
                None
            }
        }
    }
}
