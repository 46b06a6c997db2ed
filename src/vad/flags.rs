//! Decoding of bit-packed VAD flag fields
//!
//! `Protection` is an index into the kernel's `MmProtectToValue` table and
//! `VadType` indexes the `MI_VAD_TYPE` enumeration. Both tables are part of
//! the kernel ABI and are reproduced exactly.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;

/// Page protection names, indexed by the `Protection` bit field
pub const PROTECTION_NAMES: [&str; 32] = [
    "PAGE_NOACCESS",
    "PAGE_READONLY",
    "PAGE_EXECUTE",
    "PAGE_EXECUTE_READ",
    "PAGE_READWRITE",
    "PAGE_WRITECOPY",
    "PAGE_EXECUTE_READWRITE",
    "PAGE_EXECUTE_WRITECOPY",
    "PAGE_NOACCESS",
    "PAGE_NOCACHE | PAGE_READONLY",
    "PAGE_NOCACHE | PAGE_EXECUTE",
    "PAGE_NOCACHE | PAGE_EXECUTE_READ",
    "PAGE_NOCACHE | PAGE_READWRITE",
    "PAGE_NOCACHE | PAGE_WRITECOPY",
    "PAGE_NOCACHE | PAGE_EXECUTE_READWRITE",
    "PAGE_NOCACHE | PAGE_EXECUTE_WRITECOPY",
    "PAGE_NOACCESS",
    "PAGE_GUARD | PAGE_READONLY",
    "PAGE_GUARD | PAGE_EXECUTE",
    "PAGE_GUARD | PAGE_EXECUTE_READ",
    "PAGE_GUARD | PAGE_READWRITE",
    "PAGE_GUARD | PAGE_WRITECOPY",
    "PAGE_GUARD | PAGE_EXECUTE_READWRITE",
    "PAGE_GUARD | PAGE_EXECUTE_WRITECOPY",
    "PAGE_NOACCESS",
    "PAGE_WRITECOMBINE | PAGE_READONLY",
    "PAGE_WRITECOMBINE | PAGE_EXECUTE",
    "PAGE_WRITECOMBINE | PAGE_EXECUTE_READ",
    "PAGE_WRITECOMBINE | PAGE_READWRITE",
    "PAGE_WRITECOMBINE | PAGE_WRITECOPY",
    "PAGE_WRITECOMBINE | PAGE_EXECUTE_READWRITE",
    "PAGE_WRITECOMBINE | PAGE_EXECUTE_WRITECOPY",
];

/// VAD type names, indexed by the `VadType` bit field
pub const VAD_TYPE_NAMES: [&str; 8] = [
    "VadNone",
    "VadDevicePhysicalMemory",
    "VadImageMap",
    "VadAwe",
    "VadWriteWatch",
    "VadLargePages",
    "VadRotatePhysical",
    "VadLargePageSection",
];

/// Decodes a protection code. Codes outside the table come back as their
/// raw hex value.
pub fn decode_protection(code: u64) -> Cow<'static, str> {
    match usize::try_from(code).ok().and_then(|i| PROTECTION_NAMES.get(i)) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("{:#x}", code)),
    }
}

/// Decodes a VAD type code. Codes outside the table come back as their raw
/// hex value.
pub fn decode_vad_type(code: u64) -> Cow<'static, str> {
    match usize::try_from(code).ok().and_then(|i| VAD_TYPE_NAMES.get(i)) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("{:#x}", code)),
    }
}

/// A protection code with helpers for the access it grants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Protection(pub u8);

impl Protection {
    /// Raw code
    pub fn code(&self) -> u8 {
        self.0
    }

    /// Human readable name
    pub fn name(&self) -> Cow<'static, str> {
        decode_protection(u64::from(self.0))
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Semantic VAD type shared by both flag layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VadType {
    None,
    DevicePhysicalMemory,
    ImageMap,
    Awe,
    WriteWatch,
    LargePages,
    RotatePhysical,
    LargePageSection,
}

impl VadType {
    /// Looks up a packed type code
    pub fn from_code(code: u8) -> Option<Self> {
        let vad_type = match code {
            0 => VadType::None,
            1 => VadType::DevicePhysicalMemory,
            2 => VadType::ImageMap,
            3 => VadType::Awe,
            4 => VadType::WriteWatch,
            5 => VadType::LargePages,
            6 => VadType::RotatePhysical,
            7 => VadType::LargePageSection,
            _ => return None,
        };
        Some(vad_type)
    }

    /// Packed type code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Kernel name of the type
    pub fn name(&self) -> &'static str {
        VAD_TYPE_NAMES[self.code() as usize]
    }
}

impl fmt::Display for VadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
