//! vadscope library for walking, describing and dumping VAD trees of
//! processes in a Windows memory snapshot

pub mod config;
pub mod core;
pub mod memory;
pub mod render;
pub mod snapshot;
pub mod vad;

// Re-export main types from core module
pub use core::types::{Address, ProcessId, ProcessInfo, VadError, VadResult};

pub use memory::{DumpRecord, ProcessDumpReport, RegionExtractor, RegionReader};
pub use snapshot::{AddressSpace, MemorySnapshot, Process, ProcessSource, RecordMaterializer};
pub use vad::{
    decode_protection, decode_vad_type, walk, RegionDescription, RegionInspector, VadNode,
    VadRecord, WalkEntry, WalkLimits, WalkReport,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_module_accessible() {
        assert_eq!(core::VERSION, env!("CARGO_PKG_VERSION"));
        assert!(!core::AUTHORS.is_empty());
    }

    #[test]
    fn test_address_reexport() {
        let addr = Address::new(0x1000);
        assert_eq!(addr.as_u64(), 0x1000);
        assert!(Address::null().is_null());
    }

    #[test]
    fn test_decoder_reexports() {
        assert_eq!(decode_protection(4), "PAGE_READWRITE");
        assert_eq!(decode_vad_type(2), "VadImageMap");
    }

    #[test]
    fn test_process_info_reexport() {
        let process = ProcessInfo::new(1234, "test.exe", Address::new(0x8100_0000));
        assert_eq!(process.pid, 1234);
        assert_eq!(process.name, "test.exe");
        assert_eq!(process.vad_root, None);
    }

    #[test]
    fn test_empty_walk_from_reexports() {
        let snapshot = MemorySnapshot::builder().build();
        let mut walker = walk(4, None, &snapshot, WalkLimits::default());
        assert!(walker.next().is_none());
        assert!(!walker.report().has_anomalies());
    }
}
