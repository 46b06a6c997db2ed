//! Reading region contents and writing them out as dump files
//!
//! All reads go through a process's own virtual address space. Pages that
//! are not resident are synthesized as zeros, so a dump always has the exact
//! length of its VAD range.

pub mod extractor;
pub mod reader;

pub use extractor::{dump_file_name, DumpRecord, ProcessDumpReport, RegionExtractor, RegionIssue};
pub use reader::RegionReader;
