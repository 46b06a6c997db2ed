//! Dumping VAD regions to files

use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::reader::RegionReader;
use crate::config::{ConfigValidator, DumpConfig};
use crate::core::types::{Address, ProcessId, VadError, VadResult};
use crate::snapshot::{Process, RecordMaterializer};
use crate::vad::node::{TagClass, VadNode};
use crate::vad::walker::{walk, WalkLimits, WalkReport};

/// One written dump file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpRecord {
    pub pid: ProcessId,
    pub offset: Address,
    pub start: Address,
    pub end: Address,
    pub size: u64,
    pub path: PathBuf,
}

/// A region that was not written, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionIssue {
    pub offset: Address,
    pub start: Address,
    pub end: Address,
    pub reason: String,
}

impl RegionIssue {
    fn new(node: &VadNode, err: &VadError) -> Self {
        RegionIssue {
            offset: node.offset,
            start: node.start,
            end: node.end,
            reason: err.to_string(),
        }
    }
}

/// Outcome of dumping every region of one process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDumpReport {
    pub pid: ProcessId,
    pub name: String,
    /// Physical offset of the process control block
    pub control_block: Address,
    pub written: Vec<DumpRecord>,
    /// Regions refused before any file was created
    pub skipped: Vec<RegionIssue>,
    /// Regions whose file could not be written
    pub failed: Vec<RegionIssue>,
    pub walk: WalkReport,
}

/// Writes region contents into a dump directory
#[derive(Debug, Clone)]
pub struct RegionExtractor {
    directory: PathBuf,
    max_region_size: u64,
    threads: usize,
    verbose: bool,
}

impl RegionExtractor {
    /// Creates an extractor from the dump configuration. The directory must
    /// already exist.
    pub fn new(config: &DumpConfig) -> VadResult<Self> {
        let directory = ConfigValidator::validate_dump_directory(config.directory.as_deref())?;
        Ok(RegionExtractor {
            directory,
            max_region_size: config.max_region_size,
            threads: config.threads.max(1),
            verbose: config.verbose,
        })
    }

    /// Creates an extractor for `directory` with default limits
    pub fn with_directory(directory: impl Into<PathBuf>) -> VadResult<Self> {
        let config = DumpConfig {
            directory: Some(directory.into()),
            ..Default::default()
        };
        Self::new(&config)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_region_size(&self) -> u64 {
        self.max_region_size
    }

    /// Checks that `node` describes a region worth dumping and returns its
    /// length in bytes
    pub fn extractable_size(&self, pid: ProcessId, node: &VadNode) -> VadResult<u64> {
        if node.tag.class() == TagClass::Unrecognized {
            return Err(VadError::BadTag {
                offset: node.offset.as_u64(),
                tag: node.tag.as_str().to_string(),
            });
        }

        let start = node.start.as_u64();
        let end = node.end.as_u64();
        if start > end {
            return Err(VadError::InvalidRange {
                offset: node.offset.as_u64(),
                start,
                end,
            });
        }

        let size = node.size().unwrap_or(u64::MAX);
        if size > self.max_region_size {
            return Err(VadError::RegionTooLarge {
                pid,
                start,
                end,
                size,
                limit: self.max_region_size,
            });
        }

        Ok(size)
    }

    /// Physical offset of the process control block
    pub fn control_block_offset(&self, process: &Process) -> VadResult<u64> {
        process
            .space
            .translate(process.info.offset.as_u64())
            .ok_or_else(|| VadError::no_address_space(process.info.pid))
    }

    /// Opens a zero-padded stream over the region `node` describes
    pub fn extract<'p>(&self, process: &'p Process, node: &VadNode) -> VadResult<RegionReader<'p>> {
        let size = self.extractable_size(process.info.pid, node)?;
        self.control_block_offset(process)?;
        Ok(RegionReader::new(&*process.space, node.start, size))
    }

    /// Writes one region to its dump file
    ///
    /// A file that fails part way is removed so no truncated dump is left
    /// behind.
    pub fn dump_region(
        &self,
        process: &Process,
        control_block: u64,
        node: &VadNode,
    ) -> VadResult<DumpRecord> {
        let pid = process.info.pid;
        let size = self.extractable_size(pid, node)?;
        let path = self
            .directory
            .join(dump_file_name(&process.info.name, control_block, node));

        let mut reader = RegionReader::new(&*process.space, node.start, size);
        if let Err(source) = write_file(&path, &mut reader) {
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %err, "Could not remove partial dump");
                }
            }
            return Err(VadError::write_failed(pid, path, source));
        }

        if self.verbose {
            info!(pid, path = %path.display(), size, "Dumped region");
        } else {
            debug!(pid, path = %path.display(), size, "Dumped region");
        }

        Ok(DumpRecord {
            pid,
            offset: node.offset,
            start: node.start,
            end: node.end,
            size,
            path,
        })
    }

    /// Dumps every region reachable from the process's VAD root
    ///
    /// Fails only when the process has no usable address space; problems
    /// with single regions are collected in the report.
    pub fn dump_process(
        &self,
        process: &Process,
        materializer: &dyn RecordMaterializer,
        limits: WalkLimits,
    ) -> VadResult<ProcessDumpReport> {
        let pid = process.info.pid;
        let control_block = match self.control_block_offset(process) {
            Ok(offset) => offset,
            Err(err) => {
                warn!(pid, name = %process.info.name, "Process does not have a valid address space");
                return Err(err);
            }
        };

        let mut written = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();

        let mut walker = walk(pid, process.info.vad_root, materializer, limits);
        for entry in walker.by_ref() {
            let node = &entry.node;
            match self.dump_region(process, control_block, node) {
                Ok(record) => written.push(record),
                Err(err @ VadError::WriteFailed { .. }) => {
                    warn!(pid, vad = %node.offset, error = %err, "Failed to dump region");
                    failed.push(RegionIssue::new(node, &err));
                }
                Err(err) => {
                    debug!(pid, vad = %node.offset, error = %err, "Region not dumped");
                    skipped.push(RegionIssue::new(node, &err));
                }
            }
        }

        Ok(ProcessDumpReport {
            pid,
            name: process.info.name.clone(),
            control_block: Address::new(control_block),
            written,
            skipped,
            failed,
            walk: walker.into_report(),
        })
    }

    /// Dumps several processes in parallel. Results come back in the order
    /// of `processes`.
    pub fn dump_all(
        &self,
        processes: &[Process],
        materializer: &dyn RecordMaterializer,
        limits: WalkLimits,
    ) -> VadResult<Vec<VadResult<ProcessDumpReport>>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|err| VadError::Snapshot(format!("cannot start dump workers: {}", err)))?;

        info!(
            processes = processes.len(),
            threads = self.threads,
            directory = %self.directory.display(),
            "Dumping regions"
        );

        Ok(pool.install(|| {
            processes
                .par_iter()
                .map(|process| self.dump_process(process, materializer, limits))
                .collect()
        }))
    }
}

fn write_file(path: &Path, reader: &mut RegionReader<'_>) -> io::Result<u64> {
    let mut writer = BufWriter::new(File::create(path)?);
    let copied = io::copy(reader, &mut writer)?;
    writer.flush()?;
    Ok(copied)
}

/// Deterministic dump file name for a region
///
/// `{name}.{control_block:x}.{start:08x}-{end:08x}.dmp`. Characters that do
/// not belong in a file name are replaced with `_`.
pub fn dump_file_name(process_name: &str, control_block: u64, node: &VadNode) -> String {
    format!(
        "{}.{:x}.{:08x}-{:08x}.dmp",
        sanitize_name(process_name),
        control_block,
        node.start.as_u64(),
        node.end.as_u64()
    )
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.trim_matches('.') {
        "" => "unknown".to_string(),
        trimmed => trimmed.to_string(),
    }
}
