//! Text and JSON output for walked VAD trees
//!
//! Renderers consume a [`ProcessView`], which holds a fully materialized walk
//! so that the same pass can be printed in several formats.

pub mod dot;
pub mod info;
pub mod json;
pub mod tree;
pub mod walk;

use std::io::{self, Write};

use crate::core::types::ProcessInfo;
use crate::snapshot::{Process, RecordMaterializer};
use crate::vad::walker::{walk as walk_tree, TruncationReason, WalkEntry, WalkLimits, WalkReport};

/// Width of the `*` banner printed before each process
pub const BANNER_WIDTH: usize = 72;

/// One process and the result of walking its VAD tree
#[derive(Debug, Clone)]
pub struct ProcessView {
    pub info: ProcessInfo,
    pub entries: Vec<WalkEntry>,
    pub report: WalkReport,
}

impl ProcessView {
    /// Walks the process's tree to completion
    pub fn collect(
        process: &Process,
        materializer: &dyn RecordMaterializer,
        limits: WalkLimits,
    ) -> Self {
        let info = process.info.clone();
        let mut walker = walk_tree(info.pid, info.vad_root, materializer, limits);
        let entries: Vec<WalkEntry> = walker.by_ref().collect();
        ProcessView {
            info,
            entries,
            report: walker.into_report(),
        }
    }
}

/// Output format selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Info,
    Tree,
    Dot,
    Walk,
    Json,
}

/// Renders `views` in `format`
pub fn render(
    out: &mut dyn Write,
    format: Format,
    views: &[ProcessView],
    materializer: &dyn RecordMaterializer,
) -> crate::VadResult<()> {
    match format {
        Format::Info => {
            for view in views {
                info::render(out, view, materializer)?;
            }
        }
        Format::Tree => {
            for view in views {
                tree::render(out, view)?;
            }
        }
        Format::Dot => {
            for view in views {
                dot::render(out, view)?;
            }
        }
        Format::Walk => {
            for view in views {
                walk::render(out, view)?;
            }
        }
        Format::Json => json::render(out, views, materializer)?,
    }
    Ok(())
}

pub(crate) fn write_banner(out: &mut dyn Write, pid: u32) -> io::Result<()> {
    writeln!(out, "{}", "*".repeat(BANNER_WIDTH))?;
    writeln!(out, "Pid: {:6}", pid)
}

/// One-line summary of anything unusual about a walk, if there was anything
pub fn walk_notice(report: &WalkReport) -> Option<String> {
    if !report.has_anomalies() {
        return None;
    }

    let mut parts = Vec::new();
    for truncation in &report.truncations {
        let reason = match truncation.reason {
            TruncationReason::Cycle { from, to } => {
                format!("cycle from {:#x} back to {:#x}", from, to)
            }
            TruncationReason::SharedNode { from, to } => {
                format!("{:#x} also linked from {:#x}", to, from)
            }
            TruncationReason::DepthLimit { offset, depth } => {
                format!("depth limit at {:#x} (depth {})", offset, depth)
            }
            TruncationReason::NodeLimit { limit } => format!("node limit of {}", limit),
        };
        parts.push(format!("{} after {} nodes", reason, truncation.visited));
    }
    if !report.skipped.is_empty() {
        parts.push(format!("{} corrupt node(s) skipped", report.skipped.len()));
    }
    if !report.malformed.is_empty() {
        parts.push(format!("{} node(s) with start > end", report.malformed.len()));
    }

    let status = if report.is_truncated() {
        "truncated"
    } else {
        "incomplete"
    };
    Some(format!(
        "Walk of pid {} {} ({} nodes visited): {}",
        report.pid,
        status,
        report.visited,
        parts.join("; ")
    ))
}
