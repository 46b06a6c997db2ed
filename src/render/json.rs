//! Machine-readable output

use serde::Serialize;
use std::io::Write;

use super::ProcessView;
use crate::core::types::{Address, ProcessId, VadResult};
use crate::snapshot::RecordMaterializer;
use crate::vad::inspector::{RegionDescription, RegionInspector};
use crate::vad::walker::WalkReport;

#[derive(Debug, Serialize)]
pub struct RegionEntry {
    pub depth: usize,
    #[serde(flatten)]
    pub region: RegionDescription,
}

#[derive(Debug, Serialize)]
pub struct ProcessDocument<'a> {
    pub pid: ProcessId,
    pub name: &'a str,
    pub offset: Address,
    pub vad_root: Option<Address>,
    pub regions: Vec<RegionEntry>,
    pub walk: &'a WalkReport,
}

pub fn document<'a>(view: &'a ProcessView, inspector: &RegionInspector<'_>) -> ProcessDocument<'a> {
    ProcessDocument {
        pid: view.info.pid,
        name: &view.info.name,
        offset: view.info.offset,
        vad_root: view.info.vad_root,
        regions: view
            .entries
            .iter()
            .map(|entry| RegionEntry {
                depth: entry.depth,
                region: inspector.inspect(&entry.node),
            })
            .collect(),
        walk: &view.report,
    }
}

/// Writes one pretty-printed JSON array holding every process
pub fn render(
    out: &mut dyn Write,
    views: &[ProcessView],
    materializer: &dyn RecordMaterializer,
) -> VadResult<()> {
    let inspector = RegionInspector::new(materializer);
    let documents: Vec<ProcessDocument<'_>> = views
        .iter()
        .map(|view| document(view, &inspector))
        .collect();

    serde_json::to_writer_pretty(&mut *out, &documents)?;
    writeln!(out)?;
    Ok(())
}
