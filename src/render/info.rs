//! Detailed per-region listing

use std::io::{self, Write};

use super::{walk_notice, write_banner, ProcessView};
use crate::snapshot::RecordMaterializer;
use crate::vad::inspector::{RegionDescription, RegionInspector};
use crate::vad::node::ControlArea;

pub fn render(
    out: &mut dyn Write,
    view: &ProcessView,
    materializer: &dyn RecordMaterializer,
) -> io::Result<()> {
    let inspector = RegionInspector::new(materializer);

    write_banner(out, view.info.pid)?;
    for entry in &view.entries {
        write_region(out, &inspector.inspect(&entry.node))?;
        writeln!(out)?;
    }

    if let Some(notice) = walk_notice(&view.report) {
        writeln!(out, "{}", notice)?;
    }
    Ok(())
}

pub fn write_region(out: &mut dyn Write, region: &RegionDescription) -> io::Result<()> {
    writeln!(
        out,
        "VAD node @{:08x} Start {:08x} End {:08x} Tag {:4}",
        region.offset, region.start, region.end, region.tag
    )?;
    writeln!(out, "Flags: {}", region.flags)?;
    writeln!(out, "Protection: {}", region.protection)?;
    if let Some(vad_type) = &region.vad_type {
        writeln!(out, "Vad Type: {}", vad_type)?;
    }

    if let Some(control_area) = &region.control_area {
        write_control_area(out, control_area)?;
    }

    if let Some(extended) = &region.extended {
        writeln!(
            out,
            "First prototype PTE: {:08x} Last contiguous PTE: {:08x}",
            extended.first_prototype_pte, extended.last_contiguous_pte
        )?;
        writeln!(out, "Flags2: {:#x}", extended.flags2)?;
    }
    Ok(())
}

fn write_control_area(out: &mut dyn Write, ca: &ControlArea) -> io::Result<()> {
    writeln!(out, "ControlArea @{:08x} Segment {:08x}", ca.offset, ca.segment)?;
    writeln!(
        out,
        "Dereference list: Flink {:08x}, Blink {:08x}",
        ca.dereference_list.flink, ca.dereference_list.blink
    )?;
    writeln!(
        out,
        "NumberOfSectionReferences: {:10} NumberOfPfnReferences:  {:10}",
        ca.number_of_section_references, ca.number_of_pfn_references
    )?;
    writeln!(
        out,
        "NumberOfMappedViews:       {:10} NumberOfUserReferences: {:10}",
        ca.number_of_mapped_views, ca.number_of_user_references
    )?;
    writeln!(out, "WaitingForDeletion Event:  {:08x}", ca.waiting_for_deletion)?;
    writeln!(out, "Control Flags: {:#x}", ca.flags)?;

    if let Some(file) = &ca.file_object {
        writeln!(
            out,
            "FileObject @{:08x} FileBuffer @ {:08x}          , Name: {}",
            file.offset, file.name_buffer, file.name
        )?;
    }
    Ok(())
}
