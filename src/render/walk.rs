//! Tabular dump of every node's links

use std::io::{self, Write};

use super::{walk_notice, write_banner, ProcessView};
use crate::core::types::Address;

pub fn render(out: &mut dyn Write, view: &ProcessView) -> io::Result<()> {
    write_banner(out, view.info.pid)?;
    writeln!(
        out,
        "{:16} {:16} {:16} {:16} {:16} {:16} {:4}",
        "Address", "Parent", "Left", "Right", "Start", "End", "Tag"
    )?;

    for entry in &view.entries {
        let node = &entry.node;
        let link = |address: Option<Address>| address.unwrap_or_default();
        writeln!(
            out,
            "{:016x} {:016x} {:016x} {:016x} {:016x} {:016x} {:4}",
            node.offset,
            link(node.parent),
            link(node.left),
            link(node.right),
            node.start,
            node.end,
            node.tag
        )?;
    }

    if let Some(notice) = walk_notice(&view.report) {
        writeln!(out, "{}", notice)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{MemorySnapshot, ProcessEntry, ProcessSource, VadEntry};
    use crate::vad::walker::WalkLimits;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_links_print_as_zero() {
        let snapshot = MemorySnapshot::builder()
            .process(ProcessEntry::new(4, "System", 0x8000).vad_root(0xa0))
            .vad(VadEntry::short_modern(0xa0, 0x1000, 0x1fff).right(0xb0))
            .vad(VadEntry::short_modern(0xb0, 0x2000, 0x2fff).parent(0xa0).tag("VadF"))
            .build();
        let process = &snapshot.processes().unwrap()[0];
        let view = ProcessView::collect(process, &snapshot, WalkLimits::default());

        let mut out = Vec::new();
        render(&mut out, &view).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[2],
            "Address          Parent           Left             Right            Start            End              Tag "
        );
        assert_eq!(
            lines[3],
            "00000000000000a0 0000000000000000 0000000000000000 00000000000000b0 0000000000001000 0000000000001fff VadS"
        );
        assert_eq!(
            lines[4],
            "00000000000000b0 00000000000000a0 0000000000000000 0000000000000000 0000000000002000 0000000000002fff VadF"
        );
    }
}
