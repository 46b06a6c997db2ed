//! Graphviz rendering of a VAD tree

use std::collections::HashSet;
use std::io::{self, Write};

use crate::core::types::Address;

use super::{walk_notice, ProcessView, BANNER_WIDTH};

pub fn render(out: &mut dyn Write, view: &ProcessView) -> io::Result<()> {
    writeln!(out, "/{}/", "*".repeat(BANNER_WIDTH))?;
    writeln!(out, "/* Pid: {:6} */", view.info.pid)?;
    writeln!(out, "digraph processtree {{")?;
    writeln!(out, "graph [rankdir = \"TB\"];")?;

    // Only parents already in the graph get an edge
    let mut drawn: HashSet<Address> = HashSet::new();
    for entry in &view.entries {
        let node = &entry.node;
        if let Some(parent) = node.parent.filter(|parent| drawn.contains(parent)) {
            writeln!(out, "vad_{:08x} -> vad_{:08x}", parent, node.offset)?;
        }
        drawn.insert(node.offset);
        writeln!(
            out,
            "vad_{:08x} [label = \"{{ {}\\n{:08x} - {:08x} }}\"shape = \"record\" color = \"blue\"];",
            node.offset,
            node.tag.as_str().escape_default(),
            node.start,
            node.end
        )?;
    }

    writeln!(out, "}}")?;
    if let Some(notice) = walk_notice(&view.report) {
        writeln!(out, "/* {} */", notice)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{MemorySnapshot, ProcessEntry, ProcessSource, VadEntry};
    use crate::vad::walker::WalkLimits;

    #[test]
    fn test_edges_follow_parent_links() {
        let snapshot = MemorySnapshot::builder()
            .process(ProcessEntry::new(4, "System", 0x8000).vad_root(0xa0))
            .vad(VadEntry::short_modern(0xa0, 0x1000, 0x1fff).left(0xb0))
            .vad(VadEntry::short_modern(0xb0, 0x2000, 0x2fff).parent(0xa0))
            .build();
        let process = &snapshot.processes().unwrap()[0];
        let view = ProcessView::collect(process, &snapshot, WalkLimits::default());

        let mut out = Vec::new();
        render(&mut out, &view).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("/* Pid:      4 */\ndigraph processtree {\n"));
        assert!(text.contains("vad_000000a0 -> vad_000000b0\n"));
        assert!(!text.contains("-> vad_000000a0"));
        assert!(text.contains(
            "vad_000000b0 [label = \"{ VadS\\n00002000 - 00002fff }\"shape = \"record\" color = \"blue\"];\n"
        ));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_unvisited_parent_draws_no_edge() {
        let snapshot = MemorySnapshot::builder()
            .process(ProcessEntry::new(4, "System", 0x8000).vad_root(0xa0))
            .vad(VadEntry::short_modern(0xa0, 0x1000, 0x1fff).parent(0xdead0).left(0xb0))
            .vad(VadEntry::short_modern(0xb0, 0x2000, 0x2fff).parent(0xa0).right(0xc0))
            .vad(VadEntry::short_modern(0xc0, 0x3000, 0x3fff).parent(0xfeed0))
            .build();
        let process = &snapshot.processes().unwrap()[0];
        let view = ProcessView::collect(process, &snapshot, WalkLimits::default());

        let mut out = Vec::new();
        render(&mut out, &view).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("vad_000000a0 -> vad_000000b0\n"));
        assert!(!text.contains("vad_000dead0"));
        assert!(!text.contains("vad_000feed0"));
        assert_eq!(text.matches(" -> ").count(), 1);
    }
}
