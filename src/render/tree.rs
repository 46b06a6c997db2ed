//! Indented address ranges, one level of indentation per tree depth

use std::io::{self, Write};

use super::{walk_notice, write_banner, ProcessView};

pub fn render(out: &mut dyn Write, view: &ProcessView) -> io::Result<()> {
    write_banner(out, view.info.pid)?;
    for entry in &view.entries {
        writeln!(
            out,
            "{}{:08x} - {:08x}",
            " ".repeat(entry.depth),
            entry.node.start,
            entry.node.end
        )?;
    }

    if let Some(notice) = walk_notice(&view.report) {
        writeln!(out, "{}", notice)?;
    }
    Ok(())
}
