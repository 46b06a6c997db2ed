use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vadscope::config::{Config, ConfigLoader, ConfigValidator, DEFAULT_CONFIG_FILE};
use vadscope::memory::{ProcessDumpReport, RegionExtractor};
use vadscope::render::{self, Format, ProcessView};
use vadscope::snapshot::{MemorySnapshot, Process, ProcessFilter, ProcessSource};
use vadscope::VadResult;

#[derive(Parser)]
#[command(name = "vadscope")]
#[command(version, about = "Inspect and dump the VAD trees of a memory snapshot", long_about = None)]
struct Cli {
    /// Snapshot manifest (JSON)
    snapshot: PathBuf,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Only analyze these process ids
    #[arg(short, long = "pid")]
    pids: Vec<u32>,

    /// Only analyze processes with this image name (case-insensitive)
    #[arg(short, long)]
    name: Option<String>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Describe every VAD node
    Info,

    /// Print the tree as indented address ranges
    Tree {
        /// Emit a graphviz digraph instead
        #[arg(long)]
        dot: bool,
    },

    /// Print every node with its links
    Walk,

    /// Describe every VAD node as JSON
    Json,

    /// Write each region to a file
    Dump {
        /// Destination directory (overrides the configuration)
        #[arg(short = 'D', long)]
        dump_dir: Option<PathBuf>,

        /// Print each written file
        #[arg(long)]
        list: bool,
    },
}

enum Action {
    Render(Format),
    Dump(RegionExtractor),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new(&cli.config)
        .load_or_default()
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config, cli.verbose);

    if let Command::Dump { dump_dir, list } = &cli.command {
        if dump_dir.is_some() {
            config.dump.directory = dump_dir.clone();
        }
        config.dump.verbose |= *list;
    }
    ConfigValidator::validate(&config).context("invalid configuration")?;

    // The dump directory is checked before any tree is touched
    let action = match &cli.command {
        Command::Info => Action::Render(Format::Info),
        Command::Tree { dot: false } => Action::Render(Format::Tree),
        Command::Tree { dot: true } => Action::Render(Format::Dot),
        Command::Walk => Action::Render(Format::Walk),
        Command::Json => Action::Render(Format::Json),
        Command::Dump { .. } => Action::Dump(RegionExtractor::new(&config.dump)?),
    };

    let snapshot = MemorySnapshot::open(&cli.snapshot)
        .with_context(|| format!("opening snapshot {}", cli.snapshot.display()))?;
    let filter = ProcessFilter {
        pids: cli.pids.clone(),
        name: cli.name.clone(),
    };
    let processes = filter.apply(snapshot.processes()?);
    info!(selected = processes.len(), "Processes selected");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let limits = config.walker.limits();

    match action {
        Action::Render(format) => {
            let views: Vec<ProcessView> = processes
                .iter()
                .map(|process| ProcessView::collect(process, &snapshot, limits))
                .collect();
            render::render(&mut out, format, &views, &snapshot)?;
        }
        Action::Dump(extractor) => {
            let results = extractor.dump_all(&processes, &snapshot, limits)?;
            write_dump_summary(&mut out, &processes, results, config.dump.verbose)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn init_logging(config: &Config, verbose: u8) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn write_dump_summary(
    out: &mut dyn Write,
    processes: &[Process],
    results: Vec<VadResult<ProcessDumpReport>>,
    verbose: bool,
) -> io::Result<()> {
    for (process, result) in processes.iter().zip(results) {
        writeln!(out, "Pid: {:6}", process.info.pid)?;
        let report = match result {
            Ok(report) => report,
            Err(err) => {
                writeln!(out, "{}", err)?;
                continue;
            }
        };

        writeln!(out, "{}", "*".repeat(render::BANNER_WIDTH))?;
        if verbose {
            for record in &report.written {
                writeln!(out, "Writing VAD for {}", record.path.display())?;
            }
        }
        for issue in &report.failed {
            writeln!(out, "Failed {:08x}-{:08x}: {}", issue.start, issue.end, issue.reason)?;
        }
        writeln!(
            out,
            "{} ({}): {} written, {} skipped, {} failed",
            report.name,
            report.pid,
            report.written.len(),
            report.skipped.len(),
            report.failed.len()
        )?;
        if let Some(notice) = render::walk_notice(&report.walk) {
            writeln!(out, "{}", notice)?;
        }
    }
    Ok(())
}
