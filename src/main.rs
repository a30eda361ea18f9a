use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod format;

use format::OutputFormat;

/// Record fine-grained source edits and replay a file's evolution
///
/// recap reads the operation logs flushed under the history directory
/// (default .recap/history), groups them by project, package and file,
/// and reconstructs any file's text at any recorded moment.
///
/// QUICK START:
///
///   recap index                          # tree of recorded files
///   recap ops /Demo/src/org/Main.java    # a file's operations
///   recap replay /Demo/src/org/Main.java --at 1700000000000
///
/// Set RECAP_LOG=debug to see routing decisions on stderr.
#[derive(Parser)]
#[command(name = "recap")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'recap <command> --help' for more information on a specific command.")]
struct Cli {
    /// Workspace root
    #[arg(long, global = true, default_value = ".", env = "RECAP_ROOT")]
    root: PathBuf,

    /// Configuration file (default: <root>/.recap/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index and print the project / package / file tree
    Index {
        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// List the operations recorded for a file
    Ops {
        /// Logical path of the file, e.g. /Demo/src/org/Main.java
        path: String,

        /// Output format
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Print a file's text at a recorded moment
    Replay {
        /// Logical path of the file
        path: String,

        /// Focus the operation closest to this time (ms since the epoch)
        #[arg(long, conflicts_with = "index", required_unless_present = "index")]
        at: Option<u64>,

        /// Focus the operation at this position in the file's history
        #[arg(long)]
        index: Option<usize>,

        /// Include the history of the names this file was moved or renamed from
        #[arg(long)]
        lineage: bool,
    },
}

fn main() -> Result<()> {
    recap::telemetry::init();
    let cli = Cli::parse();
    let ctx = commands::Context::load(cli.root, cli.config.as_deref())?;

    match cli.command {
        Commands::Index { format } => commands::index(&ctx, format),
        Commands::Ops { path, format } => commands::ops(&ctx, &path, format),
        Commands::Replay {
            path,
            at,
            index,
            lineage,
        } => commands::replay(&ctx, &path, at, index, lineage),
    }
}
