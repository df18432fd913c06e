//! portage - concurrent file operations across storage backends.
//!
//! Usage:
//!   portage cp SOURCE... DEST    Copy files and directories
//!   portage mv SOURCE... DEST    Move files and directories
//!   portage rm SOURCE...         Delete files and directories
//!   portage --help               Show help
//!
//! Sources inside a zip archive are addressed as `archive.zip!inner/path`
//! and are read-only.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use tracing_subscriber::EnvFilter;

use portage_ops::{FileOperator, OpContext, OpOptions, OperationOutcome, ProgressSnapshot};
use portage_vfs::{VfsPath, ZipBackend};

#[derive(Parser)]
#[command(
    name = "portage",
    version,
    about = "Copy, move, and delete across storage backends",
    long_about = "portage runs file operations with progress reporting and \
                  cancellation.\n\nLocal paths are used as-is; paths inside a \
                  zip archive are written as `archive.zip!inner/path` and are \
                  read-only sources."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy files and directories into a destination directory
    Cp {
        /// Source paths (last argument is the destination directory)
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,

        /// Overwrite existing destinations instead of skipping them
        #[arg(short, long)]
        force: bool,

        /// Show a progress line on stderr
        #[arg(short = 'P', long)]
        progress: bool,

        /// Output format for the final summary
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Move files and directories into a destination directory
    Mv {
        /// Source paths (last argument is the destination directory)
        #[arg(required = true, num_args = 2..)]
        paths: Vec<String>,

        /// Overwrite existing destinations instead of skipping them
        #[arg(short, long)]
        force: bool,

        /// Show a progress line on stderr
        #[arg(short = 'P', long)]
        progress: bool,

        /// Output format for the final summary
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete files and directories
    Rm {
        /// Paths to delete
        #[arg(required = true)]
        paths: Vec<String>,

        /// Show a progress line on stderr
        #[arg(short = 'P', long)]
        progress: bool,

        /// Output format for the final summary
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Command::Cp {
            paths,
            force,
            progress,
            format,
        } => run_transfer(Transfer::Copy, &paths, force, progress, format).await?,
        Command::Mv {
            paths,
            force,
            progress,
            format,
        } => run_transfer(Transfer::Move, &paths, force, progress, format).await?,
        Command::Rm {
            paths,
            progress,
            format,
        } => run_delete(&paths, progress, format).await?,
    };

    if outcome.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

enum Transfer {
    Copy,
    Move,
}

/// Run a copy or move and print the summary.
async fn run_transfer(
    kind: Transfer,
    paths: &[String],
    force: bool,
    progress: bool,
    format: OutputFormat,
) -> Result<OperationOutcome> {
    let (dest_arg, source_args) = paths
        .split_last()
        .ok_or_else(|| eyre!("missing destination"))?;
    let sources = parse_paths(source_args)?;
    let dest_dir = parse_vfs_path(dest_arg)?;
    if !dest_dir.is_dir() {
        return Err(eyre!("destination is not a directory: {dest_arg}"));
    }

    let operator = build_operator(progress);
    let ctx = OpContext::new();
    let mut options = OpOptions::new();
    if force {
        options = options.with_overwrite();
    }

    let handle = match kind {
        Transfer::Copy => operator.perform_copy(sources, dest_dir, options, ctx),
        Transfer::Move => operator.perform_move(sources, dest_dir, options, ctx),
    };
    let outcome = handle.await?;

    report(&outcome, progress, format)?;
    Ok(outcome)
}

/// Run a delete and print the summary.
async fn run_delete(
    paths: &[String],
    progress: bool,
    format: OutputFormat,
) -> Result<OperationOutcome> {
    let sources = parse_paths(paths)?;

    let operator = build_operator(progress);
    let ctx = OpContext::new();
    let handle = operator.perform_delete(sources, OpOptions::new(), ctx);
    let outcome = handle.await?;

    report(&outcome, progress, format)?;
    Ok(outcome)
}

fn build_operator(progress: bool) -> FileOperator {
    let operator = FileOperator::default();
    if progress {
        operator.with_observer(Arc::new(render_progress))
    } else {
        operator
    }
}

fn report(outcome: &OperationOutcome, progress: bool, format: OutputFormat) -> Result<()> {
    if progress {
        // Terminate the \r progress line.
        eprintln!();
    }
    match format {
        OutputFormat::Text => println!("{}", outcome.summary()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
    }
    Ok(())
}

/// Render one progress snapshot as a single rewritten stderr line.
fn render_progress(snap: ProgressSnapshot) {
    const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
    let spin = SPINNER[(snap.animation_tick % SPINNER.len() as u64) as usize];

    let bytes = match snap.byte_progress {
        Some((done, total)) => format!(" ({} / {})", format_size(done), format_size(total)),
        None => String::new(),
    };
    let item = if snap.current_item.is_empty() {
        snap.label.clone()
    } else {
        snap.current_item.clone()
    };
    eprint!(
        "\r{spin} {} {}/{} {item}{bytes}    ",
        snap.kind, snap.processed_items, snap.total_items
    );
}

fn parse_paths(args: &[String]) -> Result<Vec<VfsPath>> {
    args.iter().map(|arg| parse_vfs_path(arg)).collect()
}

/// Parse a path argument, routing `archive.zip!inner/path` through the
/// archive backend and everything else to the local backend.
fn parse_vfs_path(arg: &str) -> Result<VfsPath> {
    if let Some((archive, inner)) = arg.split_once('!') {
        if archive.ends_with(".zip") {
            let backend = ZipBackend::open(PathBuf::from(archive))?;
            return Ok(VfsPath::new(backend, PathBuf::from("/").join(inner)));
        }
    }
    Ok(VfsPath::local(PathBuf::from(arg)))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
