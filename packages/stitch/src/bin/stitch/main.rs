//! The binary entrypoint for `stitch`, the content-addressable JSON store.

use std::path::PathBuf;

use clap::{CommandFactory as _, Parser, Subcommand, crate_version};
use color_eyre::Result;
use stitch::store::Store;
use tracing_subscriber::util::SubscriberInitExt as _;

// Since this is a binary crate, we need to ensure these modules aren't pub
// so that they can correctly warn about dead code.
mod cmd;
mod log;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "stitch",
    about = "Content-addressable storage and analysis for JSON documents",
    version = crate_version!(),
)]
struct TopLevelFlags {
    #[command(subcommand)]
    command: Command,

    /// Path to the SQLite database file.
    #[arg(long, global = true, default_value = "content_addressing.db")]
    db: PathBuf,

    /// Emit flamegraph profiling data
    #[arg(short, long, hide(true), global = true)]
    profile: Option<PathBuf>,

    /// When to colorize output
    #[arg(long, value_enum, global = true, default_value_t = log::WhenColor::Auto)]
    color: log::WhenColor,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Process a directory of files to build or rebuild the database
    Process(cmd::process::Options),

    /// Find true document roots and save their reconstruction recipes
    Splice,

    /// Reconstruct a full JSON document from a root hash
    Reconstruct(cmd::reconstruct::Options),

    /// Rehydrate and print a conceptual document from the database
    Export(cmd::export::Options),

    /// Calculate content coverage for a conceptual document and its sources
    Coverage(cmd::coverage::Options),

    /// Find original source files for a conceptual document
    FindSources(cmd::find_sources::Options),

    /// Find the JQ-style path between two fragment hashes
    FindPath(cmd::find_path::Options),

    /// Full-text search over primitive values
    Search(cmd::search::Options),

    /// Render the CLI reference into a README template
    MakeReadme(cmd::readme::Options),
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let top = TopLevelFlags::parse();

    let (logger, _flame_guard) = log::make_logger(std::io::stderr, top.profile.clone(), top.color)?;
    logger.init();

    match top.command {
        Command::Process(opts) => {
            let store = Store::open(&top.db)?;
            cmd::process::exec(&store, opts)
        }
        Command::Splice => {
            let store = Store::open(&top.db)?;
            cmd::splice::exec(&store)
        }
        Command::Reconstruct(opts) => {
            let store = Store::open_read_only(&top.db)?;
            cmd::reconstruct::exec(&store, opts)
        }
        Command::Export(opts) => {
            let store = Store::open_read_only(&top.db)?;
            cmd::export::exec(&store, opts)
        }
        Command::Coverage(opts) => {
            let store = Store::open_read_only(&top.db)?;
            cmd::coverage::exec(&store, opts)
        }
        Command::FindSources(opts) => {
            let store = Store::open_read_only(&top.db)?;
            cmd::find_sources::exec(&store, opts)
        }
        Command::FindPath(opts) => {
            let store = Store::open_read_only(&top.db)?;
            cmd::find_path::exec(&store, opts)
        }
        Command::Search(opts) => {
            let store = Store::open_read_only(&top.db)?;
            cmd::search::exec(&store, opts)
        }
        Command::MakeReadme(opts) => cmd::readme::exec(TopLevelFlags::command(), opts),
    }
}
