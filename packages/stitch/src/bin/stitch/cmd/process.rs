use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;
use tracing::instrument;

use stitch::ingest;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The directory of files to process.
    target_directory: PathBuf,
}

#[instrument(skip(store))]
pub fn exec(store: &Store, options: Options) -> Result<()> {
    eprintln!(
        "Processing directory {} ...",
        options.target_directory.display()
    );
    let summary = ingest::ingest(store, &options.target_directory)?;
    eprintln!(
        "Processed {} file(s), skipped {}.",
        summary.processed, summary.skipped
    );
    Ok(())
}
