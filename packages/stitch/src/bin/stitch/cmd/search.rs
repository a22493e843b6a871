use clap::Args;
use color_eyre::Result;
use tracing::instrument;

use stitch::search;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The full-text query; use quotes for phrases and AND, OR, NOT to combine terms.
    query: String,
}

#[instrument(skip(store))]
pub fn exec(store: &Store, options: Options) -> Result<()> {
    eprintln!("Searching for snippets matching: '{}'", options.query);
    let report = search::search(store, &options.query)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
