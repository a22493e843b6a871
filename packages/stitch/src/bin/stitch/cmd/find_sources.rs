use clap::Args;
use color_eyre::Result;
use colored::Colorize as _;
use tracing::instrument;

use stitch::analysis;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The name of the conceptual document to analyze (e.g., 'doc_1').
    doc_name: String,
}

#[instrument(skip(store))]
pub fn exec(store: &Store, options: Options) -> Result<()> {
    let Some(root) = analysis::doc_root(store, &options.doc_name)? else {
        eprintln!(
            "Error: Conceptual document '{}' not found. Run 'splice' first.",
            options.doc_name
        );
        return Ok(());
    };
    eprintln!("Found root hash: {}...", root.short());

    eprintln!("Traversing content graph for constituent hashes...");
    let constituents = analysis::constituent_hashes(store, &root)?;
    eprintln!(
        "Found {} unique hashes in the conceptual document.",
        constituents.len()
    );

    let files = analysis::source_files(store, &constituents)?;
    println!("{}", "--- Source Fragment Files ---".bold());
    for file in files {
        println!("  - {file}");
    }
    Ok(())
}
