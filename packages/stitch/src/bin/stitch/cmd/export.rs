use clap::Args;
use color_eyre::Result;
use tracing::instrument;

use stitch::analysis;
use stitch::reconstruct;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The name of the document to export (e.g., 'doc_1').
    doc_name: String,
}

#[instrument(skip(store))]
pub fn exec(store: &Store, options: Options) -> Result<()> {
    let Some(root) = analysis::doc_root(store, &options.doc_name)? else {
        eprintln!(
            "Error: Document '{}' not found in the database.",
            options.doc_name
        );
        eprintln!("Run the 'splice' command first to generate conceptual documents.");
        return Ok(());
    };

    eprintln!(
        "Exporting '{}' from root hash {}...",
        options.doc_name,
        root.short()
    );
    let doc = reconstruct::reconstruct(store, &root)?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
