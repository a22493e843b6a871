use clap::Args;
use color_eyre::Result;
use tracing::instrument;

use stitch::hash::Sha256;
use stitch::reconstruct;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The root hash of the document to reconstruct.
    hash: String,
}

#[instrument(skip(store))]
pub fn exec(store: &Store, options: Options) -> Result<()> {
    let root = Sha256::from_hex(&options.hash)?;
    eprintln!("Reconstructing document from root hash {}...", root.short());

    let doc = reconstruct::reconstruct(store, &root)?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}
