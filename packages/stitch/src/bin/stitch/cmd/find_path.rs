use clap::Args;
use color_eyre::Result;
use tracing::instrument;

use stitch::analysis;
use stitch::hash::Sha256;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The hash of the containing (parent) fragment.
    #[arg(long)]
    parent_hash: String,

    /// The hash of the contained (child) fragment.
    #[arg(long)]
    child_hash: String,
}

#[instrument(skip(store))]
pub fn exec(store: &Store, options: Options) -> Result<()> {
    let parent = Sha256::from_hex(&options.parent_hash)?;
    let child = Sha256::from_hex(&options.child_hash)?;
    eprintln!(
        "Searching for path from parent ({}...) to child ({}...).",
        parent.short(),
        child.short()
    );

    match analysis::find_path(store, &parent, &child)? {
        Some(path) => println!("{path}"),
        None => {
            println!("no path found");
            eprintln!("Could not find a path linking the child hash back to the parent hash.");
        }
    }
    Ok(())
}
