use color_eyre::Result;
use tracing::instrument;

use stitch::splice;
use stitch::store::Store;

#[instrument(skip(store))]
pub fn exec(store: &Store) -> Result<()> {
    eprintln!("Identifying file fragments and their containment...");
    let summary = splice::splice(store)?;
    if summary.fragments == 0 {
        eprintln!("No file fragments found in the database.");
        return Ok(());
    }

    eprintln!(
        "Found {} unique file fragment(s); {} contained in other fragments.",
        summary.fragments, summary.contained
    );
    for (name, hash) in &summary.docs {
        eprintln!("  {name} -> {}...", hash.short());
    }
    eprintln!("Saved {} document recipe(s).", summary.docs.len());
    Ok(())
}
