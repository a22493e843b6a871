use std::path::PathBuf;

use clap::Args;
use color_eyre::{Result, eyre::Context as _};
use colored::Colorize as _;
use tracing::instrument;

use stitch::analysis;
use stitch::store::Store;

#[derive(Clone, Args, Debug)]
pub struct Options {
    /// The name of the conceptual document to analyze (e.g., 'doc_1').
    doc_name: String,

    /// Optional path to write a CSV report.
    #[arg(short, long = "output-file")]
    output_file: Option<PathBuf>,
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
    eprintln!(
        "Analyzing '{}' from root hash {}...",
        options.doc_name,
        root.short()
    );

    let rows = analysis::coverage(store, &root)?;
    eprintln!("Compared {} contributing source file(s).", rows.len());

    match options.output_file {
        Some(path) => {
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("open CSV report {path:?}"))?;
            for row in &rows {
                writer.serialize(row).context("write CSV row")?;
            }
            writer.flush().context("flush CSV report")?;
            eprintln!("Wrote coverage report to {}.", path.display());
        }
        None => {
            println!("{}", "--- Coverage Analysis Results ---".bold());
            println!(
                "{:<70} | {:<30} | {:<25}",
                "Source Fragment", "Shared Hashes (Intersection)", "Different Hashes (XOR)"
            );
            println!("{}", "-".repeat(130));
            for row in &rows {
                println!(
                    "{:<70} | {:<30} | {:<25}",
                    row.source_fragment,
                    row.shared_hashes_intersection,
                    row.different_hashes_xor
                );
            }
        }
    }
    Ok(())
}
