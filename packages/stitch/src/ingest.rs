//! Directory ingestion: walk a tree of JSON files and record every node
//! fingerprint in the store.
//!
//! Ingestion is a full rebuild, not an incremental update: the primary
//! relations are truncated, the freshly collected batches are inserted, the
//! full-text index is rebuilt, and the whole replacement commits once at the
//! end. An interrupted run therefore leaves the store at either the old or
//! the new state, never in between.

use std::path::Path;

use color_eyre::{Result, eyre::Context};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::hash::{WriteVisitor, canonical_hash};
use crate::store::Store;

/// Files with these suffixes are never ingested: the store itself, and the
/// tool's own sources when run against its own tree.
pub const RESERVED_SUFFIXES: &[&str] = &[".db", ".rs"];

/// Counts reported after an ingest run.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct IngestSummary {
    pub processed: usize,
    pub skipped: usize,
}

/// Ingest every JSON file under `target`, replacing the store contents.
///
/// Files are visited in a deterministic order (sorted per directory). A file
/// that cannot be read or parsed is skipped with a log line and never aborts
/// the run; a store failure does. Each ingested file is rewritten in place,
/// pretty-printed and semantically unchanged.
#[instrument(name = "ingest", skip(store, target), fields(target = %target.as_ref().display()))]
pub fn ingest(store: &Store, target: impl AsRef<Path>) -> Result<IngestSummary> {
    let mut visitor = WriteVisitor::default();
    let mut summary = IngestSummary::default();

    for entry in WalkDir::new(target.as_ref()).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            debug!(path = %entry.path().display(), "processing directory");
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if RESERVED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                info!(path = %path.display(), %err, "skipped (unreadable)");
                summary.skipped += 1;
                continue;
            }
        };
        if content.trim().is_empty() {
            info!(path = %path.display(), "skipped (empty)");
            summary.skipped += 1;
            continue;
        }
        let data: Value = match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(err) => {
                info!(path = %path.display(), %err, "skipped (not JSON)");
                summary.skipped += 1;
                continue;
            }
        };

        let relative = repo_relative(path);
        canonical_hash(&data, &mut visitor, &relative);

        // Re-emit the document pretty-printed; its meaning is unchanged and
        // no hash members are injected.
        let pretty =
            serde_json::to_string_pretty(&data).with_context(|| format!("serialize {relative}"))?;
        if let Err(err) = std::fs::write(path, pretty) {
            warn!(path = %path.display(), %err, "could not rewrite file");
            summary.skipped += 1;
            continue;
        }

        debug!(path = %relative, "processed as JSON");
        summary.processed += 1;
    }

    if visitor.is_empty() {
        info!("no data to save");
        return Ok(summary);
    }

    info!(
        index_rows = visitor.index_rows.len(),
        graph_rows = visitor.graph_rows.len(),
        data_rows = visitor.data_rows.len(),
        "saving collected data"
    );
    store.clear_primary().context("clear previous ingest")?;
    store.save_ingest(&visitor).context("save collected data")?;
    store.commit().context("commit ingest")?;
    Ok(summary)
}

/// The path recorded in locations: relative to the working directory when
/// the target lives under it, as given otherwise.
fn repo_relative(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(&cwd).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}
