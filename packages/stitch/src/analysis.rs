//! Cross-document analyses over the content graph: constituent enumeration,
//! source attribution, coverage, and path finding.

use std::collections::{BTreeSet, VecDeque};

use color_eyre::{Result, eyre::ContextCompat};
use itertools::Itertools as _;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::hash::{AnalysisVisitor, Sha256, canonical_hash};
use crate::store::{Column, Op, Query, Request, Select, Store, Table};

/// Look up the root fingerprint of a named conceptual document.
pub fn doc_root(store: &Store, doc_name: &str) -> Result<Option<Sha256>> {
    let rows = store
        .execute(Request::Query(
            Query::new(Table::ReconstructedDocs, [Select::Column(Column::RootHash)])
                .filter(Column::DocName, Op::Eq(doc_name.to_string()))
                .limit(1),
        ))?
        .into_rows()?;
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .map(Sha256::from_stored))
}

/// Every fingerprint reachable from `root` via parent-to-child edges,
/// including `root` itself. Iterative and cycle-safe.
#[instrument(name = "constituent_hashes", skip(store))]
pub fn constituent_hashes(store: &Store, root: &Sha256) -> Result<BTreeSet<Sha256>> {
    let mut all = BTreeSet::new();
    let mut queue = VecDeque::from([root.clone()]);

    while let Some(current) = queue.pop_front() {
        if !all.insert(current.clone()) {
            continue;
        }
        let rows = store
            .execute(Request::Query(
                Query::new(Table::HashGraph, [Select::Column(Column::ChildHash)])
                    .filter(Column::ParentHash, Op::Eq(current.as_str().to_string())),
            ))?
            .into_rows()?;
        for row in rows {
            let child = row.into_iter().next().context("missing child_hash")?;
            queue.push_back(Sha256::from_stored(child));
        }
    }
    Ok(all)
}

/// The distinct source files that contributed any of `hashes`, sorted.
pub fn source_files(store: &Store, hashes: &BTreeSet<Sha256>) -> Result<Vec<String>> {
    let rows = store
        .execute(Request::Query(
            Query::new(Table::HashIndex, [Select::Column(Column::Location)]).filter(
                Column::Hash,
                Op::In(hashes.iter().map(|hash| hash.as_str().to_string()).collect()),
            ),
        ))?
        .into_rows()?;

    Ok(rows
        .into_iter()
        .flatten()
        .filter_map(|location| {
            location
                .split_once(':')
                .map(|(file, _)| file.to_string())
        })
        .unique()
        .sorted()
        .collect())
}

/// One source fragment's overlap with a conceptual document.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct CoverageRow {
    pub source_fragment: String,
    pub shared_hashes_intersection: usize,
    pub different_hashes_xor: usize,
}

/// Compare a conceptual document's constituent set against each contributing
/// source file, re-hashed from disk.
///
/// Rows are sorted by symmetric-difference size ascending, so the closest
/// match comes first. Files that can no longer be read or parsed are skipped
/// with a warning.
#[instrument(name = "coverage", skip(store))]
pub fn coverage(store: &Store, root: &Sha256) -> Result<Vec<CoverageRow>> {
    let doc_hashes = constituent_hashes(store, root)?;
    let files = source_files(store, &doc_hashes)?;

    let mut rows = Vec::new();
    for file in files {
        let source = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(err) => {
                warn!(%file, %err, "skipping unreadable source fragment");
                continue;
            }
        };
        let data: serde_json::Value = match serde_json::from_str(&source) {
            Ok(data) => data,
            Err(err) => {
                warn!(%file, %err, "skipping unparseable source fragment");
                continue;
            }
        };

        let mut visitor = AnalysisVisitor::default();
        canonical_hash(&data, &mut visitor, &file);
        rows.push(CoverageRow {
            source_fragment: file,
            shared_hashes_intersection: doc_hashes.intersection(&visitor.hashes).count(),
            different_hashes_xor: doc_hashes.symmetric_difference(&visitor.hashes).count(),
        });
    }

    rows.sort_by(|a, b| {
        a.different_hashes_xor
            .cmp(&b.different_hashes_xor)
            .then_with(|| a.source_fragment.cmp(&b.source_fragment))
    });
    Ok(rows)
}

/// Find the JQ-style path from `parent` down to `child`.
///
/// Searches breadth-first upward from the child along containment edges and
/// renders the accumulated keys once the parent is reached: `.key` for
/// member names, `[index]` for array positions. Returns `None` when no chain
/// of edges links the two fingerprints.
#[instrument(name = "find_path", skip(store))]
pub fn find_path(store: &Store, parent: &Sha256, child: &Sha256) -> Result<Option<String>> {
    let mut queue = VecDeque::from([(child.clone(), Vec::<String>::new())]);
    let mut visited = BTreeSet::from([child.clone()]);

    while let Some((current, segments)) = queue.pop_front() {
        if current == *parent {
            let joined = segments.iter().rev().join("");
            let trimmed = joined.strip_prefix('.').unwrap_or(&joined);
            return Ok(Some(format!(".{trimmed}")));
        }

        let rows = store
            .execute(Request::Query(
                Query::new(
                    Table::HashGraph,
                    [
                        Select::Column(Column::ParentHash),
                        Select::Column(Column::ChildKey),
                    ],
                )
                .filter(Column::ChildHash, Op::Eq(current.as_str().to_string())),
            ))?
            .into_rows()?;

        for row in rows {
            let mut cells = row.into_iter();
            let next_parent = Sha256::from_stored(cells.next().context("missing parent_hash")?);
            let key = cells.next().context("missing child_key")?;
            if visited.insert(next_parent.clone()) {
                let segment = if !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_digit()) {
                    format!("[{key}]")
                } else {
                    format!(".{key}")
                };
                let mut path = segments.clone();
                path.push(segment);
                queue.push_back((next_parent, path));
            }
        }
    }
    Ok(None)
}
