//! Selecting true document roots out of the ingested fragments.
//!
//! Every ingested file is a fragment; a fragment whose root value also occurs
//! inside some other fragment is "contained" and is not a document of its
//! own. Splicing selects the fragments that are never contained and records
//! them as named documents.

use std::collections::BTreeSet;

use color_eyre::{Result, eyre::Context};
use tap::Pipe as _;
use tracing::{debug, instrument};

use crate::hash::Sha256;
use crate::store::{Column, Delete, Insert, Op, Query, Request, Select, Store, Table};

/// What a splice run found and saved.
#[derive(Clone, Debug)]
pub struct SpliceSummary {
    /// Distinct fragment root fingerprints observed during ingestion.
    pub fragments: usize,
    /// Fragments that occur as a child inside another fragment.
    pub contained: usize,
    /// The saved documents, in label order.
    pub docs: Vec<(String, Sha256)>,
}

/// Recompute the named documents from the content graph.
///
/// Replaces the whole `reconstructed_docs` relation: true roots are labelled
/// `doc_1`, `doc_2`, ... in ascending fingerprint order, so repeated runs
/// over an unchanged graph produce identical labels. Commits on success;
/// when no fragments exist at all, the store is left untouched.
#[instrument(name = "splice", skip(store))]
pub fn splice(store: &Store) -> Result<SpliceSummary> {
    let fragments = fragment_roots(store)?;
    if fragments.is_empty() {
        return Ok(SpliceSummary {
            fragments: 0,
            contained: 0,
            docs: Vec::new(),
        });
    }

    let contained = contained_roots(store, &fragments)?;
    let docs = fragments
        .difference(&contained)
        .enumerate()
        .map(|(index, hash)| (format!("doc_{}", index + 1), hash.clone()))
        .collect::<Vec<_>>();
    debug!(
        fragments = fragments.len(),
        contained = contained.len(),
        docs = docs.len(),
        "selected true roots"
    );

    store.execute(Request::Delete(Delete {
        table: Table::ReconstructedDocs,
        filter: None,
    }))?;
    if !docs.is_empty() {
        store.execute(Request::Insert(Insert {
            table: Table::ReconstructedDocs,
            columns: vec![Column::DocName, Column::RootHash],
            rows: docs
                .iter()
                .map(|(name, hash)| vec![name.clone(), hash.as_str().to_string()])
                .collect(),
            ignore: false,
        }))?;
    }
    store.commit().context("save document recipes")?;

    Ok(SpliceSummary {
        fragments: fragments.len(),
        contained: contained.len(),
        docs,
    })
}

/// Distinct fingerprints observed at the root location of some file.
fn fragment_roots(store: &Store) -> Result<BTreeSet<Sha256>> {
    let rows = store
        .execute(Request::Query(
            Query::new(Table::HashIndex, [Select::Distinct(Column::Hash)])
                .filter(Column::Location, Op::Like("%:.".into())),
        ))?
        .into_rows()?;
    rows.into_iter()
        .flatten()
        .map(Sha256::from_stored)
        .collect::<BTreeSet<_>>()
        .pipe(Ok)
}

/// The subset of `fragments` that appears as a child of any node.
fn contained_roots(store: &Store, fragments: &BTreeSet<Sha256>) -> Result<BTreeSet<Sha256>> {
    let rows = store
        .execute(Request::Query(
            Query::new(Table::HashGraph, [Select::Distinct(Column::ChildHash)]).filter(
                Column::ChildHash,
                Op::In(
                    fragments
                        .iter()
                        .map(|hash| hash.as_str().to_string())
                        .collect(),
                ),
            ),
        ))?
        .into_rows()?;
    rows.into_iter()
        .flatten()
        .map(Sha256::from_stored)
        .collect::<BTreeSet<_>>()
        .pipe(Ok)
}
