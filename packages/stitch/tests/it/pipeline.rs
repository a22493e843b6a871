//! End-to-end scenarios: ingest a directory, splice, and consume the graph.

use color_eyre::Result;
use pretty_assertions::assert_eq;
use serde_json::json;
use stitch::store::{Column, Query, Request, Select, Store, Table};
use stitch::{analysis, ingest, reconstruct, splice};

use crate::{fingerprint, temporary_directory, write_file};

fn rows(store: &Store, table: Table, select: &[Column]) -> Vec<Vec<String>> {
    store
        .execute(Request::Query(Query::new(
            table,
            select.iter().copied().map(Select::Column).collect::<Vec<_>>(),
        )))
        .expect("query table")
        .into_rows()
        .expect("rows outcome")
}

#[test_log::test]
fn basic_ingest_records_every_node() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"x": 1, "y": [2, 3]}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;

    assert_eq!(rows(&store, Table::HashIndex, &[Column::Hash]).len(), 5);
    assert_eq!(rows(&store, Table::HashGraph, &[Column::ParentHash]).len(), 4);
    assert_eq!(rows(&store, Table::HashToData, &[Column::Hash]).len(), 3);

    let doc = json!({"x": 1, "y": [2, 3]});
    let rebuilt = reconstruct::reconstruct(&store, &fingerprint(&doc))?;
    assert_eq!(rebuilt, doc);
    Ok(())
}

#[test_log::test]
fn key_order_invariance_collapses_to_one_document() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"a": 1, "b": 2}"#);
    write_file(&data, "b.json", r#"{"b": 2, "a": 1}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;
    let summary = splice::splice(&store)?;
    assert_eq!(summary.docs.len(), 1);

    let docs = rows(&store, Table::ReconstructedDocs, &[Column::DocName]);
    assert_eq!(docs, vec![vec!["doc_1".to_string()]]);

    // Both file locations witness the shared root fingerprint.
    let shared = fingerprint(&json!({"a": 1, "b": 2}));
    let locations = rows(&store, Table::HashIndex, &[Column::Hash, Column::Location])
        .into_iter()
        .filter(|row| row[0] == shared.as_str())
        .filter(|row| row[1].ends_with(":."))
        .count();
    assert_eq!(locations, 2);
    Ok(())
}

#[test_log::test]
fn contained_fragments_are_spliced_out() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "big.json", r#"{"inner": {"v": [1, 2]}}"#);
    write_file(&data, "small.json", r#"{"v": [1, 2]}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;
    let summary = splice::splice(&store)?;

    assert_eq!(summary.fragments, 2);
    assert_eq!(summary.contained, 1);
    let docs = rows(
        &store,
        Table::ReconstructedDocs,
        &[Column::DocName, Column::RootHash],
    );
    let big_root = fingerprint(&json!({"inner": {"v": [1, 2]}}));
    assert_eq!(
        docs,
        vec![vec!["doc_1".to_string(), big_root.as_str().to_string()]]
    );
    Ok(())
}

#[test_log::test]
fn path_finding_names_the_containment_member() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "big.json", r#"{"inner": {"v": [1, 2]}}"#);
    write_file(&data, "small.json", r#"{"v": [1, 2]}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;

    let parent = fingerprint(&json!({"inner": {"v": [1, 2]}}));
    let child = fingerprint(&json!({"v": [1, 2]}));
    let path = analysis::find_path(&store, &parent, &child)?;
    assert_eq!(path.as_deref(), Some(".inner"));

    let reversed = analysis::find_path(&store, &child, &parent)?;
    assert_eq!(reversed, None);
    Ok(())
}

#[test_log::test]
fn coverage_ranks_exact_sources_first() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "whole.json", r#"{"part": {"v": [1, 2]}}"#);
    write_file(&data, "piece.json", r#"{"v": [1, 2]}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;
    splice::splice(&store)?;

    let doc_root = analysis::doc_root(&store, "doc_1")?.expect("spliced document");
    let report = analysis::coverage(&store, &doc_root)?;

    assert_eq!(report.len(), 2);
    assert!(report[0].source_fragment.ends_with("whole.json"));
    assert_eq!(report[0].shared_hashes_intersection, 5);
    assert_eq!(report[0].different_hashes_xor, 0);
    assert!(report[1].source_fragment.ends_with("piece.json"));
    assert_eq!(report[1].shared_hashes_intersection, 4);
    assert_eq!(report[1].different_hashes_xor, 1);
    Ok(())
}

#[test_log::test]
fn find_sources_lists_every_contributing_file() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "whole.json", r#"{"part": {"v": [1, 2]}}"#);
    write_file(&data, "piece.json", r#"{"v": [1, 2]}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;
    splice::splice(&store)?;

    let doc_root = analysis::doc_root(&store, "doc_1")?.expect("spliced document");
    let constituents = analysis::constituent_hashes(&store, &doc_root)?;
    let files = analysis::source_files(&store, &constituents)?;

    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|file| file.ends_with("piece.json")));
    assert!(files.iter().any(|file| file.ends_with("whole.json")));
    Ok(())
}

#[test_log::test]
fn splice_is_stable_without_reingestion() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"x": [1, 2, 3]}"#);
    write_file(&data, "b.json", r#""standalone""#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;

    splice::splice(&store)?;
    let first = rows(
        &store,
        Table::ReconstructedDocs,
        &[Column::DocName, Column::RootHash],
    );
    splice::splice(&store)?;
    let second = rows(
        &store,
        Table::ReconstructedDocs,
        &[Column::DocName, Column::RootHash],
    );

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    Ok(())
}

#[test_log::test]
fn primitive_root_documents_are_first_class() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "n.json", "42");

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;
    let summary = splice::splice(&store)?;
    assert_eq!(summary.docs.len(), 1);

    let rebuilt = reconstruct::reconstruct(&store, &summary.docs[0].1)?;
    assert_eq!(rebuilt, json!(42));
    Ok(())
}

#[test_log::test]
fn ingested_state_survives_reopen_read_only() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"k": "v"}"#);
    let db = root.join("store.db");

    {
        let store = Store::open(&db)?;
        ingest::ingest(&store, &data)?;
    }

    let store = Store::open_read_only(&db)?;
    assert_eq!(rows(&store, Table::HashIndex, &[Column::Hash]).len(), 2);
    let doc = json!({"k": "v"});
    assert_eq!(reconstruct::reconstruct(&store, &fingerprint(&doc))?, doc);
    Ok(())
}
