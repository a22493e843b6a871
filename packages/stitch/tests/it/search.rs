//! Full-text search over an ingested directory.

use std::collections::BTreeMap;

use color_eyre::Result;
use pretty_assertions::assert_eq;
use serde_json::json;
use stitch::search::{SearchReport, search};
use stitch::store::Store;
use stitch::{ingest, splice};

use crate::{temporary_directory, write_file};

#[test_log::test]
fn search_joins_matches_back_to_locations() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"msg": "hello world"}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;

    let report = search(&store, "hello")?;
    let SearchReport::Matches(matches) = report else {
        panic!("expected matches");
    };
    assert_eq!(matches.search_query, "hello");
    assert_eq!(matches.total_matches, 1);

    let (location, values) = matches
        .matches_by_location
        .iter()
        .next()
        .expect("one location");
    assert!(location.ends_with("a.json:.msg"));
    assert_eq!(values, &vec![json!("hello world")]);
    Ok(())
}

#[test_log::test]
fn search_index_is_rebuilt_on_reingest() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"msg": "hello world"}"#);
    let db = root.join("store.db");

    {
        let store = Store::open(&db)?;
        ingest::ingest(&store, &data)?;
    }
    write_file(&data, "a.json", r#"{"msg": "goodbye moon"}"#);
    {
        let store = Store::open(&db)?;
        ingest::ingest(&store, &data)?;
        splice::splice(&store)?;
    }

    let store = Store::open_read_only(&db)?;
    let SearchReport::Matches(stale) = search(&store, "hello")? else {
        panic!("expected matches");
    };
    assert_eq!(stale.total_matches, 0);

    let SearchReport::Matches(fresh) = search(&store, "goodbye")? else {
        panic!("expected matches");
    };
    assert_eq!(fresh.total_matches, 1);
    Ok(())
}

#[test_log::test]
fn invalid_query_syntax_is_reported_as_data() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"msg": "hello"}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;

    let report = search(&store, "AND AND (")?;
    let SearchReport::Error(error) = report else {
        panic!("expected an error record");
    };
    assert_eq!(error.query, "AND AND (");
    assert!(error.suggestion.contains("query syntax"));

    let rendered = serde_json::to_value(&SearchReport::Error(error))?;
    assert_eq!(
        rendered
            .as_object()
            .expect("object record")
            .keys()
            .collect::<Vec<_>>(),
        vec!["details", "error", "query", "suggestion"],
    );
    Ok(())
}

#[test_log::test]
fn phrase_queries_match_whole_phrases() -> Result<()> {
    let (_dir, root) = temporary_directory();
    let data = root.join("data");
    write_file(&data, "a.json", r#"{"a": "alpha beta", "b": "beta alpha"}"#);

    let store = Store::open(root.join("store.db"))?;
    ingest::ingest(&store, &data)?;

    let SearchReport::Matches(phrase) = search(&store, "\"alpha beta\"")? else {
        panic!("expected matches");
    };
    assert_eq!(phrase.total_matches, 1);
    let locations: BTreeMap<_, _> = phrase.matches_by_location;
    assert!(
        locations
            .keys()
            .all(|location| location.ends_with("a.json:.a"))
    );
    Ok(())
}
