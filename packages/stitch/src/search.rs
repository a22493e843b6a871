//! Full-text search over primitive leaves, joined back to their locations.

use std::collections::BTreeMap;

use color_eyre::{Result, eyre::Context};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::store::Store;

/// The outcome of a search: matches, or a description of why the query
/// itself could not run. Both serialize as a single JSON record.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum SearchReport {
    Matches(SearchMatches),
    Error(SearchError),
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchMatches {
    pub search_query: String,
    pub total_matches: usize,
    /// Location to the primitive values matched there, locations sorted.
    pub matches_by_location: BTreeMap<String, Vec<Value>>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchError {
    pub error: String,
    pub query: String,
    pub details: String,
    pub suggestion: String,
}

/// Run a full-text query and group the matches by location.
///
/// An invalid match expression is not an error of this function; it comes
/// back as [`SearchReport::Error`] so callers can emit it as data.
#[instrument(name = "search", skip(store))]
pub fn search(store: &Store, query: &str) -> Result<SearchReport> {
    let rows = match store.search_data(query) {
        Ok(rows) => rows,
        Err(err) => {
            return Ok(SearchReport::Error(SearchError {
                error: "Error during full-text search query.".to_string(),
                query: query.to_string(),
                details: format!("{err:#}"),
                suggestion: "Check your query syntax. Use quotes for phrases and operators \
                             like AND, OR, NOT."
                    .to_string(),
            }));
        }
    };

    let total_matches = rows.len();
    let mut matches_by_location: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (data, location) in rows {
        let value: Value = serde_json::from_str(&data)
            .with_context(|| format!("parse stored primitive at {location}"))?;
        matches_by_location.entry(location).or_default().push(value);
    }

    Ok(SearchReport::Matches(SearchMatches {
        search_query: query.to_string(),
        total_matches,
        matches_by_location,
    }))
}
