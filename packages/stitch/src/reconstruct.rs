//! Rebuilding document values from root fingerprints.

use std::collections::{HashMap, HashSet};

use color_eyre::{
    Result,
    eyre::{Context, ContextCompat, bail, eyre},
};
use serde_json::{Value, json};
use tracing::instrument;

use crate::hash::Sha256;
use crate::store::{Column, Op, Query, Request, Select, Store, Table};

enum Frame {
    /// Fetch the children of a fingerprint, or its primitive data.
    Expand(Sha256),
    /// Assemble a composite once every child is in the memo.
    Build {
        hash: Sha256,
        children: Vec<(String, Sha256)>,
    },
}

/// Rebuild the value tree rooted at `root`.
///
/// Shared subtrees are built once via a memo keyed by fingerprint, and the
/// traversal uses an explicit stack so document depth is not bounded by the
/// call stack. A missing primitive does not fail the reconstruction; it
/// surfaces as an in-document error marker.
#[instrument(name = "reconstruct", skip(store))]
pub fn reconstruct(store: &Store, root: &Sha256) -> Result<Value> {
    let mut memo: HashMap<Sha256, Value> = HashMap::new();
    let mut expanded: HashSet<Sha256> = HashSet::new();
    let mut stack = vec![Frame::Expand(root.clone())];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Expand(hash) => {
                // The expanded set keeps a (malformed) cyclic graph from
                // looping; the cycle then surfaces as a missing-child error
                // at assembly.
                if memo.contains_key(&hash) || !expanded.insert(hash.clone()) {
                    continue;
                }
                let children = children_of(store, &hash)?;
                if children.is_empty() {
                    let value = primitive_of(store, &hash)?;
                    memo.insert(hash, value);
                } else {
                    let pending = children
                        .iter()
                        .filter(|(_, child)| !memo.contains_key(child))
                        .map(|(_, child)| Frame::Expand(child.clone()))
                        .collect::<Vec<_>>();
                    // LIFO: every child expansion pops before the build.
                    stack.push(Frame::Build { hash, children });
                    stack.extend(pending);
                }
            }
            Frame::Build { hash, children } => {
                let value = assemble(&memo, &children)?;
                memo.insert(hash, value);
            }
        }
    }

    memo.remove(root)
        .ok_or_else(|| eyre!("no value reconstructed for {root}"))
}

fn children_of(store: &Store, hash: &Sha256) -> Result<Vec<(String, Sha256)>> {
    let rows = store
        .execute(Request::Query(
            Query::new(
                Table::HashGraph,
                [
                    Select::Column(Column::ChildKey),
                    Select::Column(Column::ChildHash),
                ],
            )
            .filter(Column::ParentHash, Op::Eq(hash.as_str().to_string())),
        ))?
        .into_rows()?;

    rows.into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            let key = cells.next().context("missing child_key")?;
            let child = cells.next().context("missing child_hash")?;
            Ok((key, Sha256::from_stored(child)))
        })
        .collect()
}

fn primitive_of(store: &Store, hash: &Sha256) -> Result<Value> {
    let rows = store
        .execute(Request::Query(
            Query::new(Table::HashToData, [Select::Column(Column::Data)])
                .filter(Column::Hash, Op::Eq(hash.as_str().to_string()))
                .limit(1),
        ))?
        .into_rows()?;

    match rows.into_iter().next().and_then(|row| row.into_iter().next()) {
        Some(data) => {
            serde_json::from_str(&data).with_context(|| format!("parse stored primitive {data:?}"))
        }
        None => Ok(json!({
            "error": "Primitive data not found for hash",
            "hash": hash.as_str(),
        })),
    }
}

fn assemble(memo: &HashMap<Sha256, Value>, children: &[(String, Sha256)]) -> Result<Value> {
    let built = |hash: &Sha256| -> Result<Value> {
        memo.get(hash)
            .cloned()
            .ok_or_else(|| eyre!("child {hash} missing from memo"))
    };

    let is_array = children
        .iter()
        .all(|(key, _)| !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_digit()));
    if is_array {
        let mut items = vec![Value::Null; children.len()];
        for (key, child) in children {
            let index = key
                .parse::<usize>()
                .with_context(|| format!("parse array index {key:?}"))?;
            if index >= items.len() {
                bail!("array index {index} out of bounds for {} children", items.len());
            }
            items[index] = built(child)?;
        }
        Ok(Value::Array(items))
    } else {
        let members = children
            .iter()
            .map(|(key, child)| Ok((key.clone(), built(child)?)))
            .collect::<Result<serde_json::Map<_, _>>>()?;
        Ok(Value::Object(members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{WriteVisitor, canonical_hash};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ingested(doc: &Value) -> (Store, Sha256) {
        let store = Store::in_memory().unwrap();
        let mut visitor = WriteVisitor::default();
        let root = canonical_hash(doc, &mut visitor, "doc.json");
        store.save_ingest(&visitor).unwrap();
        (store, root)
    }

    #[test]
    fn round_trips_a_nested_document() {
        let doc = json!({
            "title": "fragment",
            "tags": ["a", "b"],
            "meta": {"version": 3, "published": true, "extra": null},
        });
        let (store, root) = ingested(&doc);
        assert_eq!(reconstruct(&store, &root).unwrap(), doc);
    }

    #[test]
    fn round_trips_a_primitive_root() {
        let doc = json!(42);
        let (store, root) = ingested(&doc);
        assert_eq!(reconstruct(&store, &root).unwrap(), doc);
    }

    #[test]
    fn single_index_key_builds_an_array() {
        let doc = json!(["only"]);
        let (store, root) = ingested(&doc);
        assert_eq!(reconstruct(&store, &root).unwrap(), json!(["only"]));
    }

    #[test]
    fn shared_subtrees_are_rebuilt_in_place() {
        let doc = json!({"left": {"v": [1, 2]}, "right": {"v": [1, 2]}});
        let (store, root) = ingested(&doc);
        assert_eq!(reconstruct(&store, &root).unwrap(), doc);
    }

    #[test]
    fn missing_primitive_becomes_an_error_marker() {
        let store = Store::in_memory().unwrap();
        let absent = Sha256::from_canonical("never ingested");
        let value = reconstruct(&store, &absent).unwrap();
        assert_eq!(
            value,
            json!({
                "error": "Primitive data not found for hash",
                "hash": absent.as_str(),
            })
        );
    }
}
