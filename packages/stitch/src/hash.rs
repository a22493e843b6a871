//! Canonical hashing of JSON trees.
//!
//! Every node of a document is fingerprinted by the SHA-256 of a canonical
//! byte string. The canonical forms are the compatibility contract that makes
//! deduplication work across files and across runs:
//!
//! - object: `"{ k1:h1, k2:h2 }"` with member names sorted by code point and
//!   child fingerprints in hex; the empty object is `"{  }"` (two spaces).
//! - array: `"[ h0, h1 ]"` with elements in index order; the empty array is
//!   `"[  ]"`.
//! - primitive: the minimal JSON serialization of the scalar, UTF-8 encoded
//!   and never `\u`-escaped.
//!
//! The hasher is a pure function of the input tree; side effects go through a
//! [`Visitor`] which observes one event per composite node plus one event per
//! immediate child.

use color_eyre::{Result, eyre::bail};
use derive_more::Display;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

/// Reserved object member left behind by earlier ingestion runs.
///
/// Objects are hashed as if this member were absent, so re-ingesting a
/// previously processed file yields the fingerprints of the original.
pub const HASH_KEY: &str = "_sha256_hash";

/// A SHA-256 fingerprint in lowercase hex.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize)]
pub struct Sha256(String);

impl Sha256 {
    /// Hash a canonical byte string.
    pub fn from_canonical(text: impl AsRef<[u8]>) -> Self {
        use sha2::Digest as _;
        let mut hasher = sha2::Sha256::new();
        hasher.update(text.as_ref());
        let hash = hasher.finalize().to_vec();
        Self(hex::encode(hash))
    }

    /// Parse a fingerprint from its hex form, normalizing to lowercase.
    pub fn from_hex(text: impl AsRef<str>) -> Result<Self> {
        let bytes = match hex::decode(text.as_ref()) {
            Ok(bytes) => bytes,
            Err(err) => bail!("invalid fingerprint {:?}: {err}", text.as_ref()),
        };
        let len = bytes.len();
        if len != 32 {
            bail!("invalid fingerprint length: expected 32 bytes, got {len}");
        }
        Ok(Self(hex::encode(bytes)))
    }

    /// Wrap a fingerprint previously produced by this hasher, for example one
    /// read back from the store. The text is trusted as-is.
    pub fn from_stored(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// View the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first twelve hex characters, for progress messages.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl From<&Sha256> for Sha256 {
    fn from(hash: &Sha256) -> Self {
        hash.clone()
    }
}

impl AsRef<str> for Sha256 {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for Sha256 {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// The edge from a composite node to the child being visited.
#[derive(Clone, Copy, Debug)]
pub struct ParentLink<'a> {
    /// Fingerprint of the containing composite.
    pub hash: &'a Sha256,
    /// Member name (object) or decimal index (array) within the composite.
    pub child_key: &'a str,
}

/// A single traversal event emitted by the canonical hasher.
///
/// Composite nodes are announced once on their own (no parent link) and once
/// per enclosing composite (with a parent link); primitives are only ever
/// announced through their parent's child iteration, except for a document
/// whose root is itself a primitive.
#[derive(Clone, Copy, Debug)]
pub struct NodeEvent<'a> {
    pub hash: &'a Sha256,
    pub node: &'a Value,
    pub location: &'a str,
    pub is_primitive: bool,
    pub parent: Option<ParentLink<'a>>,
}

/// Consumes traversal events from the canonical hasher.
pub trait Visitor {
    fn visit(&mut self, event: NodeEvent<'_>);
}

/// Accumulates the set of all fingerprints observed during a traversal.
#[derive(Clone, Debug, Default)]
pub struct AnalysisVisitor {
    pub hashes: std::collections::BTreeSet<Sha256>,
}

impl Visitor for AnalysisVisitor {
    fn visit(&mut self, event: NodeEvent<'_>) {
        self.hashes.insert(event.hash.clone());
    }
}

/// Accumulates the row batches a full ingest writes to the store.
///
/// Index rows come from composite self-announcements and primitive events
/// (one row per node occurrence); graph rows from every parent link; data
/// rows from every primitive. Duplicate graph and data rows across files are
/// expected and deduplicated at insert time.
#[derive(Clone, Debug, Default)]
pub struct WriteVisitor {
    /// `(hash, location)` rows for `hash_index`.
    pub index_rows: Vec<(Sha256, String)>,
    /// `(parent_hash, child_key, child_hash)` rows for `hash_graph`.
    pub graph_rows: Vec<(Sha256, String, Sha256)>,
    /// `(hash, serialized_primitive)` rows for `hash_to_data`.
    pub data_rows: Vec<(Sha256, String)>,
}

impl WriteVisitor {
    /// Report whether the visitor observed anything at all.
    pub fn is_empty(&self) -> bool {
        self.index_rows.is_empty()
    }
}

impl Visitor for WriteVisitor {
    fn visit(&mut self, event: NodeEvent<'_>) {
        match event.parent {
            Some(link) => {
                self.graph_rows.push((
                    link.hash.clone(),
                    link.child_key.to_string(),
                    event.hash.clone(),
                ));
                // Composites already indexed themselves when announced on
                // their own; only primitives are indexed through the parent.
                if event.is_primitive {
                    self.index_rows
                        .push((event.hash.clone(), event.location.to_string()));
                }
            }
            None => {
                self.index_rows
                    .push((event.hash.clone(), event.location.to_string()));
            }
        }
        if event.is_primitive {
            self.data_rows
                .push((event.hash.clone(), event.node.to_string()));
        }
    }
}

/// Compute the canonical fingerprint of `value`, emitting traversal events.
///
/// `file_path` becomes the file component of every emitted location; the
/// document root has path `.`, object members append `.<key>`, and array
/// elements append `.[<index>]`.
#[instrument(name = "canonical_hash", skip(value, visitor))]
pub fn canonical_hash(value: &Value, visitor: &mut dyn Visitor, file_path: &str) -> Sha256 {
    hash_node(value, visitor, file_path, "")
}

fn hash_node(value: &Value, visitor: &mut dyn Visitor, file: &str, path: &str) -> Sha256 {
    match value {
        Value::Object(members) => {
            // Member iteration is already sorted by code point: the map is a
            // BTreeMap keyed by the member name. The reserved hash member is
            // stripped before anything else looks at the object.
            let children = members
                .iter()
                .filter(|(key, _)| key.as_str() != HASH_KEY)
                .map(|(key, child)| {
                    let child_path = format!("{path}.{key}");
                    let hash = hash_node(child, visitor, file, &child_path);
                    (key.as_str().to_string(), child, hash, child_path)
                })
                .collect::<Vec<_>>();

            let joined = children
                .iter()
                .map(|(key, _, hash, _)| format!("{key}:{hash}"))
                .join(", ");
            let hash = Sha256::from_canonical(format!("{{ {joined} }}"));
            announce(value, &hash, &children, visitor, file, path);
            hash
        }
        Value::Array(items) => {
            let children = items
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    let child_path = format!("{path}.[{index}]");
                    let hash = hash_node(child, visitor, file, &child_path);
                    (index.to_string(), child, hash, child_path)
                })
                .collect::<Vec<_>>();

            let joined = children.iter().map(|(_, _, hash, _)| hash.as_str()).join(", ");
            let hash = Sha256::from_canonical(format!("[ {joined} ]"));
            announce(value, &hash, &children, visitor, file, path);
            hash
        }
        primitive => {
            let hash = Sha256::from_canonical(primitive.to_string());
            // A document whose root is a primitive still gets announced;
            // interior primitives are announced by their parent instead.
            if path.is_empty() {
                let loc = location(file, path);
                visitor.visit(NodeEvent {
                    hash: &hash,
                    node: primitive,
                    location: &loc,
                    is_primitive: true,
                    parent: None,
                });
            }
            hash
        }
    }
}

/// Announce a composite node and then each of its immediate children.
fn announce(
    node: &Value,
    hash: &Sha256,
    children: &[(String, &Value, Sha256, String)],
    visitor: &mut dyn Visitor,
    file: &str,
    path: &str,
) {
    let loc = location(file, path);
    visitor.visit(NodeEvent {
        hash,
        node,
        location: &loc,
        is_primitive: false,
        parent: None,
    });
    for (key, child, child_hash, child_path) in children {
        let child_loc = location(file, child_path);
        visitor.visit(NodeEvent {
            hash: child_hash,
            node: child,
            location: &child_loc,
            is_primitive: !matches!(**child, Value::Object(_) | Value::Array(_)),
            parent: Some(ParentLink {
                hash,
                child_key: key,
            }),
        });
    }
}

fn location(file: &str, path: &str) -> String {
    if path.is_empty() {
        format!("{file}:.")
    } else {
        format!("{file}:{path}")
    }
}
