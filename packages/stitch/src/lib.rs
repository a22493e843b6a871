//! Library for `stitch`.
//!
//! `stitch` is a content-addressable store for JSON documents: every node of
//! every ingested file is assigned a SHA-256 fingerprint of its canonical
//! form, so identical subtrees collapse to a single fingerprint no matter
//! which file they came from. The store records the resulting content graph
//! and supports reconstruction, splicing, coverage analysis, path finding,
//! and full-text search over it.

pub mod analysis;
pub mod hash;
pub mod ingest;
pub mod reconstruct;
pub mod search;
pub mod splice;
pub mod store;
