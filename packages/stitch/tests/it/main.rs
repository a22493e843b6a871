use std::path::{Path, PathBuf};

use stitch::hash::{AnalysisVisitor, Sha256, canonical_hash};
use tempfile::TempDir;

mod pipeline;
mod search;

#[track_caller]
pub fn temporary_directory() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("create temporary directory");
    let path = dir.path().to_path_buf();
    (dir, path)
}

#[track_caller]
pub fn write_file(dir: &Path, name: &str, content: &str) {
    std::fs::create_dir_all(dir).expect("create data directory");
    std::fs::write(dir.join(name), content).expect("write data file");
}

/// Fingerprint a value without recording events anywhere.
#[track_caller]
pub fn fingerprint(value: &serde_json::Value) -> Sha256 {
    let mut visitor = AnalysisVisitor::default();
    canonical_hash(value, &mut visitor, "fingerprint")
}
