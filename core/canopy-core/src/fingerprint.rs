//! Content fingerprints for cache invalidation.
//!
//! A fingerprint is a hex MD5 digest over a canonical, length-prefixed byte
//! stream. Identical inputs always produce identical fingerprints; wall-clock
//! fields such as `WorktreeChanges::last_updated` are never part of the input.

use crate::types::{FileStatus, WorktreeChanges};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::UNIX_EPOCH;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental fingerprint over labelled fields.
pub struct FingerprintBuilder {
    ctx: md5::Context,
}

impl Default for FingerprintBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
        }
    }

    /// Adds one field. Label and value are length-prefixed so adjacent
    /// fields can never run together into the same byte stream.
    pub fn field(&mut self, label: &str, value: impl AsRef<[u8]>) -> &mut Self {
        let value = value.as_ref();
        self.ctx.consume((label.len() as u64).to_le_bytes());
        self.ctx.consume(label.as_bytes());
        self.ctx.consume((value.len() as u64).to_le_bytes());
        self.ctx.consume(value);
        self
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint(format!("{:x}", self.ctx.compute()))
    }
}

/// Fingerprint of a change set plus the diff that will be prompted.
pub fn fingerprint_changes(changes: &WorktreeChanges, diff: &str, model_tag: &str) -> Fingerprint {
    let mut builder = FingerprintBuilder::new();
    builder.field("model", model_tag);
    for change in &changes.changes {
        builder
            .field("path", &change.path)
            .field("status", change.status.as_str())
            .field("insertions", change.insertions.to_le_bytes())
            .field("deletions", change.deletions.to_le_bytes());
    }
    builder.field("diff", diff);

    // Untracked files appear in the diff by name only.
    let untracked: Vec<&str> = changes
        .changes
        .iter()
        .filter(|c| c.status == FileStatus::Untracked)
        .map(|c| c.path.as_str())
        .collect();
    if !untracked.is_empty() {
        builder.field(
            "untracked",
            fingerprint_files(&changes.root_path, &untracked).as_str(),
        );
    }
    builder.finish()
}

/// Fingerprint over size + mtime of files under `root`.
///
/// Missing files contribute a fixed marker so deleting a file also changes
/// the fingerprint.
pub fn fingerprint_files<P: AsRef<str>>(root: &Path, paths: &[P]) -> Fingerprint {
    let mut sorted: Vec<&str> = paths.iter().map(|p| p.as_ref()).collect();
    sorted.sort_unstable();

    let mut builder = FingerprintBuilder::new();
    for path in sorted {
        builder.field("path", path);
        match std::fs::metadata(root.join(path)) {
            Ok(metadata) => {
                let mtime = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                builder
                    .field("size", metadata.len().to_le_bytes())
                    .field("mtime", mtime.to_le_bytes());
            }
            Err(_) => {
                builder.field("missing", b"");
            }
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileChange;
    use chrono::{Duration, Utc};

    fn changes_with(insertions: u32) -> WorktreeChanges {
        WorktreeChanges::new(
            "wt",
            "/repo",
            vec![FileChange {
                path: "src/lib.rs".into(),
                status: FileStatus::Modified,
                insertions,
                deletions: 0,
            }],
            Utc::now(),
        )
    }

    #[test]
    fn unchanged_input_yields_identical_fingerprint() {
        let first = changes_with(3);
        let mut later = changes_with(3);
        later.last_updated = first.last_updated + Duration::minutes(5);

        assert_eq!(
            fingerprint_changes(&first, "+a", "m"),
            fingerprint_changes(&later, "+a", "m")
        );
    }

    #[test]
    fn any_input_change_alters_fingerprint() {
        let base = fingerprint_changes(&changes_with(3), "+a", "m");
        assert_ne!(base, fingerprint_changes(&changes_with(4), "+a", "m"));
        assert_ne!(base, fingerprint_changes(&changes_with(3), "+b", "m"));
        assert_ne!(base, fingerprint_changes(&changes_with(3), "+a", "other-model"));
    }

    #[test]
    fn fields_do_not_run_together() {
        let mut a = FingerprintBuilder::new();
        a.field("x", "ab").field("y", "c");
        let mut b = FingerprintBuilder::new();
        b.field("x", "a").field("y", "bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn file_fingerprint_tracks_content_changes() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), "one").unwrap();

        let first = fingerprint_files(temp.path(), &["a.txt", "missing.txt"]);
        let again = fingerprint_files(temp.path(), &["missing.txt", "a.txt"]);
        assert_eq!(first, again);

        std::fs::write(temp.path().join("a.txt"), "one two").unwrap();
        let changed = fingerprint_files(temp.path(), &["a.txt", "missing.txt"]);
        assert_ne!(first, changed);
    }

    #[test]
    fn untracked_content_edits_alter_change_fingerprint() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("notes.md"), "draft").unwrap();
        let changes = WorktreeChanges::new(
            "wt",
            temp.path(),
            vec![FileChange {
                path: "notes.md".into(),
                status: FileStatus::Untracked,
                insertions: 0,
                deletions: 0,
            }],
            Utc::now(),
        );
        let diff = "new untracked file: notes.md\n";

        let before = fingerprint_changes(&changes, diff, "m");
        assert_eq!(before, fingerprint_changes(&changes, diff, "m"));

        std::fs::write(temp.path().join("notes.md"), "draft, expanded").unwrap();
        assert_ne!(before, fingerprint_changes(&changes, diff, "m"));
    }
}
