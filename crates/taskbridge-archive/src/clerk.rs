//! [`ActionArchive`] – the `(group, id)`-keyed action journal.
//!
//! Two coupled responsibilities:
//!
//! * **Dictionary** – [`archive_action`][ActionArchive::archive_action]
//!   inserts or overwrites the entry for a `(group, id)` key; there are never
//!   two live entries for the same key.
//! * **Persistence** – [`store_archive`][ActionArchive::store_archive]
//!   serializes the dictionary atomically (write-to-temp-then-rename, so a
//!   crash can never leave a torn file);
//!   [`read_archive`][ActionArchive::read_archive] fully replaces the
//!   in-memory dictionary from disk.
//!
//! # File format
//!
//! Nested JSON maps `group -> id -> {description, phase}`, with the phase
//! stored as its canonical lowercase string identifier (never the numeric
//! enum value), so the format survives enum renumbering:
//!
//! ```json
//! { "1": { "4": { "description": "insert the peg", "phase": "wiggle" } } }
//! ```
//!
//! Both store and read failures are recoverable: they are reported to the
//! caller and the in-memory dictionary keeps its prior state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use taskbridge_types::{ActionPhase, NodeArchive};

use crate::defaults;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from archive persistence.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed archive file: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// ArchiveEntry
// ─────────────────────────────────────────────────────────────────────────────

/// What is remembered about one `(group, id)` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub description: String,
    pub phase: ActionPhase,
}

type Dictionary = BTreeMap<i32, BTreeMap<i32, ArchiveEntry>>;

// ─────────────────────────────────────────────────────────────────────────────
// ActionArchive
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory action dictionary with durable snapshotting.
///
/// # Example
///
/// ```
/// use taskbridge_archive::ActionArchive;
/// use taskbridge_types::{ActionPhase, NodeArchive};
///
/// let mut archive = ActionArchive::new("/tmp/taskbridge_doc_archive.json");
/// archive.archive_action(NodeArchive::new(1, 4, "insert the peg", ActionPhase::Wiggle));
/// assert_eq!(archive.len(), 1);
/// ```
#[derive(Debug)]
pub struct ActionArchive {
    path: PathBuf,
    dictionary: Dictionary,
}

impl ActionArchive {
    /// Create an empty archive persisted at `path`.  Nothing is read or
    /// written until [`read_archive`][Self::read_archive] /
    /// [`store_archive`][Self::store_archive] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dictionary: Dictionary::new(),
        }
    }

    /// Insert or overwrite the entry for `(group, id)`.
    ///
    /// Last-write-wins: a new report replaces the prior entry wholesale,
    /// never merging partial fields.  Always succeeds.
    pub fn archive_action(&mut self, report: NodeArchive) {
        let entry = ArchiveEntry {
            description: report.description,
            phase: report.phase,
        };
        let previous = self
            .dictionary
            .entry(report.group)
            .or_default()
            .insert(report.id, entry);
        if let Some(previous) = previous {
            trace!(
                group = report.group,
                id = report.id,
                old_phase = ?previous.phase,
                new_phase = ?report.phase,
                "archive entry overwritten"
            );
        }
    }

    /// The entry for `(group, id)`, if one was ever archived.
    pub fn entry(&self, group: i32, id: i32) -> Option<&ArchiveEntry> {
        self.dictionary.get(&group)?.get(&id)
    }

    /// Total number of live `(group, id)` entries.
    pub fn len(&self) -> usize {
        self.dictionary.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the full dictionary to the archive file, atomically.
    ///
    /// The snapshot is written to a sibling temp file and renamed into place,
    /// so a crash mid-write can never corrupt an existing archive.  Failures
    /// (disk full, permission denied) are reported and leave both the
    /// in-memory dictionary and any previous on-disk snapshot intact.
    pub fn store_archive(&self) -> Result<(), ArchiveError> {
        let serialized = serde_json::to_string_pretty(&self.dictionary)?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = self.len(), "archive stored");
        Ok(())
    }

    /// Load the archive file, fully replacing the in-memory dictionary.
    ///
    /// No merge: what is on disk becomes the whole dictionary.  A missing or
    /// malformed file is reported and leaves the in-memory dictionary at its
    /// prior state.
    pub fn read_archive(&mut self) -> Result<(), ArchiveError> {
        let raw = fs::read_to_string(&self.path)?;
        let dictionary: Dictionary = serde_json::from_str(&raw)?;
        self.dictionary = dictionary;
        debug!(path = %self.path.display(), entries = self.len(), "archive loaded");
        Ok(())
    }

    /// The static default parameter bundle for the report's [`ActionPhase`].
    ///
    /// Read-only reference data, independent of the live dictionary.
    pub fn get_context(&self, report: &NodeArchive) -> Option<serde_json::Value> {
        defaults::default_context(report.phase)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(group: i32, id: i32, description: &str, phase: ActionPhase) -> NodeArchive {
        NodeArchive::new(group, id, description, phase)
    }

    #[test]
    fn archive_action_inserts_entry() {
        let mut archive = ActionArchive::new("unused.json");
        archive.archive_action(report(1, 4, "insert the peg", ActionPhase::Wiggle));
        let entry = archive.entry(1, 4).unwrap();
        assert_eq!(entry.description, "insert the peg");
        assert_eq!(entry.phase, ActionPhase::Wiggle);
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn same_key_overwrites_never_duplicates() {
        let mut archive = ActionArchive::new("unused.json");
        archive.archive_action(report(2, 7, "first attempt", ActionPhase::Contact));
        archive.archive_action(report(2, 7, "second attempt", ActionPhase::CartesianMove));
        archive.archive_action(report(2, 7, "third attempt", ActionPhase::JointMove));

        assert_eq!(archive.len(), 1);
        let entry = archive.entry(2, 7).unwrap();
        // Equal to the last call, fields replaced wholesale.
        assert_eq!(entry.description, "third attempt");
        assert_eq!(entry.phase, ActionPhase::JointMove);
    }

    #[test]
    fn distinct_keys_coexist() {
        let mut archive = ActionArchive::new("unused.json");
        archive.archive_action(report(1, 1, "a", ActionPhase::Contact));
        archive.archive_action(report(1, 2, "b", ActionPhase::Wiggle));
        archive.archive_action(report(2, 1, "c", ActionPhase::GripperGrasp));
        assert_eq!(archive.len(), 3);
        assert!(archive.entry(1, 1).is_some());
        assert!(archive.entry(1, 2).is_some());
        assert!(archive.entry(2, 1).is_some());
        assert!(archive.entry(9, 9).is_none());
    }

    #[test]
    fn store_then_read_reproduces_dictionary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.json");

        let mut original = ActionArchive::new(&path);
        original.archive_action(report(1, 1, "approach", ActionPhase::CartesianMove));
        original.archive_action(report(1, 2, "insert", ActionPhase::Wiggle));
        original.archive_action(report(3, 1, "grasp tool", ActionPhase::ToolGrasp));
        original.store_archive().unwrap();

        let mut fresh = ActionArchive::new(&path);
        fresh.read_archive().unwrap();
        assert_eq!(fresh.len(), original.len());
        assert_eq!(fresh.entry(1, 2), original.entry(1, 2));
        assert_eq!(fresh.entry(3, 1), original.entry(3, 1));
    }

    #[test]
    fn stored_file_uses_phase_strings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.json");
        let mut archive = ActionArchive::new(&path);
        archive.archive_action(report(1, 4, "insert the peg", ActionPhase::CartesianMove));
        archive.store_archive().unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"cartesian_move\""), "phase not stored as string: {raw}");
        assert!(!raw.contains("CartesianMove"), "variant name leaked into file: {raw}");
    }

    #[test]
    fn read_replaces_instead_of_merging() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.json");

        let mut writer = ActionArchive::new(&path);
        writer.archive_action(report(1, 1, "on disk", ActionPhase::Contact));
        writer.store_archive().unwrap();

        let mut reader = ActionArchive::new(&path);
        reader.archive_action(report(5, 5, "only in memory", ActionPhase::Wiggle));
        reader.read_archive().unwrap();

        assert_eq!(reader.len(), 1);
        assert!(reader.entry(5, 5).is_none(), "read must not merge");
        assert!(reader.entry(1, 1).is_some());
    }

    #[test]
    fn read_missing_file_reports_and_preserves_memory() {
        let dir = tempdir().unwrap();
        let mut archive = ActionArchive::new(dir.path().join("does_not_exist.json"));
        archive.archive_action(report(1, 1, "kept", ActionPhase::Contact));

        let err = archive.read_archive().unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
        assert_eq!(archive.len(), 1);
        assert!(archive.entry(1, 1).is_some());
    }

    #[test]
    fn read_malformed_file_reports_and_preserves_memory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.json");
        fs::write(&path, "{ this is not json").unwrap();

        let mut archive = ActionArchive::new(&path);
        archive.archive_action(report(1, 1, "kept", ActionPhase::Contact));

        let err = archive.read_archive().unwrap_err();
        assert!(matches!(err, ArchiveError::Malformed(_)));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn store_failure_preserves_memory() {
        let dir = tempdir().unwrap();
        // Parent "directory" is actually a file, so the temp write must fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not dir").unwrap();

        let mut archive = ActionArchive::new(blocker.join("archive.json"));
        archive.archive_action(report(1, 1, "kept", ActionPhase::Contact));
        let err = archive.store_archive().unwrap_err();
        assert!(matches!(err, ArchiveError::Io(_)));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn failed_store_leaves_previous_snapshot_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.json");

        let mut archive = ActionArchive::new(&path);
        archive.archive_action(report(1, 1, "first snapshot", ActionPhase::Contact));
        archive.store_archive().unwrap();
        let before = fs::read_to_string(&path).unwrap();

        // A failed later store (unwritable path) must not touch the old file.
        let mut doomed = ActionArchive::new(dir.path().join("missing").join("x.json"));
        doomed.archive_action(report(9, 9, "never lands", ActionPhase::Wiggle));
        assert!(doomed.store_archive().is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn get_context_is_independent_of_dictionary() {
        let archive = ActionArchive::new("unused.json");
        let peg = report(1, 4, "insert", ActionPhase::Wiggle);
        // Nothing archived, lookup still works.
        let bundle = archive.get_context(&peg).unwrap();
        assert!(bundle["skill"]["Wiggle"]["search_a"].is_array());
        // Sentinel phases have no bundle.
        assert!(archive.get_context(&report(1, 5, "c", ActionPhase::Condition)).is_none());
    }
}
