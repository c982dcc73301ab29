// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Source file set merging
//!
//! Reconciles the files persisted for one version with the files fetched from
//! the remote. Files are matched by `(type, absolute path)`: matched files keep
//! their identity and take the remote content, remote-only files are created,
//! and persisted-only files are dropped. Frozen versions never reach this code.

use crate::checksum;
use crate::types::{ChecksumAlgorithm, FileKey, SourceFile};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Result of merging one version's file set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// New authoritative file set, ordered by identity key
    pub files: Vec<SourceFile>,
    /// Files that did not exist before
    pub created: Vec<FileKey>,
    /// Files whose content changed
    pub updated: Vec<FileKey>,
    /// Files present on both sides with identical content
    pub unchanged: Vec<FileKey>,
    /// Files no longer present remotely
    pub removed: Vec<FileKey>,
}

impl MergeOutcome {
    /// Whether the merge changed anything observable
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Merge `remote` into `existing`, computing checksums with `algorithm`
#[must_use]
pub fn merge(
    existing: Vec<SourceFile>,
    remote: Vec<SourceFile>,
    algorithm: ChecksumAlgorithm,
) -> MergeOutcome {
    let mut current: BTreeMap<FileKey, SourceFile> = BTreeMap::new();
    for file in existing {
        if let Some(dup) = current.insert(file.key(), file) {
            warn!("Duplicate persisted file {}, keeping the last one", dup.key());
        }
    }

    let mut incoming: BTreeMap<FileKey, SourceFile> = BTreeMap::new();
    for file in remote {
        let key = file.key();
        if incoming.contains_key(&key) {
            warn!("Duplicate remote file {}, keeping the first one", key);
            continue;
        }
        incoming.insert(key, file);
    }

    let mut outcome = MergeOutcome::default();

    for (key, remote_file) in incoming {
        match current.remove(&key) {
            Some(mut kept) => {
                let changed = kept.content != remote_file.content;
                kept.content = remote_file.content;
                kept.path = remote_file.path;
                let missing_checksum =
                    kept.content.is_some() && kept.checksum(algorithm).is_none();
                checksum::refresh(&mut kept, algorithm, changed);
                if changed {
                    debug!("Updated {}", key);
                    outcome.updated.push(key);
                } else {
                    if missing_checksum {
                        debug!("Backfilled {:?} checksum for {}", algorithm, key);
                    }
                    outcome.unchanged.push(key);
                }
                outcome.files.push(kept);
            }
            None => {
                let mut created = remote_file;
                created.id = SourceFile::generate_id(created.file_type, &created.absolute_path);
                checksum::refresh(&mut created, algorithm, true);
                debug!("Created {}", key);
                outcome.created.push(key);
                outcome.files.push(created);
            }
        }
    }

    for key in current.into_keys() {
        debug!("Removed {}", key);
        outcome.removed.push(key);
    }

    outcome.files.sort_by_key(SourceFile::key);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;

    fn wdl(path: &str, content: &str) -> SourceFile {
        SourceFile::new(FileType::DockstoreWdl, path, path, Some(content.into()))
    }

    #[test]
    fn test_merge_into_empty_creates_everything() {
        let outcome = merge(vec![], vec![wdl("/a.wdl", "x")], ChecksumAlgorithm::Sha256);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(
            outcome.files[0].checksum(ChecksumAlgorithm::Sha256),
            Some(checksum::digest(ChecksumAlgorithm::Sha256, "x").as_str())
        );
    }

    #[test]
    fn test_matched_file_keeps_identity() {
        let mut old = wdl("/a.wdl", "v1");
        old.created_at = chrono::DateTime::from_timestamp(0, 0).unwrap();
        let outcome = merge(vec![old.clone()], vec![wdl("/a.wdl", "v2")], ChecksumAlgorithm::Sha256);

        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(outcome.files[0].id, old.id);
        assert_eq!(outcome.files[0].created_at, old.created_at);
        assert_eq!(outcome.files[0].content.as_deref(), Some("v2"));
    }

    #[test]
    fn test_same_path_different_type_are_distinct() {
        let descriptor = wdl("/a.json", "{}");
        let test_file = SourceFile::new(FileType::WdlTestJson, "/a.json", "/a.json", Some("{}".into()));
        let outcome = merge(vec![descriptor], vec![test_file], ChecksumAlgorithm::Sha256);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].file_type, FileType::WdlTestJson);
    }

    #[test]
    fn test_empty_test_parameter_file_is_kept() {
        let empty = SourceFile::new(FileType::WdlTestJson, "/t.json", "/t.json", Some(String::new()));
        let outcome = merge(vec![], vec![empty], ChecksumAlgorithm::Sha256);
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(outcome.files[0].checksums.len(), 1);
    }

    #[test]
    fn test_identical_content_is_noop() {
        let first = merge(vec![], vec![wdl("/a.wdl", "x")], ChecksumAlgorithm::Sha256);
        let second = merge(first.files.clone(), vec![wdl("/a.wdl", "x")], ChecksumAlgorithm::Sha256);
        assert!(second.is_noop());
        assert_eq!(first.files, second.files);
    }
}
