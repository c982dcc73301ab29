// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Version diffing
//!
//! Classifies every version name seen on either side exactly once:
//! added, updated, unchanged or removed. Frozen versions always land in
//! `unchanged`.

use crate::error::{Result, SyncError};
use crate::freeze;
use crate::types::{RemoteVersionRef, Version};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// How much of the remote the caller has seen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffMode {
    /// A single pushed reference; absence means nothing
    Push,
    /// The complete remote version list; absence means removal
    FullSync,
}

/// Remote versions as enumerated by the caller
#[derive(Debug, Clone, Default)]
pub struct RemoteListing {
    /// Versions visible on the remote
    pub versions: Vec<RemoteVersionRef>,
    /// False when enumeration stopped early
    pub complete: bool,
    /// Names listed remotely whose ownership could not be determined
    pub protected: BTreeSet<String>,
}

impl RemoteListing {
    /// A complete listing
    #[must_use]
    pub fn complete(versions: Vec<RemoteVersionRef>) -> Self {
        Self {
            versions,
            complete: true,
            protected: BTreeSet::new(),
        }
    }
}

/// Classification of versions for one entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionDiff {
    /// Remote versions with no persisted counterpart
    pub added: Vec<RemoteVersionRef>,
    /// Mutable versions whose commit moved, or that were forced
    pub updated: Vec<RemoteVersionRef>,
    /// Versions left as they are, frozen ones included
    pub unchanged: Vec<String>,
    /// Mutable persisted versions absent from a full listing
    pub removed: Vec<String>,
    /// Subset of `unchanged` that was skipped because it is frozen
    pub frozen: Vec<String>,
}

impl VersionDiff {
    /// Whether there is anything to apply
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Diff persisted versions against remote references.
///
/// `forced` names are updated even when their commit did not move.
/// In [`DiffMode::FullSync`] an incomplete listing is rejected before anything
/// is classified so that partial visibility is never read as deletion.
pub fn diff(
    existing: &[Version],
    remote: &RemoteListing,
    mode: DiffMode,
    forced: &BTreeSet<String>,
) -> Result<VersionDiff> {
    if mode == DiffMode::FullSync && !remote.complete {
        return Err(SyncError::IncompleteListing(format!(
            "{} versions seen",
            remote.versions.len()
        )));
    }

    let mut result = VersionDiff::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for remote_version in &remote.versions {
        if !seen.insert(remote_version.name.as_str()) {
            warn!("Ignoring duplicate remote version {}", remote_version.name);
            continue;
        }
        match existing.iter().find(|v| v.name == remote_version.name) {
            None => result.added.push(remote_version.clone()),
            Some(current) if !freeze::is_mutable(current) => {
                result.frozen.push(current.name.clone());
                result.unchanged.push(current.name.clone());
            }
            Some(current) => {
                let moved = current.commit_id.as_deref() != Some(remote_version.commit_id.as_str());
                if moved || forced.contains(&current.name) {
                    result.updated.push(remote_version.clone());
                } else {
                    result.unchanged.push(current.name.clone());
                }
            }
        }
    }

    for current in existing {
        if seen.contains(current.name.as_str()) {
            continue;
        }
        let removable = mode == DiffMode::FullSync
            && freeze::is_mutable(current)
            && !remote.protected.contains(&current.name);
        if removable {
            result.removed.push(current.name.clone());
        } else {
            if !freeze::is_mutable(current) {
                result.frozen.push(current.name.clone());
            }
            result.unchanged.push(current.name.clone());
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DescriptorLanguage, ReferenceType};

    fn remote(name: &str, commit: &str) -> RemoteVersionRef {
        RemoteVersionRef {
            name: name.into(),
            reference_type: ReferenceType::Branch,
            commit_id: commit.into(),
            last_modified: None,
        }
    }

    fn stored(name: &str, commit: &str, frozen: bool) -> Version {
        let mut version = Version::from_remote(&remote(name, commit), DescriptorLanguage::Wdl);
        version.commit_id = Some(commit.into());
        version.frozen = frozen;
        version
    }

    #[test]
    fn test_added_and_updated() {
        let existing = vec![stored("master", "a1", false)];
        let listing = RemoteListing::complete(vec![remote("master", "a2"), remote("dev", "b1")]);
        let diff = diff(&existing, &listing, DiffMode::Push, &BTreeSet::new()).unwrap();
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].name, "dev");
        assert_eq!(diff.updated[0].name, "master");
    }

    #[test]
    fn test_same_commit_is_unchanged_unless_forced() {
        let existing = vec![stored("master", "a1", false)];
        let listing = RemoteListing::complete(vec![remote("master", "a1")]);
        let plain = diff(&existing, &listing, DiffMode::Push, &BTreeSet::new()).unwrap();
        assert_eq!(plain.unchanged, vec!["master".to_string()]);

        let forced: BTreeSet<String> = ["master".to_string()].into();
        let forced_diff = diff(&existing, &listing, DiffMode::Push, &forced).unwrap();
        assert_eq!(forced_diff.updated.len(), 1);
    }

    #[test]
    fn test_frozen_never_updated_or_removed() {
        let existing = vec![stored("0.2", "a1", true), stored("0.3", "c1", true)];
        let listing = RemoteListing::complete(vec![remote("0.2", "zz")]);
        let forced: BTreeSet<String> = ["0.2".to_string()].into();
        let diff = diff(&existing, &listing, DiffMode::FullSync, &forced).unwrap();
        assert!(diff.updated.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.frozen, vec!["0.2".to_string(), "0.3".to_string()]);
    }

    #[test]
    fn test_push_never_removes() {
        let existing = vec![stored("old", "a1", false)];
        let listing = RemoteListing::complete(vec![remote("master", "b1")]);
        let diff = diff(&existing, &listing, DiffMode::Push, &BTreeSet::new()).unwrap();
        assert!(diff.removed.is_empty());
        assert_eq!(diff.unchanged, vec!["old".to_string()]);
    }

    #[test]
    fn test_incomplete_listing_fails_full_sync() {
        let existing = vec![stored("old", "a1", false)];
        let listing = RemoteListing {
            versions: vec![],
            complete: false,
            protected: BTreeSet::new(),
        };
        let err = diff(&existing, &listing, DiffMode::FullSync, &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, SyncError::IncompleteListing(_)));
    }

    #[test]
    fn test_protected_names_are_not_removed() {
        let existing = vec![stored("broken", "a1", false)];
        let mut listing = RemoteListing::complete(vec![]);
        listing.protected.insert("broken".into());
        let diff = diff(&existing, &listing, DiffMode::FullSync, &BTreeSet::new()).unwrap();
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_duplicate_remote_names_first_wins() {
        let listing = RemoteListing::complete(vec![remote("v1", "a"), remote("v1", "b")]);
        let diff = diff(&[], &listing, DiffMode::Push, &BTreeSet::new()).unwrap();
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.added[0].commit_id, "a");
    }
}
