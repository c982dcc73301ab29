// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for the reconciliation engine
//!
//! 1. Merging the same remote twice changes nothing the second time
//! 2. Frozen versions are never modified or removed
//! 3. Every remote version lands in exactly one diff bucket
//! 4. At most one primary descriptor is identified
//! 5. Stored checksums always match stored content

use proptest::prelude::*;
use std::collections::{BTreeSet, HashSet};
use workflow_sync::catalog::{Catalog, CatalogStore};
use workflow_sync::checksum;
use workflow_sync::diff::{self, DiffMode, RemoteListing};
use workflow_sync::events::MemoryRecorder;
use workflow_sync::language;
use workflow_sync::merge;
use workflow_sync::orchestrator::Reconciler;
use workflow_sync::remote::SnapshotRemote;
use workflow_sync::types::{
    ChecksumAlgorithm, DescriptorLanguage, EntryPath, FileType, ReferenceType, RemoteVersionRef,
    SourceFile, Version,
};

// =============================================================================
// Strategies
// =============================================================================

fn arb_file_type() -> impl Strategy<Value = FileType> {
    prop_oneof![
        Just(FileType::DockstoreWdl),
        Just(FileType::WdlTestJson),
        Just(FileType::DockstoreYml),
    ]
}

fn arb_file() -> impl Strategy<Value = SourceFile> {
    (
        arb_file_type(),
        "/[a-c]{1,2}\\.wdl",
        proptest::option::of("[a-z ]{0,12}"),
    )
        .prop_map(|(file_type, path, content)| SourceFile::new(file_type, path.clone(), path, content))
}

fn arb_files() -> impl Strategy<Value = Vec<SourceFile>> {
    proptest::collection::vec(arb_file(), 0..8)
}

fn arb_algorithm() -> impl Strategy<Value = ChecksumAlgorithm> {
    prop_oneof![Just(ChecksumAlgorithm::Sha256), Just(ChecksumAlgorithm::Sha512)]
}

fn arb_versions() -> impl Strategy<Value = Vec<(String, String, bool)>> {
    proptest::collection::vec(("[a-e]", "c[0-2]", any::<bool>()), 0..6)
}

fn persisted(name: &str, commit: &str, frozen: bool) -> Version {
    let mut version = Version::from_remote(&remote_ref(name, commit), DescriptorLanguage::Wdl);
    version.commit_id = Some(commit.to_string());
    version.frozen = frozen;
    version
}

fn remote_ref(name: &str, commit: &str) -> RemoteVersionRef {
    RemoteVersionRef {
        name: name.to_string(),
        reference_type: ReferenceType::Branch,
        commit_id: commit.to_string(),
        last_modified: None,
    }
}

// =============================================================================
// Merge
// =============================================================================

proptest! {
    #[test]
    fn prop_merge_is_idempotent(
        existing in arb_files(),
        remote in arb_files(),
        algorithm in arb_algorithm(),
    ) {
        let first = merge::merge(existing, remote.clone(), algorithm);
        let second = merge::merge(first.files.clone(), remote, algorithm);

        prop_assert!(second.is_noop());
        prop_assert_eq!(second.files, first.files);
    }

    #[test]
    fn prop_merge_result_matches_remote_keys(
        existing in arb_files(),
        remote in arb_files(),
    ) {
        let expected: BTreeSet<_> = remote.iter().map(SourceFile::key).collect();
        let outcome = merge::merge(existing, remote, ChecksumAlgorithm::Sha256);
        let actual: BTreeSet<_> = outcome.files.iter().map(SourceFile::key).collect();

        prop_assert_eq!(actual.len(), outcome.files.len(), "keys must be unique");
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_checksums_match_content(
        existing in arb_files(),
        remote in arb_files(),
        algorithm in arb_algorithm(),
    ) {
        let outcome = merge::merge(existing, remote, algorithm);
        for file in &outcome.files {
            match &file.content {
                Some(content) => {
                    let expected = checksum::digest(algorithm, content);
                    prop_assert_eq!(file.checksum(algorithm), Some(expected.as_str()));
                }
                None => prop_assert!(file.checksums.is_empty()),
            }
        }
    }

    #[test]
    fn prop_merge_keeps_identity_of_matched_files(
        existing in arb_files(),
        remote in arb_files(),
    ) {
        let outcome = merge::merge(existing.clone(), remote, ChecksumAlgorithm::Sha256);
        for file in &outcome.files {
            if let Some(old) = existing.iter().rev().find(|f| f.key() == file.key()) {
                prop_assert_eq!(&file.id, &old.id);
                prop_assert_eq!(file.created_at, old.created_at);
            }
        }
    }
}

// =============================================================================
// Diff
// =============================================================================

proptest! {
    #[test]
    fn prop_diff_is_complete(
        existing in arb_versions(),
        remote in proptest::collection::vec(("[a-e]", "c[0-2]"), 0..6),
        full_sync in any::<bool>(),
    ) {
        let mut seen = HashSet::new();
        let existing: Vec<Version> = existing
            .into_iter()
            .filter(|(name, _, _)| seen.insert(name.clone()))
            .map(|(name, commit, frozen)| persisted(&name, &commit, frozen))
            .collect();
        let listing = RemoteListing::complete(
            remote.iter().map(|(name, commit)| remote_ref(name, commit)).collect(),
        );
        let mode = if full_sync { DiffMode::FullSync } else { DiffMode::Push };

        let result = diff::diff(&existing, &listing, mode, &BTreeSet::new()).unwrap();

        let remote_names: BTreeSet<&str> = remote.iter().map(|(n, _)| n.as_str()).collect();
        for name in &remote_names {
            let buckets = usize::from(result.added.iter().any(|v| v.name == *name))
                + usize::from(result.updated.iter().any(|v| v.name == *name))
                + usize::from(result.unchanged.iter().any(|n| n == name));
            prop_assert_eq!(buckets, 1, "{} must be in exactly one bucket", name);
        }
        for name in &result.removed {
            prop_assert!(!remote_names.contains(name.as_str()));
            prop_assert!(full_sync);
        }
        for version in existing.iter().filter(|v| v.frozen) {
            prop_assert!(!result.removed.contains(&version.name));
            prop_assert!(!result.updated.iter().any(|v| v.name == version.name));
        }
    }
}

#[test]
fn test_incomplete_listing_never_removes() {
    let existing = vec![persisted("0.1", "c0", false)];
    let listing = RemoteListing {
        versions: Vec::new(),
        complete: false,
        protected: BTreeSet::new(),
    };
    assert!(diff::diff(&existing, &listing, DiffMode::FullSync, &BTreeSet::new()).is_err());
}

// =============================================================================
// Primary Uniqueness
// =============================================================================

proptest! {
    #[test]
    fn prop_at_most_one_primary(
        paths in proptest::collection::vec("/(Main|main|MAIN)\\.wdl", 0..4),
        declared in "/(Main|main)\\.wdl",
    ) {
        let files: Vec<SourceFile> = paths
            .iter()
            .map(|p| SourceFile::new(FileType::DockstoreWdl, p.clone(), p.clone(), Some(String::new())))
            .collect();
        let primary = language::identify_primary(&files, FileType::DockstoreWdl, &declared);

        match primary {
            Some(file) => {
                prop_assert!(file.absolute_path.eq_ignore_ascii_case(&declared));
                if paths.contains(&declared) {
                    prop_assert_eq!(&file.absolute_path, &declared);
                }
            }
            None => prop_assert!(paths.is_empty()),
        }
    }
}

// =============================================================================
// Freeze
// =============================================================================

const MANIFEST: &str = "version: 1.2\nworkflows:\n  - subclass: WDL\n    primaryDescriptorPath: /Dockstore.wdl\n";

#[test]
fn test_frozen_version_survives_every_entry_point() {
    let mut remote = SnapshotRemote::new();
    remote.set_version(
        "org/repo",
        "0.2",
        ReferenceType::Tag,
        "c1",
        &[("/.dockstore.yml", MANIFEST), ("/Dockstore.wdl", "workflow w {}")],
    );
    let mut catalog = CatalogStore::new();
    catalog.add_user("alice");
    let mut recorder = MemoryRecorder::new();

    Reconciler::new(&remote, &mut catalog, &mut recorder).refresh_repository("org/repo", "alice");
    let path = EntryPath::github("org/repo", None).unwrap();
    let mut entry = catalog.load_entry(&path).unwrap().unwrap();
    entry.versions[0].frozen = true;
    catalog.save_entry(entry).unwrap();
    let before = catalog.load_entry(&path).unwrap().unwrap();

    remote.set_version(
        "org/repo",
        "0.2",
        ReferenceType::Tag,
        "c2",
        &[("/.dockstore.yml", MANIFEST), ("/Dockstore.wdl", "workflow w2 {}")],
    );
    let mut reconciler = Reconciler::new(&remote, &mut catalog, &mut recorder);
    let refreshed = reconciler.refresh_version("org/repo", None, "0.2", "alice");
    let full = reconciler.refresh_repository("org/repo", "alice");
    drop(reconciler);

    assert!(refreshed.is_success());
    assert_eq!(refreshed.results[0].skipped_frozen, vec!["0.2".to_string()]);
    assert!(full.is_success());
    assert_eq!(catalog.load_entry(&path).unwrap().unwrap(), before);

    remote.remove_version("org/repo", "0.2");
    Reconciler::new(&remote, &mut catalog, &mut recorder).refresh_repository("org/repo", "alice");
    assert_eq!(catalog.load_entry(&path).unwrap().unwrap(), before);
}
