// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Remote repository access
//!
//! The engine only sees remotes through [`RemoteRepository`]. Hosting API
//! clients live elsewhere; [`SnapshotRemote`] serves refs and files from a
//! YAML or JSON snapshot document for local runs and tests.

use crate::error::{Result, SyncError};
use crate::paths;
use crate::types::{ReferenceType, RemoteVersionRef};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Path of the manifest inside a repository
pub const MANIFEST_PATH: &str = "/.dockstore.yml";

/// Read access to a source-control repository
///
/// Calls are synchronous and may block. Retries and timeouts are the
/// implementation's concern; any `Err` is a hard stop for the work that needed it.
pub trait RemoteRepository {
    /// Every branch and tag of `repository` (`org/repo`)
    fn list_versions(&self, repository: &str) -> Result<Vec<RemoteVersionRef>>;

    /// Bytes of `path` at `reference`, or `None` if the file does not exist
    fn fetch_file(&self, repository: &str, reference: &str, path: &str) -> Result<Option<Vec<u8>>>;

    /// Bytes of the manifest at `reference`, or `None` if there is none
    fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<Option<Vec<u8>>> {
        self.fetch_file(repository, reference, MANIFEST_PATH)
    }

    /// The remote state of a single reference
    fn describe_version(&self, repository: &str, reference: &str) -> Result<Option<RemoteVersionRef>> {
        Ok(self
            .list_versions(repository)?
            .into_iter()
            .find(|v| v.name == reference))
    }
}

/// Fetch a file and decode it as UTF-8 text
pub fn fetch_text(
    remote: &dyn RemoteRepository,
    repository: &str,
    reference: &str,
    path: &str,
) -> Result<Option<String>> {
    Ok(remote
        .fetch_file(repository, reference, path)?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
}

// =============================================================================
// Snapshot Remote
// =============================================================================

/// One reference and its files inside a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotVersion {
    /// Branch or tag name
    pub name: String,
    /// Reference type
    #[serde(default = "default_reference_type")]
    pub reference_type: ReferenceType,
    /// Commit id
    pub commit_id: String,
    /// Files keyed by absolute path
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

fn default_reference_type() -> ReferenceType {
    ReferenceType::Branch
}

/// All references of one repository inside a snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotRepository {
    /// References in listing order
    #[serde(default)]
    pub versions: Vec<SnapshotVersion>,
}

/// Remote backed by an in-memory snapshot of repositories
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotRemote {
    /// Repositories keyed by `org/repo`
    #[serde(default)]
    pub repositories: BTreeMap<String, SnapshotRepository>,
}

impl SnapshotRemote {
    /// Create an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot from a YAML or JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut snapshot: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))?;
        for repo in snapshot.repositories.values_mut() {
            for version in &mut repo.versions {
                version.files = std::mem::take(&mut version.files)
                    .into_iter()
                    .map(|(p, c)| (paths::normalize(&p), c))
                    .collect();
            }
        }
        Ok(snapshot)
    }

    /// Add or replace a reference with its files
    pub fn set_version(
        &mut self,
        repository: &str,
        name: &str,
        reference_type: ReferenceType,
        commit_id: &str,
        files: &[(&str, &str)],
    ) {
        let version = SnapshotVersion {
            name: name.to_string(),
            reference_type,
            commit_id: commit_id.to_string(),
            files: files
                .iter()
                .map(|(p, c)| (paths::normalize(p), (*c).to_string()))
                .collect(),
        };
        let repo = self.repositories.entry(repository.to_string()).or_default();
        match repo.versions.iter_mut().find(|v| v.name == name) {
            Some(existing) => *existing = version,
            None => repo.versions.push(version),
        }
    }

    /// Drop a reference
    pub fn remove_version(&mut self, repository: &str, name: &str) {
        if let Some(repo) = self.repositories.get_mut(repository) {
            repo.versions.retain(|v| v.name != name);
        }
    }

    fn repository(&self, repository: &str) -> Result<&SnapshotRepository> {
        self.repositories
            .get(repository)
            .ok_or_else(|| SyncError::fetch(repository, "*", "repository", "not found in snapshot"))
    }
}

/// Accept both `main` and `refs/heads/main` style references
fn short_reference(reference: &str) -> &str {
    reference
        .strip_prefix("refs/heads/")
        .or_else(|| reference.strip_prefix("refs/tags/"))
        .unwrap_or(reference)
}

impl RemoteRepository for SnapshotRemote {
    fn list_versions(&self, repository: &str) -> Result<Vec<RemoteVersionRef>> {
        Ok(self
            .repository(repository)?
            .versions
            .iter()
            .map(|v| RemoteVersionRef {
                name: v.name.clone(),
                reference_type: v.reference_type,
                commit_id: v.commit_id.clone(),
                last_modified: None,
            })
            .collect())
    }

    fn fetch_file(&self, repository: &str, reference: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let name = short_reference(reference);
        let version = self
            .repository(repository)?
            .versions
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| SyncError::fetch(repository, reference, path, "unknown reference"))?;
        Ok(version
            .files
            .get(&paths::normalize(path))
            .map(|content| content.clone().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SnapshotRemote {
        let mut remote = SnapshotRemote::new();
        remote.set_version(
            "org/repo",
            "master",
            ReferenceType::Branch,
            "abc",
            &[("/Dockstore.wdl", "workflow w {}"), ("test.json", "{}")],
        );
        remote
    }

    #[test]
    fn test_fetch_normalizes_paths() {
        let remote = snapshot();
        let bytes = remote.fetch_file("org/repo", "refs/heads/master", "./test.json").unwrap();
        assert_eq!(bytes.as_deref(), Some(b"{}".as_slice()));
        assert!(remote.fetch_file("org/repo", "master", "/missing.wdl").unwrap().is_none());
    }

    #[test]
    fn test_unknown_repository_is_fetch_error() {
        let remote = snapshot();
        let err = remote.list_versions("org/other").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_describe_version() {
        let remote = snapshot();
        let found = remote.describe_version("org/repo", "master").unwrap().unwrap();
        assert_eq!(found.commit_id, "abc");
        assert!(remote.describe_version("org/repo", "dev").unwrap().is_none());
    }

    #[test]
    fn test_load_yaml_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshot.yml");
        std::fs::write(
            &path,
            "repositories:\n  org/repo:\n    versions:\n      - name: v1\n        reference_type: tag\n        commit_id: c1\n        files:\n          /main.cwl: 'cwlVersion: v1.2'\n",
        )
        .unwrap();
        let remote = SnapshotRemote::load(&path).unwrap();
        let versions = remote.list_versions("org/repo").unwrap();
        assert_eq!(versions[0].reference_type, ReferenceType::Tag);
    }
}
