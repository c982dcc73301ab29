// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! workflow-sync library - version reconciliation for git-backed workflow catalogs
//!
//! This crate keeps a catalog of CWL, WDL and Nextflow descriptors in step with
//! the source-control repositories they live in: it diffs remote refs against
//! persisted versions, merges source file sets, resolves descriptor imports and
//! records validation outcomes, while never touching frozen versions.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod checksum;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod freeze;
pub mod language;
pub mod manifest;
pub mod merge;
pub mod orchestrator;
pub mod paths;
pub mod remote;
pub mod validation;
pub mod webhook;

pub use error::{Result, SyncError};

/// Core data types for entries, versions and source files
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use sha2::{Digest, Sha256};
    use std::fmt;

    // =========================================================================
    // Source Control
    // =========================================================================

    /// Supported source-control hosts
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub enum SourceControl {
        /// GitHub
        #[serde(rename = "github.com")]
        GitHub,
        /// GitLab
        #[serde(rename = "gitlab.com")]
        GitLab,
        /// Bitbucket
        #[serde(rename = "bitbucket.org")]
        Bitbucket,
    }

    impl SourceControl {
        /// Host name used as the first segment of an entry path
        #[must_use]
        pub fn host(&self) -> &'static str {
            match self {
                Self::GitHub => "github.com",
                Self::GitLab => "gitlab.com",
                Self::Bitbucket => "bitbucket.org",
            }
        }

        /// Parse a source-control host name
        #[must_use]
        pub fn from_host(host: &str) -> Option<Self> {
            match host.to_ascii_lowercase().as_str() {
                "github.com" => Some(Self::GitHub),
                "gitlab.com" => Some(Self::GitLab),
                "bitbucket.org" => Some(Self::Bitbucket),
                _ => None,
            }
        }
    }

    // =========================================================================
    // Entry Paths
    // =========================================================================

    /// Structured path identifying an entry: host/organization/repository[/name]
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct EntryPath {
        /// Hosting service
        pub source_control: SourceControl,
        /// Organization or user owning the repository
        pub organization: String,
        /// Repository name
        pub repository: String,
        /// Optional sub-name for repositories declaring several entries
        pub name: Option<String>,
    }

    impl EntryPath {
        /// Build a path for an entry in a GitHub repository given as `org/repo`
        ///
        /// Returns `None` when `repository` is not of the form `org/repo`.
        #[must_use]
        pub fn github(repository: &str, name: Option<&str>) -> Option<Self> {
            let (organization, repository) = repository.split_once('/')?;
            if organization.is_empty() || repository.is_empty() || repository.contains('/') {
                return None;
            }
            Some(Self {
                source_control: SourceControl::GitHub,
                organization: organization.to_string(),
                repository: repository.to_string(),
                name: name.map(String::from),
            })
        }

        /// `org/repo` form used by the remote repository collaborator
        #[must_use]
        pub fn repository_path(&self) -> String {
            format!("{}/{}", self.organization, self.repository)
        }

        /// Parse `host/org/repo[/name]`
        #[must_use]
        pub fn parse(path: &str) -> Option<Self> {
            let mut parts = path.split('/');
            let source_control = SourceControl::from_host(parts.next()?)?;
            let organization = parts.next().filter(|s| !s.is_empty())?.to_string();
            let repository = parts.next().filter(|s| !s.is_empty())?.to_string();
            let name = parts.next().filter(|s| !s.is_empty()).map(String::from);
            if parts.next().is_some() {
                return None;
            }
            Some(Self {
                source_control,
                organization,
                repository,
                name,
            })
        }
    }

    impl fmt::Display for EntryPath {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}/{}/{}",
                self.source_control.host(),
                self.organization,
                self.repository
            )?;
            if let Some(name) = &self.name {
                write!(f, "/{name}")?;
            }
            Ok(())
        }
    }

    // =========================================================================
    // Languages and File Types
    // =========================================================================

    /// Descriptor language of an entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum DescriptorLanguage {
        /// Common Workflow Language
        Cwl,
        /// Workflow Description Language
        Wdl,
        /// Nextflow
        Nextflow,
        /// Services declared in the manifest
        Service,
    }

    impl DescriptorLanguage {
        /// All registered languages
        pub const ALL: [Self; 4] = [Self::Cwl, Self::Wdl, Self::Nextflow, Self::Service];

        /// Parse a workflow `subclass` value from the manifest
        #[must_use]
        pub fn from_subclass(subclass: &str) -> Option<Self> {
            match subclass.to_ascii_uppercase().as_str() {
                "CWL" => Some(Self::Cwl),
                "WDL" => Some(Self::Wdl),
                "NFL" | "NEXTFLOW" => Some(Self::Nextflow),
                _ => None,
            }
        }

        /// File type of the primary descriptor
        #[must_use]
        pub fn primary_file_type(&self) -> FileType {
            match self {
                Self::Cwl => FileType::DockstoreCwl,
                Self::Wdl => FileType::DockstoreWdl,
                Self::Nextflow => FileType::NextflowConfig,
                Self::Service => FileType::DockstoreServiceYml,
            }
        }

        /// File type of secondary descriptors
        #[must_use]
        pub fn secondary_file_type(&self) -> FileType {
            match self {
                Self::Cwl => FileType::DockstoreCwl,
                Self::Wdl => FileType::DockstoreWdl,
                Self::Nextflow => FileType::Nextflow,
                Self::Service => FileType::DockstoreServiceOther,
            }
        }

        /// File type of test parameter files, if the language has any
        #[must_use]
        pub fn test_parameter_file_type(&self) -> Option<FileType> {
            match self {
                Self::Cwl => Some(FileType::CwlTestJson),
                Self::Wdl => Some(FileType::WdlTestJson),
                Self::Nextflow => Some(FileType::NextflowTestParams),
                Self::Service => None,
            }
        }
    }

    impl fmt::Display for DescriptorLanguage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let label = match self {
                Self::Cwl => "CWL",
                Self::Wdl => "WDL",
                Self::Nextflow => "Nextflow",
                Self::Service => "Service",
            };
            f.write_str(label)
        }
    }

    /// Kind of file stored for a version
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum FileType {
        /// CWL descriptor (primary or imported)
        DockstoreCwl,
        /// WDL descriptor (primary or imported)
        DockstoreWdl,
        /// `nextflow.config`
        NextflowConfig,
        /// Nextflow script
        Nextflow,
        /// CWL test parameter file
        CwlTestJson,
        /// WDL test parameter file
        WdlTestJson,
        /// Nextflow test parameter file
        NextflowTestParams,
        /// Container build file
        Dockerfile,
        /// The `.dockstore.yml` manifest
        DockstoreYml,
        /// Manifest acting as a service's primary descriptor
        DockstoreServiceYml,
        /// Any file declared by a service
        DockstoreServiceOther,
    }

    impl FileType {
        /// Whether this type holds test parameters
        #[must_use]
        pub fn is_test_parameter(&self) -> bool {
            matches!(
                self,
                Self::CwlTestJson | Self::WdlTestJson | Self::NextflowTestParams
            )
        }
    }

    // =========================================================================
    // Source Files
    // =========================================================================

    /// Hash algorithm recorded next to each checksum value
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum ChecksumAlgorithm {
        /// SHA-256
        #[default]
        Sha256,
        /// SHA-512
        Sha512,
    }

    /// A content hash tagged with the algorithm that produced it
    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Checksum {
        /// Algorithm used
        #[serde(rename = "type")]
        pub algorithm: ChecksumAlgorithm,
        /// Lowercase hex digest
        pub checksum: String,
    }

    /// Identity of a source file within a version
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct FileKey {
        /// File type
        pub file_type: FileType,
        /// Canonical absolute path
        pub absolute_path: String,
    }

    impl fmt::Display for FileKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{:?}:{}", self.file_type, self.absolute_path)
        }
    }

    /// One file belonging to a version
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SourceFile {
        /// Deterministic ID: sf:<hash of (type, absolute path)>
        pub id: String,
        /// File type
        #[serde(rename = "type")]
        pub file_type: FileType,
        /// Path as referenced by the descriptor or manifest
        pub path: String,
        /// Path canonicalised against the version working directory
        pub absolute_path: String,
        /// File content, absent until fetched
        pub content: Option<String>,
        /// Content hashes, one per algorithm
        #[serde(default)]
        pub checksums: Vec<Checksum>,
        /// When this file was first attached to the version
        pub created_at: DateTime<Utc>,
    }

    impl SourceFile {
        /// Create a file without checksums; the merger computes them
        #[must_use]
        pub fn new(
            file_type: FileType,
            path: impl Into<String>,
            absolute_path: impl Into<String>,
            content: Option<String>,
        ) -> Self {
            let absolute_path = absolute_path.into();
            Self {
                id: Self::generate_id(file_type, &absolute_path),
                file_type,
                path: path.into(),
                absolute_path,
                content,
                checksums: Vec::new(),
                created_at: Utc::now(),
            }
        }

        /// Generate a deterministic ID from the identity key
        #[must_use]
        pub fn generate_id(file_type: FileType, absolute_path: &str) -> String {
            let mut hasher = Sha256::new();
            hasher.update(format!("{file_type:?}").as_bytes());
            hasher.update(absolute_path.as_bytes());
            let hash = hex::encode(hasher.finalize());
            format!("sf:{}", &hash[..12])
        }

        /// Identity key within a version
        #[must_use]
        pub fn key(&self) -> FileKey {
            FileKey {
                file_type: self.file_type,
                absolute_path: self.absolute_path.clone(),
            }
        }

        /// Checksum recorded for the given algorithm
        #[must_use]
        pub fn checksum(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
            self.checksums
                .iter()
                .find(|c| c.algorithm == algorithm)
                .map(|c| c.checksum.as_str())
        }
    }

    // =========================================================================
    // Validations
    // =========================================================================

    /// What a validation judges
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ValidationCategory {
        /// The `.dockstore.yml` manifest
        Manifest,
        /// Primary descriptor syntax for a language
        Descriptor(DescriptorLanguage),
        /// Declared test parameter files
        TestParameterFile,
        /// Imports referenced from descriptors
        Imports,
    }

    /// Pass/fail judgment attached to a version
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Validation {
        /// Category judged
        pub category: ValidationCategory,
        /// Outcome
        pub is_valid: bool,
        /// Human-readable detail
        pub message: String,
    }

    impl Validation {
        /// A passing validation
        #[must_use]
        pub fn valid(category: ValidationCategory) -> Self {
            Self {
                category,
                is_valid: true,
                message: String::new(),
            }
        }

        /// A failing validation with a message
        #[must_use]
        pub fn invalid(category: ValidationCategory, message: impl Into<String>) -> Self {
            Self {
                category,
                is_valid: false,
                message: message.into(),
            }
        }
    }

    // =========================================================================
    // Versions
    // =========================================================================

    /// Kind of git reference a version tracks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum ReferenceType {
        /// A branch head
        Branch,
        /// A tag
        Tag,
        /// Unknown or not tracked
        NotApplicable,
    }

    /// A version as seen on the remote side
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RemoteVersionRef {
        /// Branch or tag name
        pub name: String,
        /// Reference type
        pub reference_type: ReferenceType,
        /// Commit the reference points at
        pub commit_id: String,
        /// Commit timestamp, when known
        #[serde(default)]
        pub last_modified: Option<DateTime<Utc>>,
    }

    /// One tag, branch or release of an entry
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Version {
        /// Reference name, unique within the entry
        pub name: String,
        /// Reference type
        pub reference_type: ReferenceType,
        /// Commit id recorded at the last reconciliation
        pub commit_id: Option<String>,
        /// Locked against reconciliation-driven mutation
        #[serde(default)]
        pub frozen: bool,
        /// Created by the old polling refresh instead of a webhook
        #[serde(default)]
        pub legacy: bool,
        /// Descriptor language
        pub language: DescriptorLanguage,
        /// Version-specific primary descriptor path
        #[serde(default)]
        pub descriptor_path: Option<String>,
        /// Test parameter paths declared for this version
        #[serde(default)]
        pub test_parameter_paths: Vec<String>,
        /// Files, ordered by identity key
        #[serde(default)]
        pub source_files: Vec<SourceFile>,
        /// Validations, ordered by category
        #[serde(default)]
        pub validations: Vec<Validation>,
        /// Commit timestamp of the last reconciliation
        #[serde(default)]
        pub last_modified: Option<DateTime<Utc>>,
    }

    impl Version {
        /// Create an empty version for a newly observed remote reference
        #[must_use]
        pub fn from_remote(remote: &RemoteVersionRef, language: DescriptorLanguage) -> Self {
            Self {
                name: remote.name.clone(),
                reference_type: remote.reference_type,
                commit_id: None,
                frozen: false,
                legacy: false,
                language,
                descriptor_path: None,
                test_parameter_paths: Vec::new(),
                source_files: Vec::new(),
                validations: Vec::new(),
                last_modified: None,
            }
        }

        /// Declared primary descriptor path, falling back to the entry default
        #[must_use]
        pub fn effective_descriptor_path<'a>(&'a self, entry_default: &'a str) -> &'a str {
            self.descriptor_path.as_deref().unwrap_or(entry_default)
        }

        /// A version is valid when every recorded category passes
        #[must_use]
        pub fn is_valid(&self) -> bool {
            self.validations.iter().all(|v| v.is_valid)
        }

        /// Look up a file by its identity key
        #[must_use]
        pub fn file(&self, file_type: FileType, absolute_path: &str) -> Option<&SourceFile> {
            self.source_files
                .iter()
                .find(|f| f.file_type == file_type && f.absolute_path == absolute_path)
        }
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// What an entry catalogs
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum EntryKind {
        /// A workflow
        Workflow,
        /// A service
        Service,
    }

    /// A cataloged workflow or service
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Entry {
        /// Deterministic ID: entry:<path>
        pub id: String,
        /// Structured path
        pub path: EntryPath,
        /// Workflow or service
        pub kind: EntryKind,
        /// Descriptor language
        pub language: DescriptorLanguage,
        /// Primary descriptor path used when a version has no override
        pub default_descriptor_path: String,
        /// Default test parameter path
        #[serde(default)]
        pub default_test_parameter_path: Option<String>,
        /// Whether the manifest asked for the entry to be published
        #[serde(default)]
        pub published: bool,
        /// Authors listed in the manifest
        #[serde(default)]
        pub authors: Vec<String>,
        /// Versions, unique by name
        #[serde(default)]
        pub versions: Vec<Version>,
    }

    impl Entry {
        /// Create an entry with no versions
        #[must_use]
        pub fn new(
            path: EntryPath,
            kind: EntryKind,
            language: DescriptorLanguage,
            default_descriptor_path: impl Into<String>,
        ) -> Self {
            Self {
                id: Self::generate_id(&path),
                path,
                kind,
                language,
                default_descriptor_path: default_descriptor_path.into(),
                default_test_parameter_path: None,
                published: false,
                authors: Vec::new(),
                versions: Vec::new(),
            }
        }

        /// Generate a deterministic ID for an entry path
        #[must_use]
        pub fn generate_id(path: &EntryPath) -> String {
            format!("entry:{path}")
        }

        /// Get a version by name
        #[must_use]
        pub fn version(&self, name: &str) -> Option<&Version> {
            self.versions.iter().find(|v| v.name == name)
        }

        /// Insert a version, replacing any version with the same name
        pub fn upsert_version(&mut self, version: Version) {
            if let Some(existing) = self.versions.iter_mut().find(|v| v.name == version.name) {
                *existing = version;
            } else {
                self.versions.push(version);
            }
        }

        /// Remove a version by name, returning it
        pub fn remove_version(&mut self, name: &str) -> Option<Version> {
            let index = self.versions.iter().position(|v| v.name == name)?;
            Some(self.versions.remove(index))
        }
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// A catalog account allowed to trigger reconciliation
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct User {
        /// Source-control username
        pub username: String,
        /// When the account was registered
        pub created_at: DateTime<Utc>,
    }

    // =========================================================================
    // Sync Results
    // =========================================================================

    /// Per-entry outcome of one reconciliation call
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct EntrySyncResult {
        /// Entry path, absent for failures before any entry was identified
        pub entry: Option<String>,
        /// Versions created
        #[serde(default)]
        pub added: Vec<String>,
        /// Versions updated
        #[serde(default)]
        pub updated: Vec<String>,
        /// Versions removed
        #[serde(default)]
        pub removed: Vec<String>,
        /// Versions left alone because they are frozen
        #[serde(default)]
        pub skipped_frozen: Vec<String>,
        /// Whether everything for this entry was applied
        pub success: bool,
        /// Failure detail
        pub message: Option<String>,
    }

    impl EntrySyncResult {
        /// Start a successful result for an entry
        #[must_use]
        pub fn for_entry(path: &EntryPath) -> Self {
            Self {
                entry: Some(path.to_string()),
                success: true,
                ..Self::default()
            }
        }

        /// A call-level failure not tied to an entry
        #[must_use]
        pub fn call_failure(message: impl Into<String>) -> Self {
            Self {
                entry: None,
                success: false,
                message: Some(message.into()),
                ..Self::default()
            }
        }

        /// Mark this result failed, keeping the first message
        pub fn fail(&mut self, message: impl Into<String>) {
            self.success = false;
            if self.message.is_none() {
                self.message = Some(message.into());
            }
        }

        /// Whether the call touched any version of the entry
        #[must_use]
        pub fn has_changes(&self) -> bool {
            !(self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty())
        }
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{Result, SyncError};
    pub use crate::types::*;
}
