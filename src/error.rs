// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Error taxonomy for reconciliation calls

use thiserror::Error;

/// Errors surfaced by the reconciliation engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote repository could not be read; the caller may retry
    #[error("failed to fetch {what} from {repository}@{reference}: {message}")]
    RemoteFetch {
        /// Repository as `org/repo`
        repository: String,
        /// Reference being read, or `*` for listings
        reference: String,
        /// What was being fetched
        what: String,
        /// Collaborator-provided detail
        message: String,
    },

    /// Manifest missing, malformed, or failing schema checks
    #[error("invalid .dockstore.yml: {0}")]
    InvalidManifest(String),

    /// Triggering user has no catalog account
    #[error("user {0} does not have a catalog account")]
    UnknownUser(String),

    /// A descriptor failed to parse
    #[error("{path}: {message}")]
    DescriptorSyntax {
        /// Descriptor path
        path: String,
        /// Parser detail
        message: String,
    },

    /// Reconciliation attempted to mutate a frozen version
    #[error("version {version} of {entry} is frozen and cannot be modified")]
    FrozenVersionViolation {
        /// Entry path
        entry: String,
        /// Version name
        version: String,
    },

    /// Git reference string is not `refs/heads/*` or `refs/tags/*`
    #[error("invalid git reference: {0}")]
    InvalidReference(String),

    /// Full re-sync could not see every remote version
    #[error("remote version listing for {0} is incomplete; nothing was removed")]
    IncompleteListing(String),

    /// Catalog persistence failed
    #[error("catalog error: {0}")]
    Catalog(String),

    /// The call was cancelled before this work started
    #[error("reconciliation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Whether retrying the same call later may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteFetch { .. } | Self::IncompleteListing(_))
    }

    /// Shorthand for a remote fetch failure
    pub fn fetch(
        repository: impl Into<String>,
        reference: impl Into<String>,
        what: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::RemoteFetch {
            repository: repository.into(),
            reference: reference.into(),
            what: what.into(),
            message: message.to_string(),
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        Self::Catalog(format!("{err:#}"))
    }
}

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, SyncError>;
