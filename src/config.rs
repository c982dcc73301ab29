// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Layers, later wins: built-in defaults, `config.toml` in the platform config
//! directory (or an explicit file), then `WORKFLOW_SYNC_*` environment variables.

use crate::types::ChecksumAlgorithm;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "WORKFLOW_SYNC";

/// What a failure in one version does to the rest of the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationPolicy {
    /// Roll back the failing version and keep going
    #[default]
    PerVersion,
    /// Stop the whole call at the first failure
    FailFast,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `catalog.json` and `events.jsonl`
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Algorithm used for new checksums
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Failure isolation between versions and entries
    pub isolation: IsolationPolicy,
    /// Deepest import chain followed
    pub max_import_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".workflow-sync")),
            log_level: "info".to_string(),
            checksum_algorithm: ChecksumAlgorithm::default(),
            isolation: IsolationPolicy::default(),
            max_import_depth: 10,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "hyperpolymath", "workflow-sync")
}

/// Default location of the config file
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration, reading `path` instead of the default file when given
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = config::Config::try_from(&Config::default())
        .context("Failed to build default configuration")?;
    let mut builder = config::Config::builder().add_source(defaults);

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(default) = default_config_path() {
                builder = builder.add_source(config::File::from(default).required(false));
            }
        }
    }

    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX))
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}
