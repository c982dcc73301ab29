// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod event;
pub mod freeze;
pub mod manifest;
pub mod refresh;
pub mod show;
pub mod user;

use crate::catalog::JsonCatalog;
use crate::config::Config;
use crate::events::JsonLinesRecorder;
use crate::orchestrator::{PassOutcome, ReconcileOptions};
use crate::remote::SnapshotRemote;
use anyhow::{Context as _, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration
    pub config: Config,
    /// Colorize status output
    pub color: bool,
}

impl Context {
    /// Create a context
    #[must_use]
    pub fn new(config: Config, color: bool) -> Self {
        Self { config, color }
    }

    /// Directory holding the catalog and event log
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Open the catalog in the data directory
    pub fn open_catalog(&self) -> Result<JsonCatalog> {
        JsonCatalog::open(self.data_dir())
            .with_context(|| format!("Failed to open catalog in {}", self.data_dir().display()))
    }

    /// Event log in the data directory
    #[must_use]
    pub fn recorder(&self) -> JsonLinesRecorder {
        JsonLinesRecorder::in_dir(self.data_dir())
    }

    /// Engine options from the configuration
    #[must_use]
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions::from(&self.config)
    }

    fn paint_ok(&self, text: &str) -> String {
        if self.color {
            text.green().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_err(&self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_dim(&self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Load a remote snapshot, or an empty remote when none is given
pub fn load_remote(snapshot: Option<&Path>) -> Result<SnapshotRemote> {
    match snapshot {
        Some(path) => SnapshotRemote::load(path)
            .with_context(|| format!("Failed to load snapshot {}", path.display())),
        None => Ok(SnapshotRemote::new()),
    }
}

/// Print a reconciliation outcome; returns an error if the call failed
pub fn report(ctx: &Context, outcome: &PassOutcome) -> Result<()> {
    for result in &outcome.results {
        let label = result.entry.as_deref().unwrap_or("(call)");
        let status = if result.success {
            ctx.paint_ok("OK")
        } else {
            ctx.paint_err("FAILED")
        };
        println!("{status} {label}");

        for name in &result.added {
            println!("  + {name}");
        }
        for name in &result.updated {
            println!("  ~ {name}");
        }
        for name in &result.removed {
            println!("  - {name}");
        }
        for name in &result.skipped_frozen {
            println!("  {} {name} (frozen)", ctx.paint_dim("="));
        }
        if let Some(message) = &result.message {
            println!("  {message}");
        }
    }

    match outcome.failure() {
        Some(message) if !outcome.is_success() => anyhow::bail!("Reconciliation failed: {message}"),
        _ if !outcome.is_success() => anyhow::bail!("Reconciliation failed"),
        _ => Ok(()),
    }
}
