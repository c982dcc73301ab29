// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Mark a version frozen, as a snapshot or DOI request would

use super::Context;
use crate::types::EntryPath;
use anyhow::{Context as _, Result};

/// Freeze `version` of the entry at `path`
pub fn run(ctx: &Context, path: &str, version: &str) -> Result<()> {
    let parsed = EntryPath::parse(path)
        .ok_or_else(|| anyhow::anyhow!("Invalid entry path: {path} (expected host/org/repo[/name])"))?;
    let mut catalog = ctx.open_catalog()?;

    let entry = catalog
        .store_mut()
        .entries
        .iter_mut()
        .find(|e| e.path == parsed)
        .with_context(|| format!("Entry not found: {path}"))?;
    let target = entry
        .versions
        .iter_mut()
        .find(|v| v.name == version)
        .with_context(|| format!("Version {version} not found in {path}"))?;

    if target.frozen {
        println!("{path}@{version} is already frozen");
        return Ok(());
    }
    target.frozen = true;
    catalog.save()?;
    println!("Froze {path}@{version}");
    Ok(())
}
