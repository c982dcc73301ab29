// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Validate a local `.dockstore.yml`

use crate::manifest;
use crate::types::EntryKind;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse the manifest at `path` and list what it declares
pub fn run(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = manifest::parse(&content)?;

    println!("{} is valid (version {})", path.display(), parsed.version);
    for declaration in &parsed.entries {
        let kind = match declaration.kind {
            EntryKind::Workflow => "workflow",
            EntryKind::Service => "service",
        };
        println!(
            "  {} {} ({}) {}",
            kind,
            declaration.name.as_deref().unwrap_or("<unnamed>"),
            declaration.language,
            declaration.primary_descriptor_path
        );
        for test in &declaration.test_parameter_files {
            println!("    test: {test}");
        }
        if !declaration.filters.is_empty() {
            println!("    filtered by branch/tag patterns");
        }
    }
    Ok(())
}
