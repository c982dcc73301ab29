// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Show cataloged entries and their versions

use super::Context;
use crate::catalog::Catalog;
use crate::language::LanguageRegistry;
use crate::types::{Entry, EntryPath};
use anyhow::{Context as _, Result};

/// List entries, or show one entry when `path` is given
pub fn run(ctx: &Context, path: Option<&str>, json: bool) -> Result<()> {
    let catalog = ctx.open_catalog()?;

    let Some(path) = path else {
        let entries = &catalog.store().entries;
        if json {
            println!("{}", serde_json::to_string_pretty(entries)?);
            return Ok(());
        }
        if entries.is_empty() {
            println!("No entries cataloged.");
        }
        for entry in entries {
            println!(
                "{}  {}  {} version(s)",
                entry.path,
                entry.language,
                entry.versions.len()
            );
        }
        return Ok(());
    };

    let parsed = EntryPath::parse(path)
        .ok_or_else(|| anyhow::anyhow!("Invalid entry path: {path} (expected host/org/repo[/name])"))?;
    let entry = catalog
        .load_entry(&parsed)?
        .with_context(|| format!("Entry not found: {path}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry(ctx, &entry);
    }
    Ok(())
}

fn print_entry(ctx: &Context, entry: &Entry) {
    let registry = LanguageRegistry::default();
    let resolver = registry.get(entry.language);
    println!("{} ({}, {:?})", entry.path, entry.language, entry.kind);
    println!("  descriptor: {}", entry.default_descriptor_path);
    if entry.published {
        println!("  published");
    }
    if !entry.authors.is_empty() {
        println!("  authors: {}", entry.authors.join(", "));
    }

    for version in &entry.versions {
        let status = if version.is_valid() {
            ctx.paint_ok("valid")
        } else {
            ctx.paint_err("invalid")
        };
        let frozen = if version.frozen { " frozen" } else { "" };
        println!(
            "  {} [{:?}] {} {}{} ({} files)",
            version.name,
            version.reference_type,
            version.commit_id.as_deref().unwrap_or("-"),
            status,
            frozen,
            version.source_files.len()
        );
        if let Some(resolver) = resolver {
            let declared = version.effective_descriptor_path(&entry.default_descriptor_path);
            match resolver.identify_primary(&version.source_files, declared) {
                Some(primary) => println!("    primary: {}", primary.absolute_path),
                None => println!("    primary: {}", ctx.paint_dim("none")),
            }
            if let Some(test) = resolver.identify_test_parameter(&version.source_files) {
                println!("    test parameters: {}", test.absolute_path);
            }
        }
        for validation in version.validations.iter().filter(|v| !v.is_valid) {
            println!("    {:?}: {}", validation.category, validation.message);
        }
    }
}
