// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! WDL descriptors

use super::{check_braces, ImportRef, LanguageResolver};
use crate::types::{DescriptorLanguage, FileType};
use once_cell::sync::Lazy;
use regex::Regex;

static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*import\s+["']([^"']+)["']"#).expect("WDL import regex should compile")
});

static BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(workflow|task)\s+[A-Za-z_][A-Za-z0-9_]*\s*\{")
        .expect("WDL block regex should compile")
});

/// Resolver for WDL
#[derive(Debug, Clone, Copy, Default)]
pub struct WdlResolver;

impl LanguageResolver for WdlResolver {
    fn language(&self) -> DescriptorLanguage {
        DescriptorLanguage::Wdl
    }

    fn is_valid_descriptor(&self, content: &str) -> Result<(), String> {
        if content.trim().is_empty() {
            return Err("descriptor is empty".into());
        }
        check_braces(content, "#")?;
        if !BLOCK.is_match(content) {
            return Err("no workflow or task block found".into());
        }
        Ok(())
    }

    fn extract_imports(&self, _file_path: &str, content: &str) -> Vec<ImportRef> {
        content
            .lines()
            .filter_map(|line| IMPORT.captures(line))
            .map(|caps| ImportRef {
                path: caps[1].trim().to_string(),
                file_type: FileType::DockstoreWdl,
            })
            .collect()
    }
}
