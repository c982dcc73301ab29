// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Nextflow descriptors
//!
//! The primary descriptor is `nextflow.config`. It pulls in other configs with
//! `includeConfig` and names the entry script in `manifest.mainScript`
//! (`main.nf` when absent). Scripts include DSL2 modules with
//! `include { X } from './path'`.

use super::{check_braces, resolve_recursive, ImportContext, ImportRef, LanguageResolver, ResolvedImports};
use crate::paths;
use crate::types::{DescriptorLanguage, FileType};
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_MAIN_SCRIPT: &str = "main.nf";

static INCLUDE_CONFIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*includeConfig\s+["']([^"']+)["']"#)
        .expect("includeConfig regex should compile")
});

static MAIN_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)mainScript\s*=\s*["']([^"']+)["']"#).expect("mainScript regex should compile")
});

static INCLUDE_MODULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*include\s*\{[^}]*\}\s*from\s*["']([^"']+)["']"#)
        .expect("include regex should compile")
});

/// Resolver for Nextflow
#[derive(Debug, Clone, Copy, Default)]
pub struct NextflowResolver;

impl NextflowResolver {
    /// Entry script named by a config, relative to the config's directory
    #[must_use]
    pub fn main_script(config: &str) -> String {
        MAIN_SCRIPT
            .captures(config)
            .map_or_else(|| DEFAULT_MAIN_SCRIPT.to_string(), |caps| caps[1].trim().to_string())
    }
}

fn is_config(file_path: &str) -> bool {
    file_path.ends_with(".config")
}

impl LanguageResolver for NextflowResolver {
    fn language(&self) -> DescriptorLanguage {
        DescriptorLanguage::Nextflow
    }

    fn is_valid_descriptor(&self, content: &str) -> Result<(), String> {
        if content.trim().is_empty() {
            return Err("nextflow.config is empty".into());
        }
        check_braces(content, "//")
    }

    fn extract_imports(&self, file_path: &str, content: &str) -> Vec<ImportRef> {
        let mut imports = Vec::new();
        if is_config(file_path) {
            imports.extend(INCLUDE_CONFIG.captures_iter(content).map(|caps| ImportRef {
                path: caps[1].trim().to_string(),
                file_type: FileType::NextflowConfig,
            }));
        } else {
            imports.extend(INCLUDE_MODULE.captures_iter(content).map(|caps| {
                let raw = caps[1].trim();
                let path = if raw.ends_with(".nf") || paths::is_url(raw) {
                    raw.to_string()
                } else {
                    format!("{raw}.nf")
                };
                ImportRef {
                    path,
                    file_type: FileType::Nextflow,
                }
            }));
        }
        imports
    }

    /// Only the primary config names the entry script; nested configs do not.
    fn resolve_imports(
        &self,
        ctx: &ImportContext<'_>,
        primary_path: &str,
        content: &str,
    ) -> crate::error::Result<ResolvedImports> {
        let primary = paths::normalize(primary_path);
        resolve_recursive(ctx, primary_path, content, |path, text| {
            let mut imports = self.extract_imports(path, text);
            if path == primary {
                imports.push(ImportRef {
                    path: Self::main_script(text),
                    file_type: FileType::Nextflow,
                });
            }
            imports
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ImportContext;
    use crate::remote::SnapshotRemote;
    use crate::types::ReferenceType;

    const CONFIG: &str = r"
manifest {
    mainScript = 'pipeline.nf'
    // a comment with a brace {
}
includeConfig 'conf/base.config'
";

    #[test]
    fn test_valid_descriptor() {
        assert!(NextflowResolver.is_valid_descriptor(CONFIG).is_ok());
        assert!(NextflowResolver.is_valid_descriptor("  ").is_err());
        assert!(NextflowResolver.is_valid_descriptor("manifest {").is_err());
    }

    #[test]
    fn test_main_script_default() {
        assert_eq!(NextflowResolver::main_script("params.x = 1"), "main.nf");
        assert_eq!(NextflowResolver::main_script(CONFIG), "pipeline.nf");
    }

    #[test]
    fn test_resolve_config_and_modules() {
        let mut remote = SnapshotRemote::new();
        remote.set_version(
            "org/nf",
            "master",
            ReferenceType::Branch,
            "c1",
            &[
                ("/nextflow.config", CONFIG),
                ("/conf/base.config", "process.cpus = 2"),
                ("/pipeline.nf", "include { ALIGN } from './modules/align'\nworkflow {}"),
                ("/modules/align.nf", "process ALIGN {}"),
            ],
        );
        let ctx = ImportContext {
            remote: &remote,
            repository: "org/nf",
            reference: "master",
            max_depth: 10,
        };
        let resolved = NextflowResolver
            .resolve_imports(&ctx, "/nextflow.config", CONFIG)
            .unwrap();
        let mut found: Vec<_> = resolved
            .files
            .values()
            .map(|f| (f.absolute_path.as_str(), f.file_type))
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                ("/conf/base.config", FileType::NextflowConfig),
                ("/modules/align.nf", FileType::Nextflow),
                ("/pipeline.nf", FileType::Nextflow),
            ]
        );
        assert!(resolved.missing.is_empty());
    }

    #[test]
    fn test_nested_nextflow_config_does_not_name_main_script() {
        let primary = "includeConfig 'conf/nextflow.config'\n";
        let mut remote = SnapshotRemote::new();
        remote.set_version(
            "org/nf",
            "master",
            ReferenceType::Branch,
            "c1",
            &[
                ("/nextflow.config", primary),
                ("/conf/nextflow.config", "params.x = 1"),
                ("/conf/main.nf", "workflow {}"),
                ("/main.nf", "workflow {}"),
            ],
        );
        let ctx = ImportContext {
            remote: &remote,
            repository: "org/nf",
            reference: "master",
            max_depth: 10,
        };
        let resolved = NextflowResolver
            .resolve_imports(&ctx, "/nextflow.config", primary)
            .unwrap();
        let mut found: Vec<_> = resolved.files.values().map(|f| f.absolute_path.as_str()).collect();
        found.sort_unstable();
        assert_eq!(found, vec!["/conf/nextflow.config", "/main.nf"]);
        assert!(NextflowResolver
            .extract_imports("/conf/nextflow.config", "params.x = 1")
            .is_empty());
    }
}
