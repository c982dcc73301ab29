// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Services
//!
//! A service has no descriptor of its own: the manifest is its primary file and
//! the `files` it lists under `services` are the secondary files.

use super::{ImportRef, LanguageResolver};
use crate::remote::MANIFEST_PATH;
use crate::types::{DescriptorLanguage, FileType};
use serde_yaml::Value;

/// Resolver for services declared in the manifest
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceResolver;

impl LanguageResolver for ServiceResolver {
    fn language(&self) -> DescriptorLanguage {
        DescriptorLanguage::Service
    }

    fn is_valid_descriptor(&self, content: &str) -> Result<(), String> {
        match serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string())? {
            Value::Mapping(_) => Ok(()),
            _ => Err("manifest must be a mapping".into()),
        }
    }

    fn extract_imports(&self, file_path: &str, content: &str) -> Vec<ImportRef> {
        if file_path != MANIFEST_PATH {
            return Vec::new();
        }
        let Ok(document) = serde_yaml::from_str::<Value>(content) else {
            return Vec::new();
        };
        document
            .get("services")
            .and_then(Value::as_sequence)
            .into_iter()
            .flatten()
            .filter_map(|service| service.get("files").and_then(Value::as_sequence))
            .flatten()
            .filter_map(Value::as_str)
            .map(|path| ImportRef {
                path: path.to_string(),
                file_type: FileType::DockstoreServiceOther,
            })
            .collect()
    }
}
