// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! CWL descriptors
//!
//! CWL documents are YAML (JSON being a subset). Other files are pulled in
//! through `run`, `$import`, `$include` and `$mixin` values anywhere in the tree.

use super::{ImportRef, LanguageResolver};
use crate::types::{DescriptorLanguage, FileType};
use serde_yaml::Value;

const IMPORT_KEYS: [&str; 4] = ["run", "$import", "$include", "$mixin"];
const CLASSES: [&str; 3] = ["Workflow", "CommandLineTool", "ExpressionTool"];

/// Resolver for CWL
#[derive(Debug, Clone, Copy, Default)]
pub struct CwlResolver;

impl LanguageResolver for CwlResolver {
    fn language(&self) -> DescriptorLanguage {
        DescriptorLanguage::Cwl
    }

    fn is_valid_descriptor(&self, content: &str) -> Result<(), String> {
        let document: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        let Value::Mapping(map) = &document else {
            return Err("CWL document must be a mapping".into());
        };
        if map.get("cwlVersion").and_then(Value::as_str).is_none() {
            return Err("missing cwlVersion".into());
        }
        match map.get("class").and_then(Value::as_str) {
            Some(class) if CLASSES.contains(&class) => Ok(()),
            Some(class) => Err(format!("unsupported class {class}")),
            None => Err("missing class".into()),
        }
    }

    fn extract_imports(&self, _file_path: &str, content: &str) -> Vec<ImportRef> {
        let Ok(document) = serde_yaml::from_str::<Value>(content) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        collect(&document, &mut found);
        found
            .into_iter()
            .map(|path| ImportRef {
                path,
                file_type: FileType::DockstoreCwl,
            })
            .collect()
    }
}

fn collect(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_import = key.as_str().is_some_and(|k| IMPORT_KEYS.contains(&k));
                match child.as_str() {
                    Some(target) if is_import => {
                        let target = target.split('#').next().unwrap_or_default().trim();
                        if !target.is_empty() && !found.iter().any(|f| f == target) {
                            found.push(target.to_string());
                        }
                    }
                    _ => collect(child, found),
                }
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect(item, found);
            }
        }
        Value::Tagged(tagged) => collect(&tagged.value, found),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r"
cwlVersion: v1.2
class: Workflow
requirements:
  - $import: types/defs.yml
steps:
  align:
    run: tools/align.cwl
  sort:
    run: tools/sort.cwl#main
  inline:
    run:
      class: CommandLineTool
      baseCommand: echo
  remote:
    run: https://example.com/tool.cwl
";

    #[test]
    fn test_valid_descriptor() {
        assert!(CwlResolver.is_valid_descriptor(WORKFLOW).is_ok());
        assert!(CwlResolver.is_valid_descriptor("class: Workflow").is_err());
        assert!(CwlResolver.is_valid_descriptor("cwlVersion: v1.2\nclass: Nope").is_err());
        assert!(CwlResolver.is_valid_descriptor("- just\n- a list").is_err());
        assert!(CwlResolver.is_valid_descriptor("cwlVersion: [unclosed").is_err());
    }

    #[test]
    fn test_extract_imports() {
        let imports: Vec<_> = CwlResolver
            .extract_imports("/main.cwl", WORKFLOW)
            .into_iter()
            .map(|i| i.path)
            .collect();
        assert_eq!(
            imports,
            vec![
                "types/defs.yml",
                "tools/align.cwl",
                "tools/sort.cwl",
                "https://example.com/tool.cwl",
            ]
        );
    }

    #[test]
    fn test_json_descriptor() {
        let json = r#"{"cwlVersion": "v1.0", "class": "CommandLineTool", "baseCommand": "ls"}"#;
        assert!(CwlResolver.is_valid_descriptor(json).is_ok());
        assert!(CwlResolver.extract_imports("/tool.cwl", json).is_empty());
    }
}
