// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! `.dockstore.yml` manifest parsing
//!
//! Only schema version 1.2 is accepted. Every schema problem is reported as
//! [`SyncError::InvalidManifest`] before any version is touched.

use crate::error::{Result, SyncError};
use crate::paths;
use crate::remote::MANIFEST_PATH;
use crate::types::{DescriptorLanguage, EntryKind, ReferenceType};
use globset::{Glob, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::HashMap;

/// The only manifest schema version understood
pub const SUPPORTED_VERSION: &str = "1.2";

const SERVICE_SUBCLASSES: [&str; 4] = ["DOCKER_COMPOSE", "SWARM", "KUBERNETES", "HELM"];

static NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]+([-_][a-zA-Z0-9]+)*$").expect("entry name regex should compile")
});

// =============================================================================
// Raw Schema
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    #[serde(default)]
    workflows: Vec<RawWorkflow>,
    #[serde(default)]
    services: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkflow {
    name: Option<String>,
    subclass: Option<String>,
    primary_descriptor_path: Option<String>,
    #[serde(default)]
    test_parameter_files: Vec<String>,
    publish: Option<bool>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    #[serde(default)]
    filters: RawFilters,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawService {
    name: Option<String>,
    subclass: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    publish: Option<bool>,
    #[serde(default)]
    authors: Vec<RawAuthor>,
    #[serde(default)]
    filters: RawFilters,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAuthor {
    Name(String),
    Detailed {
        name: Option<String>,
        orcid: Option<String>,
        email: Option<String>,
    },
}

impl RawAuthor {
    fn display(self) -> Option<String> {
        match self {
            Self::Name(name) => Some(name),
            Self::Detailed { name, orcid, email } => name.or(orcid).or(email),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFilters {
    #[serde(default)]
    branches: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
}

// =============================================================================
// Reference Filters
// =============================================================================

/// Patterns matched against reference names; `/.../` entries are regexes
#[derive(Debug, Clone)]
struct PatternSet {
    globs: GlobSet,
    regexes: Vec<Regex>,
}

impl PatternSet {
    fn compile(patterns: &[String]) -> Result<Option<Self>> {
        if patterns.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        let mut regexes = Vec::new();
        for pattern in patterns {
            if let Some(inner) = pattern
                .strip_prefix('/')
                .and_then(|p| p.strip_suffix('/'))
                .filter(|p| !p.is_empty())
            {
                let anchored = format!("^(?:{inner})$");
                regexes.push(Regex::new(&anchored).map_err(|e| {
                    SyncError::InvalidManifest(format!("invalid filter regex {pattern}: {e}"))
                })?);
            } else {
                builder.add(Glob::new(pattern).map_err(|e| {
                    SyncError::InvalidManifest(format!("invalid filter glob {pattern}: {e}"))
                })?);
            }
        }
        let globs = builder
            .build()
            .map_err(|e| SyncError::InvalidManifest(format!("invalid filters: {e}")))?;
        Ok(Some(Self { globs, regexes }))
    }

    fn matches(&self, name: &str) -> bool {
        self.globs.is_match(name) || self.regexes.iter().any(|r| r.is_match(name))
    }
}

/// Which branches and tags an entry accepts
#[derive(Debug, Clone, Default)]
pub struct RefFilter {
    branches: Option<PatternSet>,
    tags: Option<PatternSet>,
}

impl RefFilter {
    fn compile(raw: &RawFilters) -> Result<Self> {
        Ok(Self {
            branches: PatternSet::compile(&raw.branches)?,
            tags: PatternSet::compile(&raw.tags)?,
        })
    }

    /// Whether any filter was declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_none() && self.tags.is_none()
    }

    /// Whether a reference passes.
    ///
    /// Without filters everything passes; once any filter exists a reference
    /// must match the list for its own type.
    #[must_use]
    pub fn accepts(&self, reference_type: ReferenceType, name: &str) -> bool {
        if self.is_empty() {
            return true;
        }
        let set = match reference_type {
            ReferenceType::Branch => self.branches.as_ref(),
            ReferenceType::Tag => self.tags.as_ref(),
            ReferenceType::NotApplicable => None,
        };
        set.is_some_and(|s| s.matches(name))
    }
}

// =============================================================================
// Parsed Manifest
// =============================================================================

/// A workflow or service declared in the manifest
#[derive(Debug, Clone)]
pub struct EntryDeclaration {
    /// Workflow or service
    pub kind: EntryKind,
    /// Sub-name within the repository
    pub name: Option<String>,
    /// Descriptor language
    pub language: DescriptorLanguage,
    /// Service subclass (`DOCKER_COMPOSE`, ...)
    pub service_subclass: Option<String>,
    /// Absolute path of the primary descriptor
    pub primary_descriptor_path: String,
    /// Absolute paths of test parameter files
    pub test_parameter_files: Vec<String>,
    /// Files listed by a service
    pub files: Vec<String>,
    /// Requested publish state, if stated
    pub publish: Option<bool>,
    /// Author names
    pub authors: Vec<String>,
    /// Branch and tag filters
    pub filters: RefFilter,
}

/// A parsed and validated `.dockstore.yml`
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Schema version
    pub version: String,
    /// Declared entries, workflows first
    pub entries: Vec<EntryDeclaration>,
}

impl Manifest {
    /// Find a declaration by sub-name
    #[must_use]
    pub fn entry(&self, name: Option<&str>) -> Option<&EntryDeclaration> {
        self.entries.iter().find(|e| e.name.as_deref() == name)
    }
}

fn invalid(message: impl Into<String>) -> SyncError {
    SyncError::InvalidManifest(message.into())
}

fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Names share one namespace across workflows and services because both map
/// onto the same entry path.
fn check_name(
    name: Option<&String>,
    seen: &mut HashMap<Option<String>, &'static str>,
    what: &'static str,
) -> Result<()> {
    if let Some(name) = name {
        if !NAME.is_match(name) {
            return Err(invalid(format!(
                "{what} name '{name}' may only contain letters, digits, '-' and '_'"
            )));
        }
    }
    if let Some(previous) = seen.insert(name.cloned(), what) {
        return Err(invalid(match (name, previous == what) {
            (Some(name), true) => format!("{what} name '{name}' is declared more than once"),
            (None, true) => format!("more than one unnamed {what} is declared"),
            (Some(name), false) => format!("{what} name '{name}' is already used by a {previous}"),
            (None, false) => format!("an unnamed {what} and an unnamed {previous} are both declared"),
        }));
    }
    Ok(())
}

fn authors(raw: Vec<RawAuthor>) -> Vec<String> {
    raw.into_iter().filter_map(RawAuthor::display).collect()
}

/// Parse and validate manifest text
pub fn parse(content: &str) -> Result<Manifest> {
    let document: Value =
        serde_yaml::from_str(content).map_err(|e| invalid(format!("malformed YAML: {e}")))?;
    if !document.is_mapping() {
        return Err(invalid("top level must be a mapping"));
    }
    let version = document
        .get("version")
        .and_then(version_string)
        .ok_or_else(|| invalid("missing required key 'version'"))?;
    if version != SUPPORTED_VERSION {
        return Err(invalid(format!(
            "unsupported version {version}, expected {SUPPORTED_VERSION}"
        )));
    }

    let raw: RawManifest =
        serde_yaml::from_value(document).map_err(|e| invalid(format!("schema error: {e}")))?;
    if raw.workflows.is_empty() && raw.services.is_empty() {
        return Err(invalid("no workflows or services declared"));
    }
    if raw.services.len() > 1 {
        return Err(invalid("at most one service may be declared"));
    }

    let mut entries = Vec::new();
    let mut seen = HashMap::new();
    for (index, workflow) in raw.workflows.into_iter().enumerate() {
        let label = workflow
            .name
            .clone()
            .unwrap_or_else(|| format!("workflows[{index}]"));
        check_name(workflow.name.as_ref(), &mut seen, "workflow")?;
        let subclass = workflow
            .subclass
            .ok_or_else(|| invalid(format!("{label}: missing required key 'subclass'")))?;
        let language = DescriptorLanguage::from_subclass(&subclass)
            .ok_or_else(|| invalid(format!("{label}: unknown subclass '{subclass}'")))?;
        let primary = workflow
            .primary_descriptor_path
            .ok_or_else(|| invalid(format!("{label}: missing required key 'primaryDescriptorPath'")))?;
        if !primary.starts_with('/') {
            return Err(invalid(format!(
                "{label}: primaryDescriptorPath '{primary}' must be absolute"
            )));
        }
        entries.push(EntryDeclaration {
            kind: EntryKind::Workflow,
            name: workflow.name,
            language,
            service_subclass: None,
            primary_descriptor_path: paths::normalize(&primary),
            test_parameter_files: workflow
                .test_parameter_files
                .iter()
                .map(|p| paths::normalize(p))
                .collect(),
            files: Vec::new(),
            publish: workflow.publish,
            authors: authors(workflow.authors),
            filters: RefFilter::compile(&workflow.filters)?,
        });
    }

    for service in raw.services {
        check_name(service.name.as_ref(), &mut seen, "service")?;
        let subclass = service
            .subclass
            .ok_or_else(|| invalid("service: missing required key 'subclass'"))?
            .to_ascii_uppercase();
        if !SERVICE_SUBCLASSES.contains(&subclass.as_str()) {
            return Err(invalid(format!("service: unknown subclass '{subclass}'")));
        }
        entries.push(EntryDeclaration {
            kind: EntryKind::Service,
            name: service.name,
            language: DescriptorLanguage::Service,
            service_subclass: Some(subclass),
            primary_descriptor_path: MANIFEST_PATH.to_string(),
            test_parameter_files: Vec::new(),
            files: service.files.iter().map(|p| paths::normalize(p)).collect(),
            publish: service.publish,
            authors: authors(service.authors),
            filters: RefFilter::compile(&service.filters)?,
        });
    }

    Ok(Manifest { version, entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r"
version: 1.2
workflows:
  - name: hello
    subclass: WDL
    primaryDescriptorPath: /Dockstore.wdl
    testParameterFiles:
      - /test.json
    authors:
      - name: Jane Doe
        orcid: 0000-0001-2345-6789
    filters:
      branches:
        - main
        - feature/**
      tags:
        - /v\d+\.\d+/
  - name: align
    subclass: cwl
    primaryDescriptorPath: /align/main.cwl
";

    #[test]
    fn test_parse_workflows() {
        let manifest = parse(MANIFEST).unwrap();
        assert_eq!(manifest.version, "1.2");
        assert_eq!(manifest.entries.len(), 2);
        let hello = manifest.entry(Some("hello")).unwrap();
        assert_eq!(hello.language, DescriptorLanguage::Wdl);
        assert_eq!(hello.test_parameter_files, vec!["/test.json".to_string()]);
        assert_eq!(hello.authors, vec!["Jane Doe".to_string()]);
        assert_eq!(manifest.entry(Some("align")).unwrap().language, DescriptorLanguage::Cwl);
    }

    #[test]
    fn test_filters() {
        let manifest = parse(MANIFEST).unwrap();
        let filters = &manifest.entry(Some("hello")).unwrap().filters;
        assert!(filters.accepts(ReferenceType::Branch, "main"));
        assert!(filters.accepts(ReferenceType::Branch, "feature/x/y"));
        assert!(!filters.accepts(ReferenceType::Branch, "develop"));
        assert!(filters.accepts(ReferenceType::Tag, "v1.2"));
        assert!(!filters.accepts(ReferenceType::Tag, "v1.2-rc"));

        let open = &manifest.entry(Some("align")).unwrap().filters;
        assert!(open.accepts(ReferenceType::Tag, "anything"));
    }

    #[test]
    fn test_missing_primary_descriptor_path() {
        let err = parse("version: 1.2\nworkflows:\n  - subclass: WDL\n").unwrap_err();
        assert!(matches!(err, SyncError::InvalidManifest(ref m) if m.contains("primaryDescriptorPath")));
    }

    #[test]
    fn test_missing_subclass() {
        let err = parse("version: 1.2\nworkflows:\n  - primaryDescriptorPath: /a.wdl\n").unwrap_err();
        assert!(matches!(err, SyncError::InvalidManifest(ref m) if m.contains("subclass")));
    }

    #[test]
    fn test_rejects_bad_versions_and_yaml() {
        assert!(parse("version: 1.1\nworkflows: []\n").is_err());
        assert!(parse("workflows: []\n").is_err());
        assert!(parse("version: '1.2'\nworkflows: [\n").is_err());
        assert!(parse("version: \"1.2\"\n").is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_invalid_names() {
        let duplicate = "version: 1.2\nworkflows:\n  - name: a\n    subclass: WDL\n    primaryDescriptorPath: /a.wdl\n  - name: a\n    subclass: WDL\n    primaryDescriptorPath: /b.wdl\n";
        assert!(parse(duplicate).is_err());
        let unnamed = "version: 1.2\nworkflows:\n  - subclass: WDL\n    primaryDescriptorPath: /a.wdl\n  - subclass: WDL\n    primaryDescriptorPath: /b.wdl\n";
        assert!(parse(unnamed).is_err());
        let bad = "version: 1.2\nworkflows:\n  - name: 'a b'\n    subclass: WDL\n    primaryDescriptorPath: /a.wdl\n";
        assert!(parse(bad).is_err());
    }

    #[test]
    fn test_workflow_and_service_share_name_space() {
        let unnamed = "version: 1.2\nworkflows:\n  - subclass: WDL\n    primaryDescriptorPath: /a.wdl\nservices:\n  - subclass: DOCKER_COMPOSE\n";
        let err = parse(unnamed).unwrap_err();
        assert!(matches!(err, SyncError::InvalidManifest(ref m) if m.contains("unnamed service and an unnamed workflow")));

        let same = "version: 1.2\nworkflows:\n  - name: app\n    subclass: WDL\n    primaryDescriptorPath: /a.wdl\nservices:\n  - name: app\n    subclass: DOCKER_COMPOSE\n";
        let err = parse(same).unwrap_err();
        assert!(matches!(err, SyncError::InvalidManifest(ref m) if m.contains("already used by a workflow")));

        let distinct = "version: 1.2\nworkflows:\n  - name: app\n    subclass: WDL\n    primaryDescriptorPath: /a.wdl\nservices:\n  - name: web\n    subclass: DOCKER_COMPOSE\n";
        assert_eq!(parse(distinct).unwrap().entries.len(), 2);
    }

    #[test]
    fn test_relative_primary_path_rejected() {
        let relative = "version: 1.2\nworkflows:\n  - subclass: WDL\n    primaryDescriptorPath: a.wdl\n";
        assert!(parse(relative).is_err());
    }

    #[test]
    fn test_service() {
        let manifest = parse(
            "version: 1.2\nservices:\n  - subclass: docker_compose\n    files:\n      - docker-compose.yml\n",
        )
        .unwrap();
        let service = &manifest.entries[0];
        assert_eq!(service.kind, EntryKind::Service);
        assert_eq!(service.primary_descriptor_path, MANIFEST_PATH);
        assert_eq!(service.files, vec!["/docker-compose.yml".to_string()]);
    }
}
