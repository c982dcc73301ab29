// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Descriptor language resolvers
//!
//! Each language implements [`LanguageResolver`]: syntax checking, import
//! resolution and primary descriptor identification. Resolvers are looked up
//! by [`DescriptorLanguage`] through a [`LanguageRegistry`], so supporting a
//! new language means registering one more implementation.

pub mod cwl;
pub mod nextflow;
pub mod service;
pub mod wdl;

use crate::error::Result;
use crate::paths;
use crate::remote::{self, RemoteRepository};
use crate::types::{DescriptorLanguage, FileType, SourceFile};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, warn};

/// Where imports are fetched from
pub struct ImportContext<'a> {
    /// Remote serving the files
    pub remote: &'a dyn RemoteRepository,
    /// Repository as `org/repo`
    pub repository: &'a str,
    /// Reference being resolved
    pub reference: &'a str,
    /// Maximum import nesting followed
    pub max_depth: usize,
}

/// Files reachable from a primary descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedImports {
    /// Imported files keyed by the path the importing descriptor used
    pub files: BTreeMap<String, SourceFile>,
    /// Local imports that do not exist on the remote
    pub missing: Vec<String>,
    /// URL imports left unresolved
    pub skipped_urls: Vec<String>,
}

/// An import reference found in a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// Path as written in the descriptor
    pub path: String,
    /// Type the imported file is stored as
    pub file_type: FileType,
}

/// Capabilities every descriptor language provides
pub trait LanguageResolver: Send + Sync {
    /// Language handled
    fn language(&self) -> DescriptorLanguage;

    /// Whether `content` is a syntactically valid primary descriptor
    fn is_valid_descriptor(&self, content: &str) -> std::result::Result<(), String>;

    /// Imports referenced by one file of this language
    fn extract_imports(&self, file_path: &str, content: &str) -> Vec<ImportRef>;

    /// Fetch every file reachable from the primary descriptor.
    ///
    /// Missing local imports and URL imports are reported, not fatal; remote
    /// fetch errors are.
    fn resolve_imports(
        &self,
        ctx: &ImportContext<'_>,
        primary_path: &str,
        content: &str,
    ) -> Result<ResolvedImports> {
        resolve_recursive(ctx, primary_path, content, |path, text| {
            self.extract_imports(path, text)
        })
    }

    /// File type of the primary descriptor
    fn primary_file_type(&self) -> FileType {
        self.language().primary_file_type()
    }

    /// File type of test parameter files
    fn test_parameter_file_type(&self) -> Option<FileType> {
        self.language().test_parameter_file_type()
    }

    /// The primary descriptor among `files`
    fn identify_primary<'f>(&self, files: &'f [SourceFile], declared_path: &str) -> Option<&'f SourceFile> {
        identify_primary(files, self.primary_file_type(), declared_path)
    }

    /// The test parameter file that stands for the version, if the language has any
    fn identify_test_parameter<'f>(&self, files: &'f [SourceFile]) -> Option<&'f SourceFile> {
        identify_test_parameter(files, self.test_parameter_file_type()?)
    }
}

/// Registry of resolvers keyed by language
pub struct LanguageRegistry {
    resolvers: BTreeMap<DescriptorLanguage, Box<dyn LanguageResolver>>,
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(cwl::CwlResolver));
        registry.register(Box::new(wdl::WdlResolver));
        registry.register(Box::new(nextflow::NextflowResolver));
        registry.register(Box::new(service::ServiceResolver));
        registry
    }
}

impl LanguageRegistry {
    /// A registry with no languages
    #[must_use]
    pub fn empty() -> Self {
        Self {
            resolvers: BTreeMap::new(),
        }
    }

    /// Register a resolver, replacing any previous one for its language
    pub fn register(&mut self, resolver: Box<dyn LanguageResolver>) {
        self.resolvers.insert(resolver.language(), resolver);
    }

    /// Resolver for `language`
    #[must_use]
    pub fn get(&self, language: DescriptorLanguage) -> Option<&dyn LanguageResolver> {
        self.resolvers.get(&language).map(|r| r.as_ref())
    }
}

/// Primary descriptor rule shared by every language.
///
/// The file must have `file_type` and a path equal to `declared_path`
/// ignoring case; an exact match wins over a case-insensitive one, then the
/// lowest absolute path.
#[must_use]
pub fn identify_primary<'f>(
    files: &'f [SourceFile],
    file_type: FileType,
    declared_path: &str,
) -> Option<&'f SourceFile> {
    let declared = paths::normalize(declared_path);
    let candidates: Vec<&SourceFile> = files
        .iter()
        .filter(|f| f.file_type == file_type)
        .filter(|f| {
            f.absolute_path.eq_ignore_ascii_case(&declared)
                || paths::normalize(&f.path).eq_ignore_ascii_case(&declared)
        })
        .collect();
    candidates
        .iter()
        .copied()
        .find(|f| f.absolute_path == declared)
        .or_else(|| candidates.into_iter().min_by(|a, b| a.absolute_path.cmp(&b.absolute_path)))
}

/// The test parameter file that stands for its type, if any
#[must_use]
pub fn identify_test_parameter(files: &[SourceFile], file_type: FileType) -> Option<&SourceFile> {
    files
        .iter()
        .filter(|f| f.file_type == file_type)
        .min_by(|a, b| a.absolute_path.cmp(&b.absolute_path))
}

/// Breadth-first import resolution shared by the file-based languages
pub(crate) fn resolve_recursive<F>(
    ctx: &ImportContext<'_>,
    primary_path: &str,
    content: &str,
    extract: F,
) -> Result<ResolvedImports>
where
    F: Fn(&str, &str) -> Vec<ImportRef>,
{
    let primary = paths::normalize(primary_path);
    let mut resolved = ResolvedImports::default();
    let mut visited: BTreeSet<String> = BTreeSet::from([primary.clone()]);
    let mut queue: VecDeque<(String, String, usize)> = VecDeque::from([(primary, content.to_string(), 0)]);

    while let Some((importer, text, depth)) = queue.pop_front() {
        let imports = extract(&importer, &text);
        if depth >= ctx.max_depth && !imports.is_empty() {
            warn!("Not following imports of {} beyond depth {}", importer, ctx.max_depth);
            continue;
        }
        for import in imports {
            if paths::is_url(&import.path) {
                debug!("Skipping URL import {} in {}", import.path, importer);
                resolved.skipped_urls.push(import.path);
                continue;
            }
            let written = paths::strip_file_scheme(&import.path).to_string();
            let absolute = paths::absolute_path(&paths::parent_dir(&importer), &written);
            if !visited.insert(absolute.clone()) {
                continue;
            }
            match remote::fetch_text(ctx.remote, ctx.repository, ctx.reference, &absolute)? {
                None => {
                    warn!("Import {} from {} not found at {}", written, importer, ctx.reference);
                    resolved.missing.push(written);
                }
                Some(imported) => {
                    queue.push_back((absolute.clone(), imported.clone(), depth + 1));
                    let file = SourceFile::new(import.file_type, written.clone(), absolute.clone(), Some(imported));
                    let key = if resolved.files.contains_key(&written) { absolute } else { written };
                    resolved.files.insert(key, file);
                }
            }
        }
    }

    Ok(resolved)
}

/// Check that curly braces balance, ignoring line comments starting with `comment`
pub(crate) fn check_braces(content: &str, comment: &str) -> std::result::Result<(), String> {
    let mut depth: i64 = 0;
    for (number, line) in content.lines().enumerate() {
        let code = line.split_once(comment).map_or(line, |(code, _)| code);
        for ch in code.chars() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(format!("unexpected '}}' on line {}", number + 1));
                    }
                }
                _ => {}
            }
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(format!("{depth} unclosed '{{'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(file_type: FileType, path: &str) -> SourceFile {
        SourceFile::new(file_type, path, paths::normalize(path), Some(String::new()))
    }

    #[test]
    fn test_registry_has_all_languages() {
        let registry = LanguageRegistry::default();
        for language in DescriptorLanguage::ALL {
            assert_eq!(registry.get(language).map(|r| r.language()), Some(language));
        }
    }

    #[test]
    fn test_identify_primary_case_insensitive() {
        let files = vec![
            file(FileType::DockstoreWdl, "/dockstore.wdl"),
            file(FileType::WdlTestJson, "/Dockstore.wdl"),
        ];
        let primary = identify_primary(&files, FileType::DockstoreWdl, "/Dockstore.wdl").unwrap();
        assert_eq!(primary.absolute_path, "/dockstore.wdl");
    }

    #[test]
    fn test_identify_primary_prefers_exact_match() {
        let files = vec![
            file(FileType::DockstoreWdl, "/dockstore.wdl"),
            file(FileType::DockstoreWdl, "/Dockstore.wdl"),
        ];
        let primary = identify_primary(&files, FileType::DockstoreWdl, "Dockstore.wdl").unwrap();
        assert_eq!(primary.absolute_path, "/Dockstore.wdl");
    }

    #[test]
    fn test_identify_primary_requires_type() {
        let files = vec![file(FileType::DockstoreCwl, "/Dockstore.wdl")];
        assert!(identify_primary(&files, FileType::DockstoreWdl, "/Dockstore.wdl").is_none());
    }

    #[test]
    fn test_identify_test_parameter_lowest_path() {
        let files = vec![
            file(FileType::DockstoreWdl, "/Dockstore.wdl"),
            file(FileType::WdlTestJson, "/tests/b.json"),
            file(FileType::WdlTestJson, "/tests/a.json"),
        ];
        let resolver = LanguageRegistry::default();
        let wdl = resolver.get(DescriptorLanguage::Wdl).unwrap();
        assert_eq!(wdl.identify_test_parameter(&files).unwrap().absolute_path, "/tests/a.json");
        assert_eq!(wdl.identify_primary(&files, "/Dockstore.wdl").unwrap().absolute_path, "/Dockstore.wdl");
        let service = resolver.get(DescriptorLanguage::Service).unwrap();
        assert!(service.identify_test_parameter(&files).is_none());
    }

    #[test]
    fn test_check_braces() {
        assert!(check_braces("a { b { } }", "#").is_ok());
        assert!(check_braces("a { # }\n", "#").is_err());
        assert!(check_braces("}{", "#").is_err());
    }
}
