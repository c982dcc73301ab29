// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Reconciliation orchestration
//!
//! One [`Reconciler`] call handles one webhook event or refresh request:
//! fetch the remote state, diff it against the catalog, merge each affected
//! version and attach its validations. Each version is built on a copy and
//! saved on its own, so a failure or cancellation never leaves a half-merged
//! version behind.
//!
//! Callers must serialise calls that touch the same repository.

use crate::catalog::Catalog;
use crate::config::{Config, IsolationPolicy};
use crate::diff::{self, DiffMode, RemoteListing};
use crate::error::{Result, SyncError};
use crate::events::EventRecorder;
use crate::freeze;
use crate::language::{ImportContext, LanguageRegistry};
use crate::manifest::{self, EntryDeclaration};
use crate::merge;
use crate::paths;
use crate::remote::{self, RemoteRepository, MANIFEST_PATH};
use crate::types::{
    ChecksumAlgorithm, DescriptorLanguage, Entry, EntryPath, EntrySyncResult, FileType,
    RemoteVersionRef, SourceFile, Validation, ValidationCategory, Version,
};
use crate::validation::{self, ValidationSet};
use crate::webhook::{EventType, GitReference, WebhookEvent};
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Phase of a reconciliation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// Reading remote state
    Fetching,
    /// Classifying versions
    Diffing,
    /// Building and merging version file sets
    Merging,
    /// Attaching validations
    Aggregating,
    /// Finished with every result successful
    Done,
    /// Finished with at least one failure
    Failed,
}

/// Engine settings for a call
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Algorithm for new checksums
    pub checksum_algorithm: ChecksumAlgorithm,
    /// Failure isolation
    pub isolation: IsolationPolicy,
    /// Deepest import chain followed
    pub max_import_depth: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            checksum_algorithm: ChecksumAlgorithm::default(),
            isolation: IsolationPolicy::default(),
            max_import_depth: 10,
        }
    }
}

impl From<&Config> for ReconcileOptions {
    fn from(config: &Config) -> Self {
        Self {
            checksum_algorithm: config.checksum_algorithm,
            isolation: config.isolation,
            max_import_depth: config.max_import_depth,
        }
    }
}

/// Shared flag for cancelling a call between versions
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an uncancelled token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one call produced
#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// Final state, `Done` or `Failed`
    pub state: PassState,
    /// One result per affected entry, or a single call-level result
    pub results: Vec<EntrySyncResult>,
}

impl PassOutcome {
    /// Whether the call applied everything it set out to
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == PassState::Done
    }

    /// First failure message, if any
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .find_map(|r| r.message.as_deref())
    }
}

/// One remote version together with the manifest that declared it
#[derive(Debug, Clone)]
struct VersionSource {
    remote: RemoteVersionRef,
    declaration: EntryDeclaration,
    manifest_text: String,
}

/// Drives reconciliation against the collaborators
pub struct Reconciler<'a> {
    remote: &'a dyn RemoteRepository,
    catalog: &'a mut dyn Catalog,
    recorder: &'a mut dyn EventRecorder,
    languages: LanguageRegistry,
    options: ReconcileOptions,
    cancel: CancellationToken,
    state: Cell<PassState>,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler with default options and every language registered
    pub fn new(
        remote: &'a dyn RemoteRepository,
        catalog: &'a mut dyn Catalog,
        recorder: &'a mut dyn EventRecorder,
    ) -> Self {
        Self {
            remote,
            catalog,
            recorder,
            languages: LanguageRegistry::default(),
            options: ReconcileOptions::default(),
            cancel: CancellationToken::new(),
            state: Cell::new(PassState::Done),
        }
    }

    /// Use these options
    #[must_use]
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Use this language registry
    #[must_use]
    pub fn with_languages(mut self, languages: LanguageRegistry) -> Self {
        self.languages = languages;
        self
    }

    /// Observe this cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    // =========================================================================
    // Entry Points
    // =========================================================================

    /// Handle a push or delete webhook event
    pub fn handle_event(&mut self, event: &WebhookEvent) -> PassOutcome {
        info!(
            "Handling {:?} of {} on {} by {}",
            event.event_type, event.git_reference, event.repository, event.username
        );
        let mut results = Vec::new();
        let status = match event.event_type {
            EventType::Push => self.push(event, &mut results),
            EventType::Delete => self.delete(event, &mut results),
        };
        self.finish(status, results)
    }

    /// Re-sync every branch and tag of `repository`, removing versions that are gone
    pub fn refresh_repository(&mut self, repository: &str, username: &str) -> PassOutcome {
        info!("Refreshing all versions of {} for {}", repository, username);
        let mut results = Vec::new();
        let status = self.full_sync(repository, username, &mut results);
        self.finish(status, results)
    }

    /// Rebuild one version even if its commit did not move
    pub fn refresh_version(
        &mut self,
        repository: &str,
        entry_name: Option<&str>,
        version: &str,
        username: &str,
    ) -> PassOutcome {
        info!("Refreshing version {} of {} for {}", version, repository, username);
        let mut results = Vec::new();
        let status = self.single_version(repository, entry_name, version, username, &mut results);
        self.finish(status, results)
    }

    // =========================================================================
    // Passes
    // =========================================================================

    fn push(&mut self, event: &WebhookEvent, results: &mut Vec<EntrySyncResult>) -> Result<()> {
        self.transition(PassState::Fetching);
        let reference = GitReference::parse(&event.git_reference)?;
        self.check_user(&event.username)?;
        let repo_path = repository_path(&event.repository)?;

        let (manifest_text, manifest) = self.fetch_manifest(&event.repository, &reference.name)?;
        let mut remote_version = self
            .remote
            .describe_version(&event.repository, &reference.name)?
            .ok_or_else(|| {
                SyncError::fetch(&event.repository, &reference.name, "reference", "not found on remote")
            })?;
        remote_version.reference_type = reference.reference_type;

        for declaration in &manifest.entries {
            if !declaration
                .filters
                .accepts(reference.reference_type, &reference.name)
            {
                debug!(
                    "{} filtered out for {:?}",
                    reference.name,
                    declaration.name.as_deref().unwrap_or("<unnamed>")
                );
                continue;
            }
            let path = EntryPath {
                name: declaration.name.clone(),
                ..repo_path.clone()
            };
            let sources = vec![VersionSource {
                remote: remote_version.clone(),
                declaration: declaration.clone(),
                manifest_text: manifest_text.clone(),
            }];
            let listing = RemoteListing::complete(vec![remote_version.clone()]);
            self.sync_entry(&path, &sources, &listing, DiffMode::Push, &BTreeSet::new(), results)?;
        }
        Ok(())
    }

    fn delete(&mut self, event: &WebhookEvent, results: &mut Vec<EntrySyncResult>) -> Result<()> {
        self.transition(PassState::Fetching);
        let reference = GitReference::parse(&event.git_reference)?;
        self.check_user(&event.username)?;
        let repo_path = repository_path(&event.repository)?;

        self.transition(PassState::Merging);
        for mut entry in self.catalog.entries_for_repository(&repo_path)? {
            let Some(version) = entry.version(&reference.name) else {
                continue;
            };
            let mut result = EntrySyncResult::for_entry(&entry.path);
            if freeze::is_mutable(version) {
                entry.remove_version(&reference.name);
                self.catalog.save_entry(entry)?;
                result.removed.push(reference.name.clone());
                info!("Removed {} from {}", reference.name, result.entry.as_deref().unwrap_or_default());
            } else {
                info!("Kept frozen {} of {}", reference.name, entry.path);
                result.skipped_frozen.push(reference.name.clone());
            }
            results.push(result);
        }
        Ok(())
    }

    fn full_sync(
        &mut self,
        repository: &str,
        username: &str,
        results: &mut Vec<EntrySyncResult>,
    ) -> Result<()> {
        self.transition(PassState::Fetching);
        self.check_user(username)?;
        let repo_path = repository_path(repository)?;
        let listed = self.remote.list_versions(repository)?;

        let mut protected = BTreeSet::new();
        let mut sources: BTreeMap<Option<String>, Vec<VersionSource>> = BTreeMap::new();
        for remote_version in &listed {
            let Some(bytes) = self.remote.fetch_manifest(repository, &remote_version.name)? else {
                debug!("{} has no manifest", remote_version.name);
                continue;
            };
            let manifest_text = String::from_utf8_lossy(&bytes).into_owned();
            let parsed = match manifest::parse(&manifest_text) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("Skipping {}: {}", remote_version.name, err);
                    protected.insert(remote_version.name.clone());
                    continue;
                }
            };
            for declaration in parsed.entries {
                if !declaration
                    .filters
                    .accepts(remote_version.reference_type, &remote_version.name)
                {
                    continue;
                }
                sources
                    .entry(declaration.name.clone())
                    .or_default()
                    .push(VersionSource {
                        remote: remote_version.clone(),
                        declaration,
                        manifest_text: manifest_text.clone(),
                    });
            }
        }

        let mut names: BTreeSet<Option<String>> = sources.keys().cloned().collect();
        for entry in self.catalog.entries_for_repository(&repo_path)? {
            names.insert(entry.path.name.clone());
        }

        for name in names {
            let path = EntryPath {
                name: name.clone(),
                ..repo_path.clone()
            };
            let entry_sources = sources.remove(&name).unwrap_or_default();
            let listing = RemoteListing {
                versions: entry_sources.iter().map(|s| s.remote.clone()).collect(),
                complete: true,
                protected: protected.clone(),
            };
            self.sync_entry(&path, &entry_sources, &listing, DiffMode::FullSync, &BTreeSet::new(), results)?;
        }
        Ok(())
    }

    fn single_version(
        &mut self,
        repository: &str,
        entry_name: Option<&str>,
        version: &str,
        username: &str,
        results: &mut Vec<EntrySyncResult>,
    ) -> Result<()> {
        self.transition(PassState::Fetching);
        self.check_user(username)?;
        let repo_path = repository_path(repository)?;
        let remote_version = self
            .remote
            .describe_version(repository, version)?
            .ok_or_else(|| SyncError::fetch(repository, version, "reference", "not found on remote"))?;
        let (manifest_text, manifest) = self.fetch_manifest(repository, version)?;
        let declaration = manifest.entry(entry_name).cloned().ok_or_else(|| {
            SyncError::InvalidManifest(format!(
                "no entry named {} is declared at {version}",
                entry_name.unwrap_or("<unnamed>")
            ))
        })?;

        let path = EntryPath {
            name: entry_name.map(String::from),
            ..repo_path
        };
        let forced = BTreeSet::from([version.to_string()]);
        let listing = RemoteListing::complete(vec![remote_version.clone()]);
        let sources = vec![VersionSource {
            remote: remote_version,
            declaration,
            manifest_text,
        }];
        self.sync_entry(&path, &sources, &listing, DiffMode::Push, &forced, results)
    }

    // =========================================================================
    // Per-Entry and Per-Version Work
    // =========================================================================

    /// Apply one entry's diff. Pushes the entry's result onto `results`.
    ///
    /// Returns `Err` only when the whole call must stop.
    fn sync_entry(
        &mut self,
        path: &EntryPath,
        sources: &[VersionSource],
        listing: &RemoteListing,
        mode: DiffMode,
        forced: &BTreeSet<String>,
        results: &mut Vec<EntrySyncResult>,
    ) -> Result<()> {
        self.transition(PassState::Diffing);
        let mut result = EntrySyncResult::for_entry(path);

        let existing = self.catalog.load_entry(path)?;
        let is_new = existing.is_none();
        let mut entry = match (existing, sources.first()) {
            (Some(entry), _) => entry,
            (None, Some(source)) => new_entry(path, &source.declaration),
            (None, None) => return Ok(()),
        };
        let mut dirty = sources
            .first()
            .is_some_and(|s| apply_entry_metadata(&mut entry, &s.declaration));

        let diff = match diff::diff(&entry.versions, listing, mode, forced) {
            Ok(diff) => diff,
            Err(err) => return Err(abort(result, results, err)),
        };
        result.skipped_frozen.clone_from(&diff.frozen);
        if diff.is_empty() && !dirty {
            debug!("{} is up to date", path);
            if !diff.frozen.is_empty() {
                results.push(result);
            }
            return Ok(());
        }

        self.transition(PassState::Merging);
        let added: BTreeSet<&str> = diff.added.iter().map(|v| v.name.as_str()).collect();
        for remote_version in diff.added.iter().chain(&diff.updated) {
            if self.cancel.is_cancelled() {
                return Err(abort(result, results, SyncError::Cancelled));
            }
            let Some(source) = sources.iter().find(|s| s.remote.name == remote_version.name) else {
                continue;
            };
            match self.build_version(&entry, source) {
                Ok(version) => {
                    let name = version.name.clone();
                    let mut candidate = entry.clone();
                    candidate.upsert_version(version);
                    entry = match self.catalog.save_entry(candidate) {
                        Ok(saved) => saved,
                        Err(err) => return Err(abort(result, results, err)),
                    };
                    dirty = false;
                    if added.contains(name.as_str()) {
                        info!("Added {} to {}", name, path);
                        result.added.push(name);
                    } else {
                        info!("Updated {} of {}", name, path);
                        result.updated.push(name);
                    }
                }
                Err(err) => {
                    warn!("Version {} of {} failed: {}", remote_version.name, path, err);
                    result.fail(format!("{}: {err}", remote_version.name));
                    if self.options.isolation == IsolationPolicy::FailFast {
                        results.push(result);
                        return Err(err);
                    }
                }
            }
        }

        for name in &diff.removed {
            if self.cancel.is_cancelled() {
                return Err(abort(result, results, SyncError::Cancelled));
            }
            let mut candidate = entry.clone();
            candidate.remove_version(name);
            entry = match self.catalog.save_entry(candidate) {
                Ok(saved) => saved,
                Err(err) => return Err(abort(result, results, err)),
            };
            dirty = false;
            info!("Removed {} from {}", name, path);
            result.removed.push(name.clone());
        }

        if dirty && !(is_new && entry.versions.is_empty()) {
            if let Err(err) = self.catalog.save_entry(entry) {
                return Err(abort(result, results, err));
            }
        }
        results.push(result);
        Ok(())
    }

    /// Build the next state of one version on a copy
    fn build_version(&self, entry: &Entry, source: &VersionSource) -> Result<Version> {
        let declaration = &source.declaration;
        if declaration.language != entry.language {
            return Err(SyncError::InvalidManifest(format!(
                "{} declares {} but {} is a {} entry",
                source.remote.name, declaration.language, entry.path, entry.language
            )));
        }

        let mut version = match entry.version(&source.remote.name) {
            Some(existing) => existing.clone(),
            None => Version::from_remote(&source.remote, entry.language),
        };
        freeze::ensure_mutable(&entry.path, &version)?;

        version.reference_type = source.remote.reference_type;
        version.commit_id = Some(source.remote.commit_id.clone());
        version.last_modified = source.remote.last_modified;
        version.legacy = false;
        version.descriptor_path = (declaration.primary_descriptor_path != entry.default_descriptor_path)
            .then(|| declaration.primary_descriptor_path.clone());
        version.test_parameter_paths.clone_from(&declaration.test_parameter_files);

        let (remote_files, validations) = self.collect_files(entry, &version, source)?;

        let outcome = merge::merge(
            std::mem::take(&mut version.source_files),
            remote_files,
            self.options.checksum_algorithm,
        );
        debug!(
            "{}@{}: {} created, {} updated, {} removed, {} unchanged",
            entry.path,
            version.name,
            outcome.created.len(),
            outcome.updated.len(),
            outcome.removed.len(),
            outcome.unchanged.len()
        );
        version.source_files = outcome.files;

        self.transition(PassState::Aggregating);
        version.validations = validation::aggregate(std::mem::take(&mut version.validations), validations);
        self.transition(PassState::Merging);
        Ok(version)
    }

    /// Fetch every file of a version from the remote and judge it
    fn collect_files(
        &self,
        entry: &Entry,
        version: &Version,
        source: &VersionSource,
    ) -> Result<(Vec<SourceFile>, Vec<Validation>)> {
        let repository = entry.path.repository_path();
        let reference = source.remote.name.as_str();
        let resolver = self.languages.get(entry.language).ok_or_else(|| {
            SyncError::InvalidManifest(format!("no resolver registered for {}", entry.language))
        })?;

        let mut files = Vec::new();
        let mut checks = ValidationSet::new();

        if entry.language != DescriptorLanguage::Service {
            files.push(SourceFile::new(
                FileType::DockstoreYml,
                MANIFEST_PATH,
                MANIFEST_PATH,
                Some(source.manifest_text.clone()),
            ));
        }
        checks.pass(ValidationCategory::Manifest);

        let primary_path = paths::normalize(version.effective_descriptor_path(&entry.default_descriptor_path));
        let descriptor = ValidationCategory::Descriptor(entry.language);
        let primary_content = if entry.language == DescriptorLanguage::Service {
            Some(source.manifest_text.clone())
        } else {
            remote::fetch_text(self.remote, &repository, reference, &primary_path)?
        };

        match primary_content {
            None => {
                checks.fail(descriptor, format!("{primary_path} not found"));
                checks.pass(ValidationCategory::Imports);
            }
            Some(content) => {
                match resolver.is_valid_descriptor(&content) {
                    Ok(()) => checks.pass(descriptor),
                    Err(message) => {
                        let err = SyncError::DescriptorSyntax {
                            path: primary_path.clone(),
                            message,
                        };
                        debug!("{}@{} is invalid: {}", entry.path, reference, err);
                        checks.fail(descriptor, err.to_string());
                    }
                }

                let ctx = ImportContext {
                    remote: self.remote,
                    repository: &repository,
                    reference,
                    max_depth: self.options.max_import_depth,
                };
                let imports = resolver.resolve_imports(&ctx, &primary_path, &content)?;
                for url in &imports.skipped_urls {
                    debug!("Left URL import {} unresolved", url);
                }
                if imports.missing.is_empty() {
                    checks.pass(ValidationCategory::Imports);
                } else {
                    checks.fail(
                        ValidationCategory::Imports,
                        format!("missing imports: {}", imports.missing.join(", ")),
                    );
                }
                files.push(SourceFile::new(
                    resolver.primary_file_type(),
                    primary_path.clone(),
                    primary_path.clone(),
                    Some(content),
                ));
                files.extend(imports.files.into_values());
            }
        }

        if let Some(test_type) = resolver.test_parameter_file_type() {
            for path in &version.test_parameter_paths {
                let absolute = paths::normalize(path);
                match remote::fetch_text(self.remote, &repository, reference, &absolute)? {
                    Some(content) => files.push(SourceFile::new(test_type, path.clone(), absolute, Some(content))),
                    None => checks.fail(ValidationCategory::TestParameterFile, format!("{path} not found")),
                }
            }
            checks.pass(ValidationCategory::TestParameterFile);
        }

        Ok((files, checks.into_vec()))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn check_user(&self, username: &str) -> Result<()> {
        self.catalog
            .find_user(username)?
            .map(|_| ())
            .ok_or_else(|| SyncError::UnknownUser(username.to_string()))
    }

    fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<(String, manifest::Manifest)> {
        let bytes = self
            .remote
            .fetch_manifest(repository, reference)?
            .ok_or_else(|| SyncError::InvalidManifest(format!("no {MANIFEST_PATH} at {reference}")))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let parsed = manifest::parse(&text)?;
        Ok((text, parsed))
    }

    fn transition(&self, state: PassState) {
        if self.state.get() != state {
            debug!("{:?} -> {:?}", self.state.get(), state);
            self.state.set(state);
        }
    }

    fn finish(&mut self, status: Result<()>, mut results: Vec<EntrySyncResult>) -> PassOutcome {
        if let Err(err) = &status {
            if results.iter().all(|r| r.success) {
                results.push(EntrySyncResult::call_failure(err.to_string()));
            }
        }
        if results.is_empty() {
            results.push(EntrySyncResult {
                success: true,
                ..EntrySyncResult::default()
            });
        }

        let state = if results.iter().all(|r| r.success) {
            PassState::Done
        } else {
            PassState::Failed
        };
        self.transition(state);

        for result in &results {
            if let Err(err) = self.recorder.record(result) {
                warn!("Failed to record sync event: {}", err);
            }
        }
        let outcome = PassOutcome { state, results };
        match outcome.failure() {
            Some(message) => warn!("Reconciliation failed: {}", message),
            None => info!("Reconciliation finished with {} result(s)", outcome.results.len()),
        }
        outcome
    }
}

fn repository_path(repository: &str) -> Result<EntryPath> {
    EntryPath::github(repository, None)
        .ok_or_else(|| SyncError::InvalidReference(format!("repository must be org/repo, got {repository}")))
}

fn new_entry(path: &EntryPath, declaration: &EntryDeclaration) -> Entry {
    let mut entry = Entry::new(
        path.clone(),
        declaration.kind,
        declaration.language,
        declaration.primary_descriptor_path.clone(),
    );
    entry.default_test_parameter_path = declaration.test_parameter_files.first().cloned();
    entry
}

/// Copy entry-level manifest settings; returns whether anything changed
fn apply_entry_metadata(entry: &mut Entry, declaration: &EntryDeclaration) -> bool {
    let mut changed = false;
    if let Some(publish) = declaration.publish {
        if entry.published != publish {
            entry.published = publish;
            changed = true;
        }
    }
    if !declaration.authors.is_empty() && entry.authors != declaration.authors {
        entry.authors.clone_from(&declaration.authors);
        changed = true;
    }
    changed
}

/// Record an entry's partial result before the call stops
fn abort(mut result: EntrySyncResult, results: &mut Vec<EntrySyncResult>, err: SyncError) -> SyncError {
    result.fail(err.to_string());
    results.push(result);
    err
}
