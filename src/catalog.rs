// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Catalog persistence
//!
//! The engine loads and saves whole entries through [`Catalog`]. Two
//! implementations ship here: [`CatalogStore`] in memory, and [`JsonCatalog`]
//! which writes the store to `catalog.json` in a data directory.

use crate::error::{Result, SyncError};
use crate::types::{Entry, EntryPath, User, Version};
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the catalog inside the data directory
pub const CATALOG_FILE: &str = "catalog.json";

/// Persistence boundary for entries and users
pub trait Catalog {
    /// Entry at `path`, if cataloged
    fn load_entry(&self, path: &EntryPath) -> Result<Option<Entry>>;

    /// Insert or replace an entry, returning what was stored
    fn save_entry(&mut self, entry: Entry) -> Result<Entry>;

    /// Versions of the entry with `entry_id`
    fn load_versions(&self, entry_id: &str) -> Result<Vec<Version>>;

    /// Every entry backed by the repository of `path` (name ignored)
    fn entries_for_repository(&self, path: &EntryPath) -> Result<Vec<Entry>>;

    /// Account for a source-control username
    fn find_user(&self, username: &str) -> Result<Option<User>>;
}

/// In-memory catalog contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStore {
    /// All entries
    #[serde(default)]
    pub entries: Vec<Entry>,
    /// Registered users
    #[serde(default)]
    pub users: Vec<User>,
}

impl CatalogStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user; registering twice is a no-op
    pub fn add_user(&mut self, username: &str) -> &User {
        if let Some(index) = self.users.iter().position(|u| u.username == username) {
            return &self.users[index];
        }
        self.users.push(User {
            username: username.to_string(),
            created_at: Utc::now(),
        });
        &self.users[self.users.len() - 1]
    }

    /// Get an entry by path
    #[must_use]
    pub fn entry(&self, path: &EntryPath) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.path == path)
    }
}

impl Catalog for CatalogStore {
    fn load_entry(&self, path: &EntryPath) -> Result<Option<Entry>> {
        Ok(self.entry(path).cloned())
    }

    fn save_entry(&mut self, entry: Entry) -> Result<Entry> {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry.clone();
        } else {
            self.entries.push(entry.clone());
        }
        Ok(entry)
    }

    fn load_versions(&self, entry_id: &str) -> Result<Vec<Version>> {
        self.entries
            .iter()
            .find(|e| e.id == entry_id)
            .map(|e| e.versions.clone())
            .ok_or_else(|| SyncError::Catalog(format!("entry not found: {entry_id}")))
    }

    fn entries_for_repository(&self, path: &EntryPath) -> Result<Vec<Entry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| {
                e.path.source_control == path.source_control
                    && e.path.organization == path.organization
                    && e.path.repository == path.repository
            })
            .cloned()
            .collect())
    }

    fn find_user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.username == username).cloned())
    }
}

/// Catalog persisted as JSON in a data directory
#[derive(Debug)]
pub struct JsonCatalog {
    dir: PathBuf,
    store: CatalogStore,
}

impl JsonCatalog {
    /// Open the catalog in `dir`, starting empty if there is no file yet
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        let path = dir.join(CATALOG_FILE);
        let store = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            CatalogStore::default()
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            store,
        })
    }

    /// Write the catalog, replacing the previous file atomically
    pub fn save(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;
        let path = self.dir.join(CATALOG_FILE);
        let staging = self.dir.join(format!("{CATALOG_FILE}.tmp"));
        let json = serde_json::to_string_pretty(&self.store).context("Failed to serialize catalog")?;
        fs::write(&staging, json)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Read access to the contents
    #[must_use]
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Mutable access; call [`JsonCatalog::save`] afterwards
    pub fn store_mut(&mut self) -> &mut CatalogStore {
        &mut self.store
    }
}

impl Catalog for JsonCatalog {
    fn load_entry(&self, path: &EntryPath) -> Result<Option<Entry>> {
        self.store.load_entry(path)
    }

    fn save_entry(&mut self, entry: Entry) -> Result<Entry> {
        let previous = self.store.clone();
        let saved = self.store.save_entry(entry)?;
        if let Err(err) = self.save() {
            self.store = previous;
            return Err(SyncError::from(err));
        }
        Ok(saved)
    }

    fn load_versions(&self, entry_id: &str) -> Result<Vec<Version>> {
        self.store.load_versions(entry_id)
    }

    fn entries_for_repository(&self, path: &EntryPath) -> Result<Vec<Entry>> {
        self.store.entries_for_repository(path)
    }

    fn find_user(&self, username: &str) -> Result<Option<User>> {
        self.store.find_user(username)
    }
}
