// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Webhook events and git references

use crate::error::{Result, SyncError};
use crate::types::ReferenceType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened to the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// A branch or tag was pushed
    Push,
    /// A branch or tag was deleted
    Delete,
}

/// A repository event delivered by the hosting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// Repository as `org/repo`
    pub repository: String,
    /// Full reference, e.g. `refs/heads/main`
    pub git_reference: String,
    /// Account that triggered the event
    pub username: String,
    /// Hosting app installation
    pub installation_id: String,
    /// Push or delete
    pub event_type: EventType,
}

/// A parsed `refs/heads/*` or `refs/tags/*` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitReference {
    /// Branch or tag
    pub reference_type: ReferenceType,
    /// Short name
    pub name: String,
}

impl GitReference {
    /// Parse a full reference string
    pub fn parse(reference: &str) -> Result<Self> {
        let (reference_type, name) = if let Some(name) = reference.strip_prefix("refs/heads/") {
            (ReferenceType::Branch, name)
        } else if let Some(name) = reference.strip_prefix("refs/tags/") {
            (ReferenceType::Tag, name)
        } else {
            return Err(SyncError::InvalidReference(reference.to_string()));
        };
        if name.is_empty() || name.starts_with('/') || name.ends_with('/') || name.contains("//") {
            return Err(SyncError::InvalidReference(reference.to_string()));
        }
        Ok(Self {
            reference_type,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for GitReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reference_type {
            ReferenceType::Tag => write!(f, "refs/tags/{}", self.name),
            _ => write!(f, "refs/heads/{}", self.name),
        }
    }
}
