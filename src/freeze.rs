// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Frozen version guard
//!
//! Reconciliation never mutates a frozen version and never changes the flag
//! itself; unfreezing is a user action outside this crate.

use crate::error::{Result, SyncError};
use crate::types::{EntryPath, Version};

/// Whether reconciliation may modify `version`
#[must_use]
pub fn is_mutable(version: &Version) -> bool {
    !version.frozen
}

/// Fail with [`SyncError::FrozenVersionViolation`] if `version` is frozen
pub fn ensure_mutable(entry: &EntryPath, version: &Version) -> Result<()> {
    if is_mutable(version) {
        Ok(())
    } else {
        Err(SyncError::FrozenVersionViolation {
            entry: entry.to_string(),
            version: version.name.clone(),
        })
    }
}
