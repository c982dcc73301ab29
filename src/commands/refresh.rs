// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Full and single-version refresh

use super::{load_remote, report, Context};
use crate::orchestrator::Reconciler;
use anyhow::Result;
use std::path::Path;

/// Re-sync every version of a repository
pub fn run(ctx: &Context, repository: &str, username: &str, snapshot: &Path) -> Result<()> {
    let remote = load_remote(Some(snapshot))?;
    let mut catalog = ctx.open_catalog()?;
    let mut recorder = ctx.recorder();

    let outcome = Reconciler::new(&remote, &mut catalog, &mut recorder)
        .with_options(ctx.options())
        .refresh_repository(repository, username);

    report(ctx, &outcome)
}

/// Rebuild one version
pub fn run_version(
    ctx: &Context,
    repository: &str,
    entry: Option<&str>,
    version: &str,
    username: &str,
    snapshot: &Path,
) -> Result<()> {
    let remote = load_remote(Some(snapshot))?;
    let mut catalog = ctx.open_catalog()?;
    let mut recorder = ctx.recorder();

    let outcome = Reconciler::new(&remote, &mut catalog, &mut recorder)
        .with_options(ctx.options())
        .refresh_version(repository, entry, version, username);

    report(ctx, &outcome)
}
