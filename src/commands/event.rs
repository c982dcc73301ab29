// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Push and delete events

use super::{load_remote, report, Context};
use crate::orchestrator::Reconciler;
use crate::webhook::{EventType, WebhookEvent};
use anyhow::{Context as _, Result};
use std::path::Path;

/// Build an event from command-line arguments
#[must_use]
pub fn from_args(
    event_type: EventType,
    repository: &str,
    reference: &str,
    username: &str,
    installation_id: &str,
) -> WebhookEvent {
    WebhookEvent {
        repository: repository.to_string(),
        git_reference: reference.to_string(),
        username: username.to_string(),
        installation_id: installation_id.to_string(),
        event_type,
    }
}

/// Read an event delivered as JSON
pub fn from_file(path: &Path) -> Result<WebhookEvent> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse event {}", path.display()))
}

/// Run one event against the local catalog
pub fn run(ctx: &Context, event: &WebhookEvent, snapshot: Option<&Path>) -> Result<()> {
    let remote = load_remote(snapshot)?;
    let mut catalog = ctx.open_catalog()?;
    let mut recorder = ctx.recorder();

    let outcome = Reconciler::new(&remote, &mut catalog, &mut recorder)
        .with_options(ctx.options())
        .handle_event(event);

    report(ctx, &outcome)
}
