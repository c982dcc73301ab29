// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Catalog user accounts

use super::Context;
use anyhow::Result;

/// Register a user allowed to trigger reconciliation
pub fn add(ctx: &Context, username: &str) -> Result<()> {
    let mut catalog = ctx.open_catalog()?;
    let before = catalog.store().users.len();
    catalog.store_mut().add_user(username);

    if catalog.store().users.len() > before {
        catalog.save()?;
        println!("Added user: {username}");
    } else {
        println!("User already exists: {username}");
    }
    Ok(())
}

/// List registered users
pub fn list(ctx: &Context) -> Result<()> {
    let catalog = ctx.open_catalog()?;
    let users = &catalog.store().users;
    if users.is_empty() {
        println!("No users registered. Use 'workflow-sync user add <name>' to add one.");
    }
    for user in users {
        println!("{}  (since {})", user.username, user.created_at.format("%Y-%m-%d"));
    }
    Ok(())
}
