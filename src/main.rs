// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! workflow-sync CLI - keep a workflow catalog in step with its repositories

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use workflow_sync::commands::{self, Context};
use workflow_sync::config;
use workflow_sync::webhook::EventType;

#[derive(Parser)]
#[command(name = "workflow-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "WORKFLOW_SYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Data directory override
    #[arg(long, env = "WORKFLOW_SYNC_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a push of a branch or tag
    Push {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Handle deletion of a branch or tag
    Delete {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Re-sync every branch and tag of a repository
    Refresh {
        /// Repository as org/repo
        repository: String,

        /// User triggering the refresh
        #[arg(short, long)]
        user: String,

        /// Remote snapshot (YAML)
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Rebuild a single version even if its commit did not move
    RefreshVersion {
        /// Repository as org/repo
        repository: String,

        /// Branch or tag name
        #[arg(id = "version_name", value_name = "VERSION")]
        version: String,

        /// Entry name within the repository
        #[arg(long)]
        entry: Option<String>,

        /// User triggering the refresh
        #[arg(short, long)]
        user: String,

        /// Remote snapshot (YAML)
        #[arg(short, long)]
        snapshot: PathBuf,
    },

    /// Check a local .dockstore.yml
    ValidateManifest {
        /// Manifest file
        #[arg(default_value = ".dockstore.yml")]
        path: PathBuf,
    },

    /// Show cataloged entries
    Show {
        /// Entry path (host/org/repo[/name])
        path: Option<String>,

        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Freeze a version so reconciliation never changes it
    Freeze {
        /// Entry path (host/org/repo[/name])
        path: String,

        /// Version name
        #[arg(id = "version_name", value_name = "VERSION")]
        version: String,
    },

    /// Manage catalog users
    User {
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a user
    Add {
        /// Source-control username
        username: String,
    },

    /// List users
    List,
}

#[derive(clap::Args)]
struct EventArgs {
    /// Repository as org/repo
    #[arg(required_unless_present = "event_file")]
    repository: Option<String>,

    /// Full reference, e.g. refs/heads/main
    #[arg(required_unless_present = "event_file")]
    reference: Option<String>,

    /// User who triggered the event
    #[arg(short, long, required_unless_present = "event_file")]
    user: Option<String>,

    /// Hosting app installation id
    #[arg(long, default_value = "0")]
    installation_id: String,

    /// Read the event from a JSON file instead
    #[arg(long, conflicts_with_all = ["repository", "reference", "user"])]
    event_file: Option<PathBuf>,

    /// Remote snapshot (YAML)
    #[arg(short, long)]
    snapshot: Option<PathBuf>,
}

impl EventArgs {
    fn into_event(self, event_type: EventType) -> Result<(workflow_sync::webhook::WebhookEvent, Option<PathBuf>)> {
        let event = match &self.event_file {
            Some(path) => commands::event::from_file(path)?,
            None => commands::event::from_args(
                event_type,
                self.repository.as_deref().unwrap_or_default(),
                self.reference.as_deref().unwrap_or_default(),
                self.user.as_deref().unwrap_or_default(),
                &self.installation_id,
            ),
        };
        Ok((event, self.snapshot))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }

    // Initialize logging
    let filter = match cli.verbose {
        0 if cli.quiet => EnvFilter::new("error"),
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let color = !cli.no_color && std::io::stdout().is_terminal();
    let ctx = Context::new(settings, color);

    // Execute command
    match cli.command {
        Commands::Push { event } => {
            let (event, snapshot) = event.into_event(EventType::Push)?;
            commands::event::run(&ctx, &event, snapshot.as_deref())
        }
        Commands::Delete { event } => {
            let (event, snapshot) = event.into_event(EventType::Delete)?;
            commands::event::run(&ctx, &event, snapshot.as_deref())
        }
        Commands::Refresh { repository, user, snapshot } => {
            commands::refresh::run(&ctx, &repository, &user, &snapshot)
        }
        Commands::RefreshVersion { repository, version, entry, user, snapshot } => {
            commands::refresh::run_version(&ctx, &repository, entry.as_deref(), &version, &user, &snapshot)
        }
        Commands::ValidateManifest { path } => {
            commands::manifest::run(&path)
        }
        Commands::Show { path, json } => {
            commands::show::run(&ctx, path.as_deref(), json)
        }
        Commands::Freeze { path, version } => {
            commands::freeze::run(&ctx, &path, &version)
        }
        Commands::User { action } => match action {
            UserCommand::Add { username } => commands::user::add(&ctx, &username),
            UserCommand::List => commands::user::list(&ctx),
        },
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
