//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod checkpoint;
mod ingest;
mod init;
mod run;
mod stats;
mod venues;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "menuscrape")]
#[command(about = "Dining hall menu acquisition and catalog ingestion")]
#[command(version)]
pub struct Cli {
    /// Data directory holding the catalog database and checkpoint
    #[arg(long, short = 'd', global = true, env = "MENUSCRAPE_DATA_DIR")]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory, database and venue rows
    Init,

    /// Scrape menus for the configured venues and ingest the new days
    Run {
        /// Venue ids to scrape (repeatable; defaults to the configured list)
        #[arg(long = "venue", value_name = "ID")]
        venues: Vec<u32>,
        /// Only update the checkpoint; leave the catalog untouched
        #[arg(long)]
        skip_ingest: bool,
        /// Print run statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ingest every checkpointed day into the catalog
    Ingest {
        /// Print per-venue results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or reset the scrape checkpoint
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },

    /// Manage catalog venues
    Venues {
        #[command(subcommand)]
        command: VenueCommands,
    },

    /// Show catalog coverage and freshness per venue
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CheckpointCommands {
    /// Show checkpointed days (all venues, or one venue in detail)
    Show {
        /// Venue display name
        venue: Option<String>,
    },
    /// Remove checkpointed days for one venue or all venues
    Clear {
        /// Venue display name (all venues when omitted)
        venue: Option<String>,
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum VenueCommands {
    /// List venues in the catalog
    List,
    /// Create or rename venues from the configured seed list
    Sync,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings, &config).await,
        Commands::Run {
            venues,
            skip_ingest,
            json,
        } => run::cmd_run(&settings, &config, venues, skip_ingest, json).await,
        Commands::Ingest { json } => ingest::cmd_ingest(&settings, &config, json).await,
        Commands::Checkpoint { command } => match command {
            CheckpointCommands::Show { venue } => {
                checkpoint::cmd_checkpoint_show(&settings, venue.as_deref())
            }
            CheckpointCommands::Clear { venue, yes } => {
                checkpoint::cmd_checkpoint_clear(&settings, venue.as_deref(), yes)
            }
        },
        Commands::Venues { command } => match command {
            VenueCommands::List => venues::cmd_venues_list(&settings).await,
            VenueCommands::Sync => venues::cmd_venues_sync(&settings, &config).await,
        },
        Commands::Stats { json } => stats::cmd_stats(&settings, json).await,
    }
}
