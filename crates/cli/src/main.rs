//! Shelfwatch CLI - migrations and operational tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! shelfwatch migrate
//!
//! # Resolve a delivery pincode to its substore
//! shelfwatch resolve 380001
//!
//! # Run a single poll cycle and enqueue notifications
//! shelfwatch poll-once
//!
//! # Backfill a notification for one tracking request
//! shelfwatch notify-track <track-id>
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `resolve` - Resolve a pincode through the storefront handshake
//! - `poll-once` - Run one poll cycle without the daemon
//! - `notify-track` - Enqueue a notification for an already-available product

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "shelfwatch")]
#[command(author, version, about = "Shelfwatch CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Resolve a delivery pincode to the substore serving it
    Resolve {
        /// Six-digit delivery pincode
        pincode: String,
    },
    /// Run a single poll cycle and enqueue notifications for any restocks
    PollOnce,
    /// Enqueue a notification for one tracking request if the product is
    /// already available
    NotifyTrack {
        /// Tracking request id
        track_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Resolve { pincode } => commands::resolve::run(&pincode).await?,
        Commands::PollOnce => commands::poll::run_once().await?,
        Commands::NotifyTrack { track_id } => commands::notify::run(&track_id).await?,
    }
    Ok(())
}
