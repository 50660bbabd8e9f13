//! Threadline CLI - Database migrations and pending-order tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! tl-cli migrate
//!
//! # Retry order creation for paid pending orders once
//! tl-cli reconcile
//!
//! # Show paid pending orders
//! tl-cli pending list --paid
//!
//! # Drop an abandoned record
//! tl-cli pending delete 7f1c0e4e-0000-4000-8000-000000000000
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "tl-cli")]
#[command(author, version, about = "Threadline CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run one pending-order reconciliation sweep
    Reconcile {
        /// Most records to retry
        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },
    /// Inspect or prune pending orders
    Pending {
        #[command(subcommand)]
        action: PendingAction,
    },
}

#[derive(Subcommand)]
enum PendingAction {
    /// List pending orders, oldest first
    List {
        /// Only paid records (awaiting reconciliation)
        #[arg(long)]
        paid: bool,

        /// Most records to show
        #[arg(short, long, default_value_t = 100)]
        limit: i64,
    },
    /// Delete a pending order by reference
    Delete {
        /// Record reference (UUID)
        reference: Uuid,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Reconcile { limit } => commands::reconcile::run(limit).await?,
        Commands::Pending { action } => match action {
            PendingAction::List { paid, limit } => commands::pending::list(paid, limit).await?,
            PendingAction::Delete { reference } => commands::pending::delete(reference).await?,
        },
    }
    Ok(())
}
