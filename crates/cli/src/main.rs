//! Quill CLI - database migrations and maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply schema and session-store migrations
//! quill migrate
//!
//! # Promote or demote an account
//! quill admin grant -e editor@example.com
//! quill admin revoke -e editor@example.com
//!
//! # Load sample poems
//! quill seed
//! quill seed --file my-poems.yaml
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quill")]
#[command(author, version, about = "Quill CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin roles
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Insert sample poems
    Seed {
        /// YAML file with a list of poems
        #[arg(short, long, default_value = commands::seed::DEFAULT_SEED_FILE)]
        file: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Give an existing account the admin role
    Grant {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Return an admin account to the user role
    Revoke {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
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
        Commands::Admin { action } => match action {
            AdminAction::Grant { email } => commands::admin::grant(&email).await?,
            AdminAction::Revoke { email } => commands::admin::revoke(&email).await?,
        },
        Commands::Seed { file } => {
            let inserted = commands::seed::poems(&file).await?;
            tracing::info!("Seeded {inserted} poems");
        }
    }
    Ok(())
}
