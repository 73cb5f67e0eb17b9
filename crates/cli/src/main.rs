//! Clementine CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run commerce database migrations
//! clem-cli migrate
//!
//! # Inspect the order queue
//! clem-cli orders list
//! clem-cli orders list --status return_requested
//! clem-cli orders show 42
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `orders` - Inspect orders (list, show)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "clem-cli")]
#[command(author, version, about = "Clementine CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders, newest first
    List {
        /// Filter by status (e.g. pending, return_requested)
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Show one order as JSON
    Show {
        /// Order id
        id: i32,
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
        Commands::Orders { action } => match action {
            OrdersAction::List { status } => commands::orders::list(status.as_deref()).await?,
            OrdersAction::Show { id } => commands::orders::show(id).await?,
        },
    }
    Ok(())
}
