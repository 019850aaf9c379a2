//! Satchel CLI - Evaluate checkout fixtures from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Print subtotal, shipping, discount, gift card balance and total
//! satchel valuate demos/checkout.yaml
//!
//! # Print whether shipping is required and the valid methods
//! satchel shipping demos/checkout.yaml
//!
//! # Attach a delivery schedule (date defaults to today, UTC)
//! satchel schedule demos/checkout.yaml --date 2026-03-14 --slot "09:00-12:00"
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr. Set `RUST_LOG`
//! to change the log level and `--json-logs` for structured log lines.
//!
//! # Environment Variables
//!
//! See [`satchel_checkout::CheckoutConfig::from_env`]. Values in the fixture
//! take precedence.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod commands;

#[derive(Parser)]
#[command(name = "satchel")]
#[command(author, version, about = "Satchel checkout engine tools")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute every figure of a checkout
    Valuate {
        /// Path to the YAML fixture
        fixture: PathBuf,
    },
    /// Show shipping requirement and valid shipping methods
    Shipping {
        /// Path to the YAML fixture
        fixture: PathBuf,
    },
    /// Set a delivery schedule on the fixture's checkout
    Schedule {
        /// Path to the YAML fixture
        fixture: PathBuf,

        /// Delivery date (YYYY-MM-DD); defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Free-form time slot, at most 64 characters
        #[arg(short, long)]
        slot: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.json_logs);

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Valuate { fixture } => commands::valuate::run(&fixture).await,
        Commands::Shipping { fixture } => commands::shipping::run(&fixture).await,
        Commands::Schedule {
            fixture,
            date,
            slot,
        } => commands::schedule::run(&fixture, date, slot.as_deref()).await,
    }
}
