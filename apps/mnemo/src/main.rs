//! # Mnemo
//!
//! Command-line tool over a redb object store: seed, show, capture and
//! recreate object graphs through mementos.
//!
//! ## Usage
//!
//! ```bash
//! mnemo init
//! mnemo seed
//! mnemo show 1
//! mnemo capture 1 -o team.mnem
//! mnemo recreate -i team.mnem
//! ```

use clap::Parser;
use mnemo::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // MNEMO_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("MNEMO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mnemo=info,mnemo_core=warn".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
