//! # Attesta
//!
//! Command-line front end for the attesta-core curation store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/attesta (THE BINARY)         │
//! │                                              │
//! │  ┌──────────┐  ┌──────────┐  ┌────────────┐  │
//! │  │   CLI    │  │  config  │  │  mapping   │  │
//! │  │  (clap)  │  │  (toml)  │  │  (json)    │  │
//! │  └────┬─────┘  └────┬─────┘  └─────┬──────┘  │
//! │       └─────────────┼──────────────┘         │
//! │                     ▼                        │
//! │             ┌──────────────┐                 │
//! │             │ attesta-core │                 │
//! │             └──────────────┘                 │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! attesta init
//! attesta source --title "Premium Times"
//! attesta create --kind organization --file acme.json --comment "initial import"
//! attesta show --entity 1
//! attesta revisions --entity 1 --diff
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ATTESTA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ATTESTA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = EnvFilter::try_from_env("ATTESTA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| "attesta=info,attesta_core=info".into());

    // Logs go to stderr so command output on stdout stays parseable.
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
