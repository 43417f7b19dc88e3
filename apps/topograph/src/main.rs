//! # Topograph - Ceph Topology Agent
//!
//! Renders the Ceph daemons and hardware of a host into a live topology
//! graph.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                   apps/topograph (THE BINARY)                 │
//! │                                                               │
//! │  ┌────────────┐   ┌─────────────┐   ┌──────────────────────┐  │
//! │  │    CLI     │   │    Agent    │   │ Collector (ceph,lshw)│  │
//! │  │   (clap)   │   │ (bootstrap) │   │   (tokio interval)   │  │
//! │  └─────┬──────┘   └──────┬──────┘   └──────────┬───────────┘  │
//! │        └─────────────────┼─────────────────────┘              │
//! │                          ▼                                    │
//! │                 ┌──────────────────┐                          │
//! │                 │  topograph-core  │                          │
//! │                 │   (THE LOGIC)    │                          │
//! │                 └──────────────────┘                          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! topograph agent --config /etc/topograph/agent.toml
//! topograph reclassify -f lshw.json
//! topograph inspect <blob>
//! ```

use clap::Parser;
use topograph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // TOPOGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TOPOGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "topograph=info,topograph_core=info".into());

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

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
