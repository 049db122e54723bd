//! Hydrawise status binary.
//!
//! Fetches the legacy status schedule for one controller and prints what
//! each relay is doing. Useful for checking an API key and for seeing the
//! payload the hybrid client patches its cache with.
//!
//! # Configuration
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `config/default.toml`, then `config/local.toml`
//! 3. Environment variables prefixed with `HYDRAWISE_` (a `.env` file is
//!    read first), e.g. `HYDRAWISE_REST__API_KEY`
//!
//! ```text
//! Usage: hydrawise-status [OPTIONS] <CONTROLLER_ID>
//!
//! Arguments:
//!   <CONTROLLER_ID>  Controller to query [env: HYDRAWISE_CONTROLLER_ID]
//!
//! Options:
//!       --json       Print the raw payload instead of a summary
//! ```
//!
//! Log output is controlled with `RUST_LOG`.

use chrono::Utc;
use clap::Parser;
use hydrawise_hybrid::{HybridSettings, RelayTime, RestClient, SecondaryBackend, StatusSchedule};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hydrawise-status", about = "Show live relay status for a Hydrawise controller")]
struct CliArgs {
    /// Controller to query
    #[arg(env = "HYDRAWISE_CONTROLLER_ID")]
    controller_id: u64,

    /// Print the raw payload instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();
    let settings = HybridSettings::new()?;
    let rest = RestClient::from_settings(&settings.rest)?;

    info!(
        controller_id = args.controller_id,
        base_url = %settings.rest.base_url,
        "querying legacy status"
    );
    let payload = rest.get(StatusSchedule::PATH, args.controller_id).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let schedule = StatusSchedule::from_value(payload)?;
    let now = Utc::now();
    println!("Controller {}:", args.controller_id);
    for relay in &schedule.relays {
        let label = if relay.name.is_empty() {
            format!("Zone {}", relay.relay)
        } else {
            relay.name.clone()
        };
        match relay.status() {
            Some(status) => {
                match (status.current_run_end(now), status.time) {
                    (Some(end), _) => println!("- {label}: running until {end}"),
                    (None, RelayTime::SuspendedIndefinitely) => {
                        println!("- {label}: suspended indefinitely")
                    }
                    (None, RelayTime::ResumesIn(_)) => {
                        println!("- {label}: next change at {}", status.suspended_until(now))
                    }
                }
            }
            None => println!("- {label}: unreadable status"),
        }
    }
    if schedule.skipped > 0 {
        println!("({} malformed relays skipped)", schedule.skipped);
    }
    if let Some(next_poll) = schedule.next_poll {
        println!("Next poll advised in {}s", next_poll.as_secs());
    }

    Ok(())
}
