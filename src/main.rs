//! fetchcache - Fetch JSON from rate-limited upstream APIs through a shared cache
//!
//! Prints the resolved document (`get`) or per-item mapping (`batch`) as JSON
//! on stdout. Upstream and cache failures degrade to missing values; only
//! setup errors (bad flags, unreachable Redis) end the process with an error.

use std::process;

use clap::Parser;

use fetchcache::cli::{Cli, Command};
use fetchcache::commands::{run_batch, run_get};
use fetchcache::config::Settings;
use fetchcache::logging::init_logging;
use fetchcache::CacheAside;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();
    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let store = match settings.open_store().await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    let cache = CacheAside::new(store);
    let client = settings.upstream_client();

    let output = match &cli.command {
        Command::Get(args) => {
            run_get(
                &cache,
                &client,
                &args.key.builder(),
                args.key.ttl(),
                &args.url,
                &args.ids,
            )
            .await
        }
        Command::Batch(args) => {
            let result = run_batch(
                &cache,
                &client,
                &args.options(),
                args.key.ttl(),
                args.throttle(),
                &args.url,
                &args.ids,
            )
            .await;
            serde_json::to_value(result)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
