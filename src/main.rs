use bill_status_sync::prelude::*;
use bill_status_sync::{AirtableClient, OpenStatesClient};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Append new bill status changes from OpenStates to Airtable
///
/// Reads AIRTABLE_API_KEY and OPENSTATES_API_KEY from the environment, and
/// optional settings from the YAML file named by BILL_SYNC_CONFIG.
#[derive(Parser, Debug)]
#[command(name = "bill-status-sync")]
#[command(version)]
struct Args {}

fn main() -> anyhow::Result<()> {
    let _args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Check that we have got our API keys configured right before any I/O
    let config = Config::from_env()?;

    let http = reqwest::blocking::Client::builder()
        .timeout(config.settings.request_timeout())
        .build()?;

    let source = RateLimitedSource::new(
        OpenStatesClient::from_config(http.clone(), &config),
        RateLimiter::new(config.settings.rate_per_second, config.settings.burst),
    );
    let store = AirtableClient::from_config(http, &config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    BillSync::new(source, store, &config.settings).run(&mut out)?;

    Ok(())
}
