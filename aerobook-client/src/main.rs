use std::process::ExitCode;
use std::sync::Arc;

use aerobook_client::cli::{dispatch, Cli};
use aerobook_client::commands::Context;
use aerobook_client::{ApiClient, ClientError};
use aerobook_store::app_config::Config;
use aerobook_store::FileSessionStore;
use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aerobook_client=info,aerobook_store=info,aerobook_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e.downcast_ref::<ClientError>().is_some_and(ClientError::is_auth_failure) {
                eprintln!("Run `aerobook login <username> --password ...` to sign in again.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let config = Config::load_from(&cli.config).context("Failed to load config")?;
    let clock = config.booking.clock()?;
    let default_payment = config
        .booking
        .default_payment_method
        .parse()
        .map_err(|e: String| anyhow::anyhow!("booking.default_payment_method: {}", e))?;

    let sessions = Arc::new(FileSessionStore::new(&config.session.path));
    let client = ApiClient::from_config(&config, sessions.clone())?;
    tracing::debug!("Using backend at {}", client.base_url());

    let ctx = Context {
        backend: &client,
        sessions: sessions.as_ref(),
        clock,
        default_payment,
    };
    dispatch(cli.command, &ctx).await
}
