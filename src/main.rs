//! Position Ledger CLI
//!
//! Records trades, manages wallets and referrals against the configured store.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use position_ledger::adapters::cli::{self, CliApp, Services};
use position_ledger::adapters::{InMemoryUserStore, JsonFileStore};
use position_ledger::application::{PositionLedger, ReferralService, UserRepository, WalletService};
use position_ledger::config::{load_config, Config, StorageBackend};
use position_ledger::ports::UserStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (wallet secrets go here, not in ledger.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    let services = build_services(&config);

    match cli::execute(app.command, &services).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("HTTP {}", e.status_code());
            eprintln!("{}", serde_json::to_string_pretty(&e.to_body())?);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool, debug: bool, level: &str) -> Result<()> {
    let fallback = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // stdout carries the JSON result
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    Ok(())
}

fn build_services(config: &Config) -> Services {
    let store: Arc<dyn UserStore> = match config.storage.backend {
        StorageBackend::File => {
            let data_dir = config.storage.get_data_dir();
            tracing::info!("Using JSON file store in {}", data_dir.display());
            Arc::new(JsonFileStore::new(data_dir))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store - nothing is persisted");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let repo = UserRepository::new(store).with_max_retries(config.ledger.max_commit_retries);
    Services {
        ledger: PositionLedger::new(repo.clone(), config.into()),
        wallets: WalletService::new(repo.clone(), config.into()),
        referrals: ReferralService::new(repo, config.into()),
    }
}
