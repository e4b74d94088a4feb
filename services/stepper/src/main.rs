use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::RecordStore;
use stepper::app;
use stepper::config::{SettingsError, StepperConfig};
use stepper::models::AccountConfig;
use stepper::runner;

#[derive(Parser)]
#[command(name = "stepper")]
#[command(about = "Submit daily step counts for Zepp accounts", version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "stepper.toml", env = "STEPPER_CONFIG")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(short, long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every account once (default)
    Run,
    /// Process every account on a cron schedule until interrupted
    Schedule {
        /// Six-field cron expression, defaults to the configured schedule
        #[arg(long)]
        cron: Option<String>,
    },
    /// Delete the cached session of an account
    ClearCache {
        /// Phone number or email of the account
        account: String,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_account_help() {
    error!("No valid account configuration found");
    info!("Add [[accounts]] entries (account_id, password, steps) to the configuration file, or set:");
    info!("  XIAOMI_ACCOUNTS=account&password&steps#account&password&steps");
    info!("  XIAOMI_USERS=account#account XIAOMI_PASSWORDS=password#password XIAOMI_STEPS=steps#steps (optional)");
}

/// Accounts to process, `None` after printing guidance when there are none
fn configured_accounts(config: &StepperConfig) -> Result<Option<Vec<AccountConfig>>> {
    match config.resolve_accounts() {
        Ok(accounts) => Ok(Some(accounts)),
        Err(SettingsError::NoAccounts) => {
            print_account_help();
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up a local .env before reading configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level);

    info!("Starting step runner v{}", env!("CARGO_PKG_VERSION"));

    let config = StepperConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let Some(accounts) = configured_accounts(&config)? else {
                return Ok(());
            };

            let runner = app::build_runner(&config).await?;
            let mut log = runner.new_log();
            let summary = runner.run(&accounts, &mut log).await;
            info!("Run log:\n{}", summary.run_log);
            info!(
                "Step runner finished: {}/{} succeeded",
                summary.success_count(),
                summary.outcomes.len()
            );
        }
        Commands::Schedule { cron } => {
            let Some(accounts) = configured_accounts(&config)? else {
                return Ok(());
            };

            let schedule = cron.unwrap_or_else(|| config.schedule.clone());
            let runner = Arc::new(app::build_runner(&config).await?);
            let mut scheduler =
                runner::start_schedule(runner, Arc::new(accounts), &schedule).await?;

            tokio::signal::ctrl_c().await?;
            info!("Shutting down step runner scheduler");
            scheduler.shutdown().await?;
        }
        Commands::ClearCache { account } => {
            let store = app::build_store(&config.cache).await?;
            store
                .delete(account.trim())
                .await
                .context("failed to delete cached session")?;
            info!("Cleared cached session for {}", stepper::mask::mask_account(&account));
        }
    }

    Ok(())
}
