//! Swaptower daemon
//!
//! Watches atomic swap contracts and reports swap lifecycle events.

mod config;
mod shutdown;

use clap::{Parser, Subcommand};
use config::ConfigLoader;
use rust_decimal::Decimal;
use shutdown::shutdown_signal;
use std::path::PathBuf;
use std::sync::Arc;
use swaptower_core::chain::{Chain, InitiateArgs};
use swaptower_core::tezos::Tezos;
use swaptower_sdk::objects::Hex;
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Swaptower - cross-chain atomic swap watch tower
#[derive(Parser, Debug)]
#[command(name = "swaptower")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./swaptower.toml", env = "SWAPTOWER_CONFIG")]
    config: PathBuf,

    /// Emit logs as JSON lines
    #[arg(long, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore history, then follow the chain until interrupted (default)
    Watch,
    /// Lock funds in a new swap
    Initiate {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        hashed_secret: String,
        #[arg(long)]
        participant: String,
        /// RFC 3339 timestamp after which the swap can be refunded
        #[arg(long, value_parser = parse_rfc3339)]
        refund_time: OffsetDateTime,
        #[arg(long)]
        payoff: Decimal,
        /// Amount in the contract's smallest unit
        #[arg(long)]
        amount: Decimal,
        /// Asset contract, for token swaps
        #[arg(long)]
        token_address: Option<String>,
    },
    /// Claim a swap by revealing its secret
    Redeem {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        hashed_secret: String,
        #[arg(long)]
        secret: String,
    },
    /// Take back the funds of an expired swap
    Refund {
        #[arg(long)]
        contract: String,
        #[arg(long)]
        hashed_secret: String,
    },
}

fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(value, &Rfc3339)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.json_logs);

    tracing::info!("Starting swaptower v{}", env!("CARGO_PKG_VERSION"));

    let loaded_config = ConfigLoader::new(&args.config).load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    let tezos = Arc::new(Tezos::from_config(loaded_config.tezos).map_err(|e| {
        tracing::error!("Failed to create Tezos watcher: {}", e);
        e
    })?);
    tracing::info!(address = %tezos.address(), "Using Tezos account");

    match args.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(tezos).await,
        command => {
            tezos.init().await?;
            let result = submit(tezos.as_ref(), command).await;
            tezos.close().await?;
            result
        }
    }
}

/// Restore, follow the chain and log everything until a shutdown signal.
async fn watch(tezos: Arc<Tezos>) -> anyhow::Result<()> {
    let events = tezos.events();
    let events_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => tracing::info!(chain = %event.chain(), event = %json, "Swap event"),
                Err(e) => tracing::error!(error = %e, "Failed to serialize swap event"),
            }
        }
    });
    let operations = tezos.operations();
    let operations_task = tokio::spawn(async move {
        while let Some(op) = operations.recv().await {
            tracing::info!(
                chain = %op.chain,
                hash = %op.hash,
                status = ?op.status,
                hashed_secret = ?op.hashed_secret,
                "Operation"
            );
        }
    });

    tezos.init().await?;
    tezos.restore().await?;
    tezos.run().await?;

    shutdown_signal().await?;

    tezos.close().await?;
    join_consumer("events", events_task).await;
    join_consumer("operations", operations_task).await;
    tracing::info!("Swaptower shutdown complete");
    Ok(())
}

/// Wait for a bus consumer, logging it if it panicked or was cancelled.
async fn join_consumer(name: &str, task: JoinHandle<()>) -> bool {
    match task.await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(consumer = name, error = %e, "Bus consumer task failed");
            false
        }
    }
}

async fn submit(tezos: &Tezos, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Watch => {}
        Command::Initiate {
            contract,
            hashed_secret,
            participant,
            refund_time,
            payoff,
            amount,
            token_address,
        } => {
            tezos
                .initiate(InitiateArgs {
                    hashed_secret: Hex::new(hashed_secret),
                    participant,
                    refund_time,
                    payoff,
                    amount,
                    contract,
                    token_address,
                })
                .await?;
        }
        Command::Redeem {
            contract,
            hashed_secret,
            secret,
        } => {
            tezos
                .redeem(&Hex::new(hashed_secret), &Hex::new(secret), &contract)
                .await?;
        }
        Command::Refund {
            contract,
            hashed_secret,
        } => {
            tezos.refund(&Hex::new(hashed_secret), &contract).await?;
        }
    }

    if let Some(op) = tezos.operations().try_recv() {
        tracing::info!(hash = %op.hash, status = ?op.status, "Operation injected");
    }
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
