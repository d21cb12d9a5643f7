// bin/replay.rs - Apply a transaction batch to a genesis state
use anyhow::{Context, Result};
use clap::Parser;
use ldvm_common::crypto::Ed25519Verifier;
use ldvm_core::{BatchExecutor, ChainConfig};
use ldvm_state::{AccountData, ChainState, MemoryState};
use ldvm_transaction::Transaction;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ldvm-replay")]
#[command(about = "Apply a transaction batch to a genesis state and print the outcome", long_about = None)]
struct Args {
    /// Chain config (toml, json or yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON list of account records
    #[arg(short, long)]
    genesis: PathBuf,

    /// JSON list of transactions
    #[arg(short, long)]
    batch: PathBuf,

    /// Block height the batch is applied at
    #[arg(long, default_value = "1")]
    height: u64,

    /// Block timestamp in seconds
    #[arg(long, default_value = "0")]
    timestamp: u64,

    /// Log level, overridden by RUST_LOG
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    outcome: ldvm_core::BatchOutcome,
    accounts: Vec<AccountData>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ChainConfig::load(path)?,
        None => ChainConfig::default(),
    };

    // Initialize logging
    let level = args.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let genesis: Vec<AccountData> = read_json(&args.genesis)?;
    let batch: Vec<Transaction> = read_json(&args.batch)?;

    let state = MemoryState::new(args.height, args.timestamp, config.fees.fee_sink);
    for account in genesis {
        state.insert(account)?;
    }
    state
        .verify_global_invariants()
        .context("genesis violates global invariants")?;

    tracing::info!(
        chain_id = config.chain_id,
        height = args.height,
        txs = batch.len(),
        "replaying batch"
    );
    let outcome = BatchExecutor::new(&config, &Ed25519Verifier).apply_batch(&state, batch)?;

    let report = Report {
        outcome,
        accounts: state.accounts(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
