//! QC-Dividend: dividend round operator tool
//!
//! Computes a round from an exported ledger snapshot, prints inclusion
//! proofs for single accounts and simulates full Start/Apply/Done
//! submission against an in-memory ledger.

mod input;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use qc_18_dividend_distribution::{
    account_hex, hash_hex, ApplyPayout, ComputedRound, ControllerKeypair, DirectLedgerSink,
    DividendConfig, DividendEngine, InMemoryLedger, InMemoryResultMapStore, LedgerSnapshot,
    RoundPools, RoundQuery, RoundStateMachine, RoundSubmitter, RoundWorker,
};

use crate::input::{load_config, parse_account, SnapshotFile};

type Store = Arc<InMemoryResultMapStore>;

/// QC-Dividend: compute, prove and simulate dividend rounds
#[derive(Parser, Debug)]
#[command(name = "qc-dividend")]
#[command(about = "Operator tool for Quantum-Chain dividend rounds")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a round and print its summary
    Compute {
        #[command(flatten)]
        round: RoundArgs,

        /// Also print every payout record
        #[arg(long)]
        table: bool,
    },
    /// Print the inclusion proof of one account's payout
    Prove {
        #[command(flatten)]
        round: RoundArgs,

        /// Account id (hex)
        #[arg(long)]
        account: String,
    },
    /// Compute a round and submit it to an in-memory ledger
    Simulate {
        #[command(flatten)]
        round: RoundArgs,

        /// Hex seed of the round-controller key used for signing
        #[arg(long, default_value = "0000000000000000000000000000000000000000000000000000000000000001")]
        controller_seed: String,
    },
}

#[derive(Args, Debug)]
struct RoundArgs {
    /// Ledger snapshot (JSON)
    #[arg(short, long)]
    snapshot: PathBuf,

    /// Dividend configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// VBC pool of the round
    #[arg(long)]
    vbc: u64,

    /// Coin pool; derived from the growth ratio when omitted
    #[arg(long)]
    coins: Option<u64>,
}

impl RoundArgs {
    fn pools(&self) -> RoundPools {
        RoundPools {
            total_coins: self.coins,
            total_coins_vbc: self.vbc,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Compute { round, table } => compute(round, table),
        Command::Prove { round, account } => prove(round, &account),
        Command::Simulate {
            round,
            controller_seed,
        } => simulate(round, &controller_seed).await,
    }
}

fn load(args: &RoundArgs) -> Result<(DividendConfig, SnapshotFile)> {
    let config = load_config(args.config.as_deref())?;
    let snapshot = SnapshotFile::load(&args.snapshot)?;
    Ok((config, snapshot))
}

fn compute_round(
    config: DividendConfig,
    snapshot: &SnapshotFile,
    pools: RoundPools,
) -> Result<ComputedRound<Store>> {
    let ledger = InMemoryLedger::with_accounts(snapshot.ledger_seq, snapshot.ledger_accounts()?);
    let engine = DividendEngine::new(config)?;
    engine
        .compute_round(
            ledger.snapshot().as_ref(),
            pools,
            Arc::new(InMemoryResultMapStore::new()),
        )
        .context("Round computation failed")
}

fn compute(args: RoundArgs, table: bool) -> Result<()> {
    let (config, snapshot) = load(&args)?;
    let round = compute_round(config, &snapshot, args.pools())?;

    let mut output = json!({ "summary": round.summary() });
    if table {
        output["records"] = serde_json::to_value(
            round
                .records
                .iter()
                .map(|r| {
                    json!({
                        "account": account_hex(&r.account_id),
                        "coin": r.coin_amount,
                        "vbc": r.vbc_amount,
                        "vbc_by_rank": r.vbc_by_rank,
                        "vbc_by_spread": r.vbc_by_spread,
                        "rank": r.rank,
                        "spread": r.spread,
                        "subtree_holding": r.subtree_holding,
                    })
                })
                .collect::<Vec<_>>(),
        )?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn prove(args: RoundArgs, account: &str) -> Result<()> {
    let account = parse_account(account)?;
    let (config, snapshot) = load(&args)?;
    let round = compute_round(config, &snapshot, args.pools())?;

    let record = round
        .records
        .iter()
        .find(|r| r.account_id == account)
        .with_context(|| format!("No payout for account {}", account_hex(&account)))?;
    let key = ApplyPayout::new(round.ledger_seq(), record.clone()).key();
    let proof = round
        .result_map
        .proof(&key)?
        .context("Payout missing from result map")?;

    let output = json!({
        "account": account_hex(&account),
        "result_hash": hash_hex(&round.result_hash()),
        "key": hash_hex(&proof.key),
        "value": hex::encode(&proof.value),
        "nodes": proof.nodes.iter().map(hex::encode).collect::<Vec<_>>(),
        "verified": qc_18_dividend_distribution::verify_proof(&round.result_hash(), &proof),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn simulate(args: RoundArgs, controller_seed: &str) -> Result<()> {
    let seed: [u8; 32] = hex::decode(controller_seed)
        .context("Controller seed is not hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("Controller seed must be 32 bytes"))?;
    let keypair = ControllerKeypair::from_seed(seed);

    let (mut config, snapshot) = load(&args)?;
    config.controller_public_key = Some(hex::encode(keypair.public_key().as_bytes()));
    config.validate_for_production()?;

    let ledger = Arc::new(InMemoryLedger::with_accounts(
        snapshot.ledger_seq,
        snapshot.ledger_accounts()?,
    ));
    let frozen: Arc<LedgerSnapshot> = ledger.snapshot();

    let engine = Arc::new(DividendEngine::new(config.clone())?);
    let (worker, mut handoff) = RoundWorker::<Store>::new(engine, 1);
    let summary = worker
        .compute(frozen, args.pools(), Arc::new(InMemoryResultMapStore::new()))
        .await?;
    let round = handoff
        .recv()
        .await
        .context("Computed round was not handed off")?;
    info!(result_hash = %summary.result_hash, "Submitting round");

    let machine = Arc::new(RoundStateMachine::from_config(ledger.clone(), &config)?);
    let submitter = RoundSubmitter::new(
        round,
        ledger.clone(),
        DirectLedgerSink::new(machine),
        keypair,
        &config,
    );
    let report = submitter.drive().await.context("Round submission failed")?;

    let output = json!({
        "summary": summary,
        "report": report,
        "round": ledger.current_round()?,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
