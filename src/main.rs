use cauris::application::engine::{FeePolicy, PaymentEngine};
use cauris::application::gate::IdempotencyGate;
use cauris::domain::idempotency::{RequestFingerprint, StoredResponse};
use cauris::domain::ports::{IdempotencyStoreBox, LedgerStoreBox};
use cauris::infrastructure::in_memory::{InMemoryIdempotencyStore, InMemoryLedgerStore};
use cauris::interfaces::csv::balance_writer::BalanceWriter;
use cauris::interfaces::csv::command_reader::{CommandOp, CommandReader, PaymentCommand};
use cauris::interfaces::csv::directory_reader::{load_listings, load_users};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input payment commands CSV file (op, user, listing, intent, key)
    input: PathBuf,

    /// Listing catalogue CSV file (id, seller, price)
    #[arg(long)]
    listings: PathBuf,

    /// User directory CSV file (id, blocked, kyc)
    #[arg(long)]
    users: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Platform fee rate, e.g. 0.05
    #[arg(long)]
    fee_rate: Option<Decimal>,
}

fn stores(cli: &Cli) -> Result<(LedgerStoreBox, IdempotencyStoreBox)> {
    match &cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            let store = cauris::infrastructure::rocksdb::RocksDbStore::open(db_path)
                .into_diagnostic()?;
            Ok((Box::new(store.clone()), Box::new(store)))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => Err(miette::miette!(
            "--db-path requires the storage-rocksdb feature"
        )),
        None => Ok((
            Box::new(InMemoryLedgerStore::new()),
            Box::new(InMemoryIdempotencyStore::new()),
        )),
    }
}

async fn process_command(
    engine: &PaymentEngine,
    gate: &IdempotencyGate,
    command: PaymentCommand,
) -> cauris::error::Result<()> {
    use cauris::error::PaymentError;

    match command.op {
        CommandOp::Create => {
            let buyer = command
                .user
                .ok_or_else(|| PaymentError::Validation("create requires user".to_string()))?;
            let listing = command
                .listing
                .ok_or_else(|| PaymentError::Validation("create requires listing".to_string()))?;
            let key = command.key.ok_or_else(|| {
                PaymentError::Validation("create requires an idempotency key".to_string())
            })?;

            let body = serde_json::json!({ "buyerId": buyer, "listingId": listing });
            let fingerprint = RequestFingerprint::new("POST", "/payments/intents", &body);
            gate.run(Some(key.as_str()), &fingerprint, || async move {
                let receipt = engine.create_intent(buyer, listing).await?;
                Ok(StoredResponse {
                    status_code: 201,
                    body: serde_json::to_value(&receipt)?,
                })
            })
            .await?;
            Ok(())
        }
        CommandOp::Confirm => {
            let intent = require_intent(&command)?;
            engine.confirm_intent(intent).await.map(drop)
        }
        CommandOp::Capture => {
            let intent = require_intent(&command)?;
            engine.capture_intent(intent).await.map(drop)
        }
        CommandOp::Refund => {
            let intent = require_intent(&command)?;
            engine.refund_intent(intent).await.map(drop)
        }
        CommandOp::Cancel => {
            let intent = require_intent(&command)?;
            let caller = command
                .user
                .ok_or_else(|| PaymentError::Validation("cancel requires user".to_string()))?;
            engine.cancel_intent(intent, caller, false).await.map(drop)
        }
    }
}

fn require_intent(
    command: &PaymentCommand,
) -> cauris::error::Result<cauris::domain::intent::IntentId> {
    command.intent.ok_or_else(|| {
        cauris::error::PaymentError::Validation("command requires intent".to_string())
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let listings = load_listings(File::open(&cli.listings).into_diagnostic()?)
        .await
        .into_diagnostic()?;
    let users = load_users(File::open(&cli.users).into_diagnostic()?)
        .await
        .into_diagnostic()?;
    let fees = match cli.fee_rate {
        Some(rate) => FeePolicy::new(rate).into_diagnostic()?,
        None => FeePolicy::default(),
    };

    let (ledger_store, idempotency_store) = stores(&cli)?;
    let engine = PaymentEngine::new(ledger_store, Box::new(listings), Box::new(users), fees);
    let gate = IdempotencyGate::new(idempotency_store);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command_result in reader.commands() {
        match command_result {
            Ok(command) => {
                if let Err(e) = process_command(&engine, &gate, command).await {
                    eprintln!("Error processing command: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {e}");
            }
        }
    }

    let balances = engine.all_account_balances().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(balances).into_diagnostic()?;

    Ok(())
}
