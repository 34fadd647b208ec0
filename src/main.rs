use clap::Parser;
use miette::{IntoDiagnostic, Result};
use money_movement::application::config::ServiceConfig;
use money_movement::application::service::MoneyMovementService;
use money_movement::domain::ports::LedgerStoreRef;
use money_movement::domain::transaction::Pid;
use money_movement::infrastructure::broker::InMemoryBroker;
use money_movement::infrastructure::in_memory::InMemoryLedgerStore;
use money_movement::interfaces::csv::account_writer::AccountWriter;
use money_movement::interfaces::csv::command_reader::{Command, CommandReader};
use money_movement::interfaces::csv::wallet_reader::WalletReader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payment commands CSV file (`type,reference,customer,merchant,cents,currency`)
    input: PathBuf,

    /// Wallets to create before running commands (`user_id,wallet_type,default,payment,incoming`)
    #[arg(long)]
    wallets: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "MONEY_MOVEMENT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Write every published event to this file as JSON lines
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Settlement currency accepted by authorize
    #[arg(long, default_value = "USD")]
    currency: String,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use money_movement::infrastructure::rocksdb::RocksDBLedgerStore;
            let store = RocksDBLedgerStore::open(&path)?;
            tracing::info!(path = %path.display(), "using RocksDB ledger");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
            );
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();

    let store = open_store(cli.db_path)?;
    let broker = InMemoryBroker::new();
    let service = MoneyMovementService::new(
        store,
        Arc::new(broker.clone()),
        ServiceConfig::with_currency(&cli.currency),
    );

    if let Some(path) = cli.wallets {
        let file = File::open(path).into_diagnostic()?;
        for provision in WalletReader::new(file).wallets() {
            match provision {
                Ok(provision) => {
                    if let Err(e) = service.provision_wallet(&provision).await {
                        error!(
                            user_id = %provision.user_id,
                            error = %e,
                            "Error provisioning wallet"
                        );
                    }
                }
                Err(e) => error!(error = %e, "Error reading wallet"),
            }
        }
    }

    // Process commands
    let mut payments: HashMap<String, Pid> = HashMap::new();
    let file = File::open(cli.input).into_diagnostic()?;
    for command in CommandReader::new(file).commands() {
        match command {
            Ok(Command::Authorize { reference, request }) => {
                match service.authorize(&request).await {
                    Ok(pid) => {
                        payments.insert(reference, pid);
                    }
                    Err(e) => error!(
                        %reference,
                        code = %e.code(),
                        error = %e,
                        "Error processing authorize"
                    ),
                }
            }
            Ok(Command::Capture { reference }) => {
                let pid = payments
                    .get(&reference)
                    .cloned()
                    .unwrap_or_else(|| Pid::from(reference.as_str()));
                if let Err(e) = service.capture(&pid).await {
                    error!(
                        %reference,
                        code = %e.code(),
                        error = %e,
                        "Error processing capture"
                    );
                }
            }
            Err(e) => error!(error = %e, "Error reading command"),
        }
    }

    if let Some(path) = cli.events_out {
        let mut out = BufWriter::new(File::create(path).into_diagnostic()?);
        for message in broker.all_messages().await {
            serde_json::to_writer(&mut out, &message).into_diagnostic()?;
            writeln!(out).into_diagnostic()?;
        }
        out.flush().into_diagnostic()?;
    }

    // Output final balances
    let balances = service.balances().await?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(balances)?;

    Ok(())
}
