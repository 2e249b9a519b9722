use clap::Parser;
use fiado::application::ledger::LedgerService;
use fiado::domain::ports::LedgerStoreBox;
use fiado::infrastructure::in_memory::InMemoryLedgerStore;
use fiado::interfaces::csv::balance_writer::BalanceWriter;
use fiado::interfaces::csv::operation_reader::OperationReader;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ledger operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "FIADO_DB_PATH")]
    db_path: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<LedgerStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = fiado::infrastructure::rocksdb::RocksDBLedgerStore::open(path)?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryLedgerStore::new()))
        }
        None => Ok(Box::new(InMemoryLedgerStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let ledger = LedgerService::new(open_store(cli.db_path)?);

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = op.apply(&ledger).await {
                    eprintln!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    let balances = ledger.balances().await?;

    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(&balances)?;

    Ok(())
}
