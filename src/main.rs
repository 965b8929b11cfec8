use bankcore::application::service::BankService;
use bankcore::config::{LatencyProfile, ServiceConfig};
use bankcore::domain::account::Account;
use bankcore::domain::ports::RepositoryRef;
use bankcore::domain::transaction::TransactionRecord;
use bankcore::error::{BankError, ErrorKind};
use bankcore::infrastructure::in_memory::InMemoryStore;
use bankcore::infrastructure::lock_registry::LockRegistry;
use bankcore::interfaces::csv::account_reader::AccountReader;
use bankcore::interfaces::csv::account_writer::AccountWriter;
use bankcore::interfaces::csv::transaction_reader::TransactionReader;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Transaction requests CSV file (id, account, type, amount)
    input: PathBuf,

    /// Accounts to create before processing requests (id, name, balance)
    #[arg(long)]
    accounts: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Resubmissions allowed for a request rejected as locked, conflicting or timed out
    #[arg(long, default_value_t = 100)]
    max_retries: u32,

    /// Base delay between resubmissions; each wait is jittered up to twice this
    #[arg(long, default_value_t = 5)]
    retry_delay_ms: u64,

    /// Deadline for every individual storage call
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Lower bound of simulated storage latency
    #[arg(long, default_value_t = 0)]
    latency_min_ms: u64,

    /// Upper bound of simulated storage latency
    #[arg(long, default_value_t = 0)]
    latency_max_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    max_retries: u32,
    backoff: LatencyProfile,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let latency = LatencyProfile::between(
        Duration::from_millis(cli.latency_min_ms),
        Duration::from_millis(cli.latency_max_ms),
    );
    let config = ServiceConfig {
        storage_timeout: Duration::from_millis(cli.timeout_ms),
    };
    let policy = RetryPolicy {
        max_retries: cli.max_retries,
        backoff: LatencyProfile::between(
            Duration::from_millis(cli.retry_delay_ms),
            Duration::from_millis(cli.retry_delay_ms.saturating_mul(2)),
        ),
    };

    let store = build_store(cli.db_path.as_ref(), latency)?;
    let service = Arc::new(
        BankService::new(store, Arc::new(LockRegistry::new()), config).into_diagnostic()?,
    );

    let mut account_ids = BTreeSet::new();
    if let Some(path) = &cli.accounts {
        let file = File::open(path).into_diagnostic()?;
        for seed in AccountReader::new(file).accounts() {
            match seed {
                Ok(seed) => {
                    account_ids.insert(seed.id.clone());
                    let record_id = seed.initial_record_id();
                    if let Err(e) = service
                        .open_account(&seed.id, &seed.name, seed.balance, &record_id)
                        .await
                    {
                        eprintln!("Error creating account {}: {}", seed.id, e);
                    }
                }
                Err(e) => eprintln!("Error reading account: {}", e),
            }
        }
    }

    // Every request runs as its own task so requests on the same account
    // genuinely race for its lock.
    let file = File::open(&cli.input).into_diagnostic()?;
    let mut tasks = Vec::new();
    for request in TransactionReader::new(file).transactions() {
        match request {
            Ok(request) => {
                account_ids.insert(request.account_id.clone());
                let service = Arc::clone(&service);
                tasks.push(tokio::spawn(async move {
                    let outcome = submit(&service, &request, policy).await;
                    (request, outcome)
                }));
            }
            Err(e) => eprintln!("Error reading transaction: {}", e),
        }
    }

    for task in tasks {
        let (request, outcome) = task.await.into_diagnostic()?;
        if let Err(e) = outcome {
            eprintln!("Error processing transaction {}: {}", request.id, e);
        }
    }

    let mut accounts: Vec<Account> = Vec::with_capacity(account_ids.len());
    for id in &account_ids {
        match service.get_account(id).await {
            Ok(account) => accounts.push(account),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).into_diagnostic(),
        }
    }

    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(&accounts).into_diagnostic()?;

    Ok(())
}

/// Submits `request`, resubmitting while the service reports a transient rejection.
async fn submit(
    service: &BankService,
    request: &TransactionRecord,
    policy: RetryPolicy,
) -> std::result::Result<(), BankError> {
    let mut attempt = 0;
    loop {
        match service.create_transaction(request).await {
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                debug!(tx = %request.id, attempt, error = %e, "resubmitting");
                policy.backoff.pause().await;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn build_store(db_path: Option<&PathBuf>, latency: LatencyProfile) -> Result<RepositoryRef> {
    use bankcore::infrastructure::rocksdb::RocksDbStore;

    match db_path {
        Some(path) => {
            let store = RocksDbStore::open_with_latency(path, latency).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryStore::with_latency(latency))),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_store(db_path: Option<&PathBuf>, latency: LatencyProfile) -> Result<RepositoryRef> {
    if db_path.is_some() {
        tracing::warn!(
            "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
        );
    }
    Ok(Arc::new(InMemoryStore::with_latency(latency)))
}
