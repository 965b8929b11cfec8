#![allow(dead_code)]

use async_trait::async_trait;
use bankcore::application::service::BankService;
use bankcore::config::ServiceConfig;
use bankcore::domain::account::Account;
use bankcore::domain::ports::{AccountRepository, IsolationLevel, RepositoryRef, TransactionalStore};
use bankcore::domain::scope::{Scope, ScopeId};
use bankcore::domain::transaction::TransactionRecord;
use bankcore::error::{BankError, Result};
use bankcore::infrastructure::in_memory::InMemoryStore;
use bankcore::infrastructure::lock_registry::LockRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

pub fn service_over(store: RepositoryRef) -> (Arc<BankService>, Arc<LockRegistry>) {
    service_with_config(store, ServiceConfig::default())
}

pub fn service_with_config(
    store: RepositoryRef,
    config: ServiceConfig,
) -> (Arc<BankService>, Arc<LockRegistry>) {
    let locks = Arc::new(LockRegistry::new());
    let service = BankService::new(store, locks.clone(), config).expect("store isolation");
    (Arc::new(service), locks)
}

/// Resubmits while the service reports a transient rejection, like a caller would.
pub async fn submit_until_settled(
    service: &BankService,
    request: &TransactionRecord,
) -> Result<()> {
    loop {
        match service.create_transaction(request).await {
            Err(e) if e.is_retryable() => tokio::time::sleep(Duration::from_millis(1)).await,
            outcome => return outcome,
        }
    }
}

/// Switches that make the wrapped store fail at a chosen step.
#[derive(Default)]
pub struct Faults {
    pub fail_update: AtomicBool,
    pub fail_records: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_rollback: AtomicBool,
    pub commit_delay_ms: AtomicU64,
}

fn injected(step: &str) -> BankError {
    BankError::Storage(format!("injected {} failure", step))
}

/// In-memory store with fault injection.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: InMemoryStore,
    pub faults: Arc<Faults>,
}

#[async_trait]
impl TransactionalStore for FaultyStore {
    fn isolation(&self) -> IsolationLevel {
        self.inner.isolation()
    }

    async fn begin(&self) -> Result<Scope> {
        self.inner.begin().await
    }

    async fn commit(&self, scope: Scope) -> Result<()> {
        let delay = self.faults.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.faults.fail_commit.load(Ordering::SeqCst) {
            drop(scope);
            return Err(injected("commit"));
        }
        self.inner.commit(scope).await
    }

    async fn rollback(&self, scope: Scope) -> Result<()> {
        if self.faults.fail_rollback.load(Ordering::SeqCst) {
            drop(scope);
            return Err(injected("rollback"));
        }
        self.inner.rollback(scope).await
    }

    async fn verify(&self, scope: &Scope) -> Result<()> {
        self.inner.verify(scope).await
    }
}

#[async_trait]
impl AccountRepository for FaultyStore {
    async fn create_account(&self, scope: &Scope, account: &Account) -> Result<()> {
        self.inner.create_account(scope, account).await
    }

    async fn get_account(&self, scope: &Scope, id: &str) -> Result<Account> {
        self.inner.get_account(scope, id).await
    }

    async fn update_balance(&self, scope: &Scope, account: &Account) -> Result<()> {
        if self.faults.fail_update.load(Ordering::SeqCst) {
            return Err(injected("update"));
        }
        self.inner.update_balance(scope, account).await
    }

    async fn create_transaction_records(
        &self,
        scope: &Scope,
        records: &[TransactionRecord],
    ) -> Result<()> {
        if self.faults.fail_records.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.create_transaction_records(scope, records).await
    }

    async fn list_transaction_records(&self, scope: &Scope) -> Result<Vec<TransactionRecord>> {
        self.inner.list_transaction_records(scope).await
    }
}

#[derive(Default)]
struct ProbeState {
    scope_account: HashMap<ScopeId, String>,
    active: HashMap<String, usize>,
    max_active: HashMap<String, usize>,
}

/// In-memory store that records how many scopes touch each account at once.
///
/// A scope counts as active on an account from its first read of that account
/// until it is committed or rolled back.
#[derive(Clone, Default)]
pub struct ProbeStore {
    pub inner: InMemoryStore,
    state: Arc<Mutex<ProbeState>>,
}

impl ProbeStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            state: Arc::default(),
        }
    }

    pub fn max_overlap(&self, account_id: &str) -> usize {
        self.state
            .lock()
            .max_active
            .get(account_id)
            .copied()
            .unwrap_or(0)
    }

    fn close(&self, scope: ScopeId) {
        let mut state = self.state.lock();
        if let Some(account) = state.scope_account.remove(&scope)
            && let Some(active) = state.active.get_mut(&account)
        {
            *active -= 1;
        }
    }
}

#[async_trait]
impl TransactionalStore for ProbeStore {
    fn isolation(&self) -> IsolationLevel {
        self.inner.isolation()
    }

    async fn begin(&self) -> Result<Scope> {
        self.inner.begin().await
    }

    async fn commit(&self, scope: Scope) -> Result<()> {
        let id = scope.id();
        let result = self.inner.commit(scope).await;
        self.close(id);
        result
    }

    async fn rollback(&self, scope: Scope) -> Result<()> {
        let id = scope.id();
        let result = self.inner.rollback(scope).await;
        self.close(id);
        result
    }

    async fn verify(&self, scope: &Scope) -> Result<()> {
        self.inner.verify(scope).await
    }
}

#[async_trait]
impl AccountRepository for ProbeStore {
    async fn create_account(&self, scope: &Scope, account: &Account) -> Result<()> {
        self.inner.create_account(scope, account).await
    }

    async fn get_account(&self, scope: &Scope, id: &str) -> Result<Account> {
        {
            let mut state = self.state.lock();
            if state.scope_account.insert(scope.id(), id.to_string()).is_none() {
                let active = state.active.entry(id.to_string()).or_insert(0);
                *active += 1;
                let now = *active;
                let max = state.max_active.entry(id.to_string()).or_insert(0);
                *max = (*max).max(now);
            }
        }
        self.inner.get_account(scope, id).await
    }

    async fn update_balance(&self, scope: &Scope, account: &Account) -> Result<()> {
        self.inner.update_balance(scope, account).await
    }

    async fn create_transaction_records(
        &self,
        scope: &Scope,
        records: &[TransactionRecord],
    ) -> Result<()> {
        self.inner.create_transaction_records(scope, records).await
    }

    async fn list_transaction_records(&self, scope: &Scope) -> Result<Vec<TransactionRecord>> {
        self.inner.list_transaction_records(scope).await
    }
}

pub fn write_csv(path: &Path, header: &[&str], rows: &[&[&str]]) -> std::result::Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(*row)?;
    }
    wtr.flush()?;
    Ok(())
}
