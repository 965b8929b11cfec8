use super::staging::validate_commit;
use crate::config::LatencyProfile;
use crate::domain::account::{Account, AccountId};
use crate::domain::ports::{AccountRepository, IsolationLevel, TransactionalStore};
use crate::domain::scope::{RowOrigin, Scope, ScopeRegistry, StagedAccount};
use crate::domain::transaction::TransactionRecord;
use crate::error::{BankError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct VersionedAccount {
    account: Account,
    version: u64,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, VersionedAccount>,
    records: Vec<TransactionRecord>,
    record_ids: HashSet<String>,
}

/// A thread-safe in-memory transactional store.
///
/// Committed rows live behind `Arc<RwLock<..>>`; each open scope buffers its
/// own writes, and commit validates and applies them under the write lock so
/// other scopes observe all of a commit or none of it.
/// Ideal for testing or for runs where persistence is not required.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    scopes: Arc<ScopeRegistry>,
    latency: LatencyProfile,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store with no artificial latency.
    pub fn new() -> Self {
        Self::with_latency(LatencyProfile::NONE)
    }

    pub fn with_latency(latency: LatencyProfile) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            scopes: ScopeRegistry::new(),
            latency,
        }
    }

    /// Number of scopes begun and not yet committed, rolled back or dropped.
    pub fn open_scopes(&self) -> usize {
        self.scopes.open_count()
    }

    fn ensure_open(&self, scope: &Scope) -> Result<()> {
        if scope.is_issued_by(&self.scopes) {
            Ok(())
        } else {
            Err(BankError::ScopeClosed(scope.id()))
        }
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    fn isolation(&self) -> IsolationLevel {
        IsolationLevel::ReadCommitted
    }

    async fn begin(&self) -> Result<Scope> {
        self.latency.pause().await;
        let scope = self.scopes.open();
        debug!(scope = scope.id(), "scope opened");
        Ok(scope)
    }

    async fn commit(&self, scope: Scope) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(&scope)?;
        let id = scope.id();
        let staged = scope.into_staged();
        if staged.is_empty() {
            return Ok(());
        }

        let mut tables = self.tables.write().await;
        validate_commit(
            &staged,
            |account_id| Ok(tables.accounts.get(account_id).map(|row| row.version)),
            |record_id| Ok(tables.record_ids.contains(record_id)),
        )?;

        for (account_id, row) in staged.accounts {
            let version = match row.origin {
                RowOrigin::Created => 1,
                RowOrigin::Updated { base_version } => base_version + 1,
            };
            tables.accounts.insert(
                account_id,
                VersionedAccount {
                    account: row.account,
                    version,
                },
            );
        }
        for record in staged.records {
            tables.record_ids.insert(record.id.clone());
            tables.records.push(record);
        }
        debug!(scope = id, "scope committed");
        Ok(())
    }

    async fn rollback(&self, scope: Scope) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(&scope)?;
        debug!(scope = scope.id(), "scope rolled back");
        drop(scope.into_staged());
        Ok(())
    }

    async fn verify(&self, scope: &Scope) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(scope)
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn create_account(&self, scope: &Scope, account: &Account) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(scope)?;
        let committed = self.tables.read().await.accounts.contains_key(&account.id);

        let mut staged = scope.staged();
        if committed || staged.accounts.contains_key(&account.id) {
            return Err(BankError::AlreadyExists {
                entity: "account",
                id: account.id.clone(),
            });
        }
        staged.accounts.insert(
            account.id.clone(),
            StagedAccount {
                account: account.clone(),
                origin: RowOrigin::Created,
            },
        );
        Ok(())
    }

    async fn get_account(&self, scope: &Scope, id: &str) -> Result<Account> {
        self.latency.pause().await;
        self.ensure_open(scope)?;
        let staged = scope.staged().account(id).cloned();
        if let Some(account) = staged {
            return Ok(account);
        }

        let row = self.tables.read().await.accounts.get(id).cloned();
        let row = row.ok_or_else(|| BankError::account_not_found(id))?;
        scope
            .staged()
            .read_versions
            .entry(id.to_string())
            .or_insert(row.version);
        Ok(row.account)
    }

    async fn update_balance(&self, scope: &Scope, account: &Account) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(scope)?;
        {
            let mut staged = scope.staged();
            if let Some(row) = staged.accounts.get_mut(&account.id) {
                row.account.balance = account.balance;
                return Ok(());
            }
        }

        let row = self.tables.read().await.accounts.get(&account.id).cloned();
        let row = row.ok_or_else(|| BankError::account_not_found(&account.id))?;

        let mut staged = scope.staged();
        let base_version = staged
            .read_versions
            .get(&account.id)
            .copied()
            .unwrap_or(row.version);
        let mut updated = row.account;
        updated.balance = account.balance;
        staged.accounts.insert(
            account.id.clone(),
            StagedAccount {
                account: updated,
                origin: RowOrigin::Updated { base_version },
            },
        );
        Ok(())
    }

    async fn create_transaction_records(
        &self,
        scope: &Scope,
        records: &[TransactionRecord],
    ) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(scope)?;
        let tables = self.tables.read().await;
        let mut staged = scope.staged();

        for record in records {
            if tables.record_ids.contains(&record.id) || staged.has_record(&record.id) {
                return Err(BankError::AlreadyExists {
                    entity: "transaction",
                    id: record.id.clone(),
                });
            }
            if staged.account(&record.account_id).is_none()
                && !tables.accounts.contains_key(&record.account_id)
            {
                return Err(BankError::account_not_found(&record.account_id));
            }
            staged.records.push(record.clone());
        }
        Ok(())
    }

    async fn list_transaction_records(&self, scope: &Scope) -> Result<Vec<TransactionRecord>> {
        self.latency.pause().await;
        self.ensure_open(scope)?;
        let mut records = self.tables.read().await.records.clone();
        records.extend(scope.staged().records.iter().cloned());
        Ok(records)
    }
}
