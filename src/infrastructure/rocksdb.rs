use super::staging::validate_commit;
use crate::config::LatencyProfile;
use crate::domain::account::Account;
use crate::domain::ports::{AccountRepository, IsolationLevel, TransactionalStore};
use crate::domain::scope::{RowOrigin, Scope, ScopeRegistry, StagedAccount};
use crate::domain::transaction::TransactionRecord;
use crate::error::{BankError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Column Family for storing account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for storing ledger records.
pub const CF_TRANSACTIONS: &str = "transactions";

#[derive(Debug, Serialize, Deserialize)]
struct StoredAccount {
    account: Account,
    version: u64,
}

/// A persistent store implementation using RocksDB.
///
/// Scopes buffer their writes in memory; commit validates them and applies
/// them as one `WriteBatch`, which RocksDB writes atomically. Commits are
/// serialized through `commit_lock` so validation and apply see the same state.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    scopes: Arc<ScopeRegistry>,
    commit_lock: Arc<Mutex<()>>,
    latency: LatencyProfile,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("accounts" and "transactions") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_latency(path, LatencyProfile::NONE)
    }

    pub fn open_with_latency<P: AsRef<Path>>(path: P, latency: LatencyProfile) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_accounts = ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default());
        let cf_transactions = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_accounts, cf_transactions])?;

        Ok(Self {
            db: Arc::new(db),
            scopes: ScopeRegistry::new(),
            commit_lock: Arc::new(Mutex::new(())),
            latency,
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BankError::Storage(format!("{} column family not found", name))
        })
    }

    fn ensure_open(&self, scope: &Scope) -> Result<()> {
        if scope.is_issued_by(&self.scopes) {
            Ok(())
        } else {
            Err(BankError::ScopeClosed(scope.id()))
        }
    }

    fn load_account(&self, id: &str) -> Result<Option<StoredAccount>> {
        let cf = self.cf(CF_ACCOUNTS)?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn record_exists(&self, id: &str) -> Result<bool> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        Ok(self.db.get_pinned_cf(cf, id.as_bytes())?.is_some())
    }
}

#[async_trait]
impl TransactionalStore for RocksDbStore {
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

        let _serialized = self.commit_lock.lock().await;
        validate_commit(
            &staged,
            |account_id| Ok(self.load_account(account_id)?.map(|row| row.version)),
            |record_id| self.record_exists(record_id),
        )?;

        let accounts = self.cf(CF_ACCOUNTS)?;
        let transactions = self.cf(CF_TRANSACTIONS)?;
        let mut batch = WriteBatch::default();
        for (account_id, row) in staged.accounts {
            let version = match row.origin {
                RowOrigin::Created => 1,
                RowOrigin::Updated { base_version } => base_version + 1,
            };
            let value = serde_json::to_vec(&StoredAccount {
                account: row.account,
                version,
            })?;
            batch.put_cf(accounts, account_id.as_bytes(), value);
        }
        for record in &staged.records {
            batch.put_cf(transactions, record.id.as_bytes(), serde_json::to_vec(record)?);
        }
        self.db.write(&batch)?;
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
        self.ensure_open(scope)?;
        self.cf(CF_ACCOUNTS).map(|_| ())
    }
}

#[async_trait]
impl AccountRepository for RocksDbStore {
    async fn create_account(&self, scope: &Scope, account: &Account) -> Result<()> {
        self.latency.pause().await;
        self.ensure_open(scope)?;
        let committed = self.load_account(&account.id)?.is_some();

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

        let row = self
            .load_account(id)?
            .ok_or_else(|| BankError::account_not_found(id))?;
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
        let mut staged = scope.staged();
        if let Some(row) = staged.accounts.get_mut(&account.id) {
            row.account.balance = account.balance;
            return Ok(());
        }

        let row = self
            .load_account(&account.id)?
            .ok_or_else(|| BankError::account_not_found(&account.id))?;
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
        let mut staged = scope.staged();

        for record in records {
            if staged.has_record(&record.id) || self.record_exists(&record.id)? {
                return Err(BankError::AlreadyExists {
                    entity: "transaction",
                    id: record.id.clone(),
                });
            }
            if staged.account(&record.account_id).is_none()
                && self.load_account(&record.account_id)?.is_none()
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
        let cf = self.cf(CF_TRANSACTIONS)?;

        let mut records = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        records.extend(scope.staged().records.iter().cloned());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Balance;
    use crate::domain::transaction::TransactionKind;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).expect("Failed to open RocksDB");

        assert!(store.db.cf_handle(CF_ACCOUNTS).is_some());
        assert!(store.db.cf_handle(CF_TRANSACTIONS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_commit_and_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDbStore::open(dir.path()).unwrap();
            let scope = store.begin().await.unwrap();
            let account = Account::new("USR001", "Alice", Balance::new(dec!(500)));
            store.create_account(&scope, &account).await.unwrap();
            store
                .create_transaction_records(
                    &scope,
                    &[TransactionRecord::new(
                        "TRX001_INIT",
                        "USR001",
                        TransactionKind::InitialBalance,
                        dec!(500),
                    )],
                )
                .await
                .unwrap();
            store.commit(scope).await.unwrap();
        }

        let store = RocksDbStore::open(dir.path()).unwrap();
        let scope = store.begin().await.unwrap();
        let account = store.get_account(&scope, "USR001").await.unwrap();
        assert_eq!(account.balance, Balance::new(dec!(500)));
        let records = store.list_transaction_records(&scope).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TransactionKind::InitialBalance);
    }

    #[tokio::test]
    async fn test_rocksdb_rollback_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();

        let scope = store.begin().await.unwrap();
        let account = Account::new("USR001", "Alice", Balance::ZERO);
        store.create_account(&scope, &account).await.unwrap();
        store.rollback(scope).await.unwrap();

        let scope = store.begin().await.unwrap();
        assert!(matches!(
            store.get_account(&scope, "USR001").await,
            Err(BankError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_rocksdb_stale_update_conflicts() {
        let dir = tempdir().unwrap();
        let store = RocksDbStore::open(dir.path()).unwrap();
        let scope = store.begin().await.unwrap();
        store
            .create_account(&scope, &Account::new("USR001", "Alice", Balance::new(dec!(10))))
            .await
            .unwrap();
        store.commit(scope).await.unwrap();

        let first = store.begin().await.unwrap();
        let second = store.begin().await.unwrap();
        for scope in [&first, &second] {
            let mut account = store.get_account(scope, "USR001").await.unwrap();
            account.balance -= Balance::new(dec!(10));
            store.update_balance(scope, &account).await.unwrap();
        }
        store.commit(first).await.unwrap();
        assert!(matches!(
            store.commit(second).await,
            Err(BankError::Conflict(_))
        ));
    }
}
