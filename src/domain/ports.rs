use super::account::Account;
use super::scope::Scope;
use super::transaction::TransactionRecord;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Isolation a store guarantees between concurrently open scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    Serializable,
}

/// Begin/commit/rollback against persistent storage.
///
/// Commit and rollback may be slow and may fail. Whatever the outcome, the
/// scope is consumed and cannot be used again.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    fn isolation(&self) -> IsolationLevel;
    async fn begin(&self) -> Result<Scope>;
    async fn commit(&self, scope: Scope) -> Result<()>;
    async fn rollback(&self, scope: Scope) -> Result<()>;
    /// Liveness check of an open scope.
    async fn verify(&self, scope: &Scope) -> Result<()>;
}

/// Account and ledger primitives executed inside a caller-supplied scope.
#[async_trait]
pub trait AccountRepository: TransactionalStore {
    async fn create_account(&self, scope: &Scope, account: &Account) -> Result<()>;
    async fn get_account(&self, scope: &Scope, id: &str) -> Result<Account>;
    async fn update_balance(&self, scope: &Scope, account: &Account) -> Result<()>;
    async fn create_transaction_records(
        &self,
        scope: &Scope,
        records: &[TransactionRecord],
    ) -> Result<()>;
    async fn list_transaction_records(&self, scope: &Scope) -> Result<Vec<TransactionRecord>>;
}

/// Admission gate keyed by account id. Never blocks.
pub trait AccountLocker: Send + Sync {
    /// Fails with `AccountLocked` if `account_id` is already held.
    fn acquire(&self, account_id: &str) -> Result<()>;
    /// Idempotent; releasing an unheld account is not an error.
    fn release(&self, account_id: &str) -> Result<()>;
}

pub type RepositoryRef = Arc<dyn AccountRepository>;
pub type LockerRef = Arc<dyn AccountLocker>;
