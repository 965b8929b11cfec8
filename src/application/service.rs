use super::lock_guard::LockGuard;
use crate::config::ServiceConfig;
use crate::domain::account::{Account, Amount, Balance};
use crate::domain::ports::{IsolationLevel, LockerRef, RepositoryRef};
use crate::domain::scope::Scope;
use crate::domain::transaction::{TransactionKind, TransactionRecord};
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use std::future::Future;
use std::slice;
use tracing::{debug, info, instrument, warn};

/// Serializes balance mutations per account and makes each one all-or-nothing.
///
/// A request first passes the account lock (admission control, fails fast),
/// then runs read, validate and write inside one storage scope, and ends in
/// exactly one commit or rollback. The store's isolation is what actually
/// keeps concurrent writers consistent; the lock only stops local requests
/// from wasting a scope on an account that is already busy.
pub struct BankService {
    repository: RepositoryRef,
    locks: LockerRef,
    config: ServiceConfig,
}

impl BankService {
    /// Creates a new `BankService`.
    ///
    /// Fails with `UnsupportedIsolation` if the store cannot guarantee at
    /// least read-committed isolation between scopes.
    pub fn new(repository: RepositoryRef, locks: LockerRef, config: ServiceConfig) -> Result<Self> {
        let isolation = repository.isolation();
        if isolation < IsolationLevel::ReadCommitted {
            return Err(BankError::UnsupportedIsolation(isolation));
        }
        Ok(Self {
            repository,
            locks,
            config,
        })
    }

    /// Applies a deposit or withdrawal and appends `request` to the ledger.
    ///
    /// Returns `AccountLocked` without touching storage if another request on
    /// the same account is in flight. On any error neither the balance nor
    /// the ledger changes. Nothing is retried here.
    #[instrument(skip_all, fields(tx = %request.id, account = %request.account_id))]
    pub async fn create_transaction(&self, request: &TransactionRecord) -> Result<()> {
        let _lock = match LockGuard::acquire(self.locks.as_ref(), &request.account_id) {
            Ok(guard) => guard,
            Err(err) => {
                debug!("rejected at admission");
                return Err(err);
            }
        };

        let scope = self.bounded(self.repository.begin()).await?;
        let outcome = self.apply(&scope, request).await;
        if let Err(err) = &outcome {
            warn!(kind = %request.kind, amount = %request.amount, error = %err, "transaction rejected");
        }
        self.finish(scope, outcome).await?;

        info!(kind = %request.kind, amount = %request.amount, "transaction committed");
        Ok(())
    }

    /// Creates `account` together with its opening ledger entries in one scope.
    ///
    /// No account lock is taken: nothing can be racing on an id that does not
    /// exist yet, and a duplicate id is caught by the store as `AlreadyExists`.
    #[instrument(skip_all, fields(account = %account.id))]
    pub async fn create_account(
        &self,
        account: &Account,
        records: &[TransactionRecord],
    ) -> Result<()> {
        for record in records {
            Amount::new(record.amount)?;
        }

        let scope = self.bounded(self.repository.begin()).await?;
        let outcome = async {
            self.bounded(self.repository.create_account(&scope, account))
                .await?;
            if !records.is_empty() {
                self.bounded(self.repository.create_transaction_records(&scope, records))
                    .await?;
            }
            Ok(())
        }
        .await;
        self.finish(scope, outcome).await?;

        info!(balance = %account.balance, records = records.len(), "account created");
        Ok(())
    }

    /// Creates an account whose opening balance is backed by an
    /// `initial_balance` ledger entry with id `record_id`.
    ///
    /// A zero opening balance creates the account without a ledger entry.
    pub async fn open_account(
        &self,
        id: &str,
        name: &str,
        initial_balance: Decimal,
        record_id: &str,
    ) -> Result<()> {
        let account = Account::new(id, name, Balance::new(initial_balance));
        if initial_balance.is_zero() {
            return self.create_account(&account, &[]).await;
        }
        let record = TransactionRecord::new(
            record_id,
            id,
            TransactionKind::InitialBalance,
            initial_balance,
        );
        self.create_account(&account, &[record]).await
    }

    pub async fn get_account(&self, id: &str) -> Result<Account> {
        let scope = self.bounded(self.repository.begin()).await?;
        let result = self.bounded(self.repository.get_account(&scope, id)).await;
        self.close_read_scope(scope).await;
        result
    }

    pub async fn list_transactions(&self) -> Result<Vec<TransactionRecord>> {
        let scope = self.bounded(self.repository.begin()).await?;
        let result = self
            .bounded(self.repository.list_transaction_records(&scope))
            .await;
        self.close_read_scope(scope).await;
        result
    }

    async fn apply(&self, scope: &Scope, request: &TransactionRecord) -> Result<()> {
        let mut account = self
            .bounded(self.repository.get_account(scope, &request.account_id))
            .await?;

        match request.kind {
            TransactionKind::Withdraw => account.withdraw(Amount::new(request.amount)?)?,
            TransactionKind::Deposit => account.deposit(Amount::new(request.amount)?)?,
            other => return Err(BankError::InvalidTransactionType(other.to_string())),
        }
        debug!(balance = %account.balance, "validated");

        self.bounded(self.repository.update_balance(scope, &account))
            .await?;
        self.bounded(
            self.repository
                .create_transaction_records(scope, slice::from_ref(request)),
        )
        .await
    }

    /// Commits on success, otherwise rolls back and hands the cause back.
    async fn finish(&self, scope: Scope, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => self.bounded(self.repository.commit(scope)).await,
            Err(cause) => match self.bounded(self.repository.rollback(scope)).await {
                Ok(()) => Err(cause),
                Err(rollback) => {
                    warn!(error = %rollback, "rollback failed");
                    Err(BankError::RollbackFailed {
                        cause: Box::new(cause),
                        rollback: Box::new(rollback),
                    })
                }
            },
        }
    }

    async fn close_read_scope(&self, scope: Scope) {
        if let Err(err) = self.bounded(self.repository.rollback(scope)).await {
            warn!(error = %err, "failed to close read scope");
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let limit = self.config.storage_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| BankError::Timeout(limit))?
    }
}
