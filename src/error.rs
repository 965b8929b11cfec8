use crate::domain::ports::IsolationLevel;
use thiserror::Error;

/// Classification of every failure the service can return.
///
/// Callers branch on this instead of matching individual variants: the
/// business rejections leave state untouched, `PersistenceFailure` means the
/// enclosing scope was (or was attempted to be) rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AccountLocked,
    InsufficientBalance,
    InvalidTransactionAmount,
    InvalidTransactionType,
    NotFound,
    PersistenceFailure,
}

#[derive(Error, Debug)]
pub enum BankError {
    #[error("account {0} is locked by another transaction")]
    AccountLocked(String),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("invalid transaction amount")]
    InvalidTransactionAmount,
    #[error("deposit would overflow the balance of account {0}")]
    BalanceOverflow(String),
    #[error("invalid transaction type: {0}")]
    InvalidTransactionType(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: &'static str, id: String },
    #[error("account {0} was modified by a concurrent transaction")]
    Conflict(String),
    #[error("transaction scope {0} is closed")]
    ScopeClosed(u64),
    #[error("storage call exceeded {0:?}")]
    Timeout(std::time::Duration),
    #[error("store isolation {0:?} is weaker than read-committed")]
    UnsupportedIsolation(IsolationLevel),
    #[error("rollback failed ({rollback}) after: {cause}")]
    RollbackFailed {
        cause: Box<BankError>,
        rollback: Box<BankError>,
    },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for BankError {
    fn from(err: rocksdb::Error) -> Self {
        BankError::Internal(Box::new(err))
    }
}

impl From<serde_json::Error> for BankError {
    fn from(err: serde_json::Error) -> Self {
        BankError::Internal(Box::new(err))
    }
}

impl BankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::AccountLocked(_) => ErrorKind::AccountLocked,
            BankError::InsufficientBalance => ErrorKind::InsufficientBalance,
            BankError::InvalidTransactionAmount | BankError::BalanceOverflow(_) => {
                ErrorKind::InvalidTransactionAmount
            }
            BankError::InvalidTransactionType(_) => ErrorKind::InvalidTransactionType,
            BankError::NotFound { .. } => ErrorKind::NotFound,
            BankError::RollbackFailed { cause, .. } => cause.kind(),
            _ => ErrorKind::PersistenceFailure,
        }
    }

    /// Whether the same request may succeed if resubmitted unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BankError::AccountLocked(_) | BankError::Conflict(_) | BankError::Timeout(_)
        )
    }

    pub(crate) fn account_not_found(id: &str) -> Self {
        BankError::NotFound {
            entity: "account",
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
