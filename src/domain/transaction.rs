use super::account::AccountId;
use crate::error::BankError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum TransactionKind {
    InitialBalance,
    Deposit,
    Withdraw,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::InitialBalance => "initial_balance",
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_balance" => Ok(TransactionKind::InitialBalance),
            "deposit" => Ok(TransactionKind::Deposit),
            "withdraw" => Ok(TransactionKind::Withdraw),
            other => Err(BankError::InvalidTransactionType(other.to_string())),
        }
    }
}

impl TryFrom<String> for TransactionKind {
    type Error = BankError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Append-only ledger entry documenting one balance-affecting event.
///
/// The same shape doubles as the request submitted to
/// `BankService::create_transaction`: the record is persisted verbatim once
/// the balance change it describes is accepted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionRecord {
    pub id: String,
    #[serde(rename = "account")]
    pub account_id: AccountId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
}

impl TransactionRecord {
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<AccountId>,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            account_id: account_id.into(),
            kind,
            amount,
        }
    }
}
