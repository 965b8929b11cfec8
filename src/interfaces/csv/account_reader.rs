use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of the accounts seed file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AccountSeed {
    pub id: String,
    pub name: String,
    pub balance: Decimal,
}

impl AccountSeed {
    /// Id of the `initial_balance` ledger entry written for this seed.
    pub fn initial_record_id(&self) -> String {
        format!("INIT-{}", self.id)
    }
}

/// Reads account seeds (`id, name, balance`) from a CSV source.
pub struct AccountReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AccountReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn accounts(self) -> impl Iterator<Item = Result<AccountSeed>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BankError::from))
    }
}
