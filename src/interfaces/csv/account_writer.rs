use crate::domain::account::Account;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    id: &'a str,
    name: &'a str,
    balance: String,
}

/// Writes final account state as CSV (`id,name,balance`).
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header and one row per account, then flushes.
    pub fn write_accounts<'a, I>(&mut self, accounts: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Account>,
    {
        for account in accounts {
            self.writer.serialize(AccountRow {
                id: &account.id,
                name: &account.name,
                balance: account.balance.to_string(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
