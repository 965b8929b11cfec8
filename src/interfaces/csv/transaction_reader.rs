use crate::domain::transaction::TransactionRecord;
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// Row as it appears in the file; `type` is parsed separately so an unknown
/// kind surfaces as `InvalidTransactionType` rather than a CSV error.
#[derive(Debug, Deserialize)]
struct RequestRow {
    id: String,
    account: String,
    #[serde(rename = "type")]
    kind: String,
    amount: Decimal,
}

impl TryFrom<RequestRow> for TransactionRecord {
    type Error = BankError;

    fn try_from(row: RequestRow) -> Result<Self> {
        Ok(TransactionRecord::new(
            row.id,
            row.account,
            row.kind.parse()?,
            row.amount,
        ))
    }
}

/// Reads transaction requests (`id, account, type, amount`) from a CSV source.
///
/// This reader wraps `csv::Reader` and provides an iterator over `Result<TransactionRecord>`.
/// It handles whitespace trimming automatically.
pub struct TransactionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TransactionReader<R> {
    /// Creates a new `TransactionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    ///
    /// A malformed row yields an error for that row only; iteration continues.
    pub fn transactions(self) -> impl Iterator<Item = Result<TransactionRecord>> {
        self.reader
            .into_deserialize::<RequestRow>()
            .map(|result| -> Result<TransactionRecord> { TransactionRecord::try_from(result?) })
    }
}
