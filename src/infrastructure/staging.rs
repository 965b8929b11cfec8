//! Commit-time checks shared by the buffered store backends.

use crate::domain::scope::{RowOrigin, StagedWrites};
use crate::error::{BankError, Result};

/// Decides whether `staged` may be applied on top of committed state.
///
/// Must run under the same exclusion as the apply step that follows it.
/// Account ids created by the scope must still be free, updated rows must be
/// at the version the scope based its write on, record ids must be unused and
/// every record must reference an account that exists after the apply.
pub(crate) fn validate_commit<V, R>(
    staged: &StagedWrites,
    committed_version: V,
    record_exists: R,
) -> Result<()>
where
    V: Fn(&str) -> Result<Option<u64>>,
    R: Fn(&str) -> Result<bool>,
{
    for (id, row) in &staged.accounts {
        let current = committed_version(id)?;
        match (row.origin, current) {
            (RowOrigin::Created, Some(_)) => {
                return Err(BankError::AlreadyExists {
                    entity: "account",
                    id: id.clone(),
                });
            }
            (RowOrigin::Updated { base_version }, Some(version)) if version != base_version => {
                return Err(BankError::Conflict(id.clone()));
            }
            (RowOrigin::Updated { .. }, None) => return Err(BankError::Conflict(id.clone())),
            _ => {}
        }
    }

    for record in &staged.records {
        if record_exists(&record.id)? {
            return Err(BankError::AlreadyExists {
                entity: "transaction",
                id: record.id.clone(),
            });
        }
        if !staged.accounts.contains_key(&record.account_id)
            && committed_version(&record.account_id)?.is_none()
        {
            return Err(BankError::account_not_found(&record.account_id));
        }
    }
    Ok(())
}
