use crate::domain::account::AccountId;
use crate::domain::ports::AccountLocker;
use crate::error::{BankError, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

/// In-process set of accounts with an in-flight transaction.
///
/// Backed by a sharded `DashMap`, so callers on different accounts rarely
/// touch the same shard and never wait on each other for long. One registry is
/// built per process and handed to the service; there is no global instance.
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: DashMap<AccountId, ()>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, account_id: &str) -> bool {
        self.held.contains_key(account_id)
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

impl AccountLocker for LockRegistry {
    fn acquire(&self, account_id: &str) -> Result<()> {
        // Check and insert under the same shard guard.
        match self.held.entry(account_id.to_string()) {
            Entry::Occupied(_) => Err(BankError::AccountLocked(account_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                debug!(account = account_id, "account lock acquired");
                Ok(())
            }
        }
    }

    fn release(&self, account_id: &str) -> Result<()> {
        if self.held.remove(account_id).is_some() {
            debug!(account = account_id, "account lock released");
        }
        Ok(())
    }
}
