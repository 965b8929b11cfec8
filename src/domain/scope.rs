//! Transaction scope handle shared by every store backend.
//!
//! A [`Scope`] is the unit of atomic work: repository writes are staged in it
//! and only become visible to other scopes when the issuing store commits it.
//! Commit and rollback consume the scope, and dropping one without either
//! discards its staged writes.

use super::account::{Account, AccountId};
use super::transaction::TransactionRecord;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub type ScopeId = u64;

/// How a staged account row relates to committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// Inserted by this scope; must not exist at commit.
    Created,
    /// Overwrites a committed row that had `base_version` when first touched.
    Updated { base_version: u64 },
}

#[derive(Debug, Clone)]
pub struct StagedAccount {
    pub account: Account,
    pub origin: RowOrigin,
}

/// Writes buffered by an open scope, plus the row versions it observed.
#[derive(Debug, Default)]
pub struct StagedWrites {
    pub accounts: HashMap<AccountId, StagedAccount>,
    pub read_versions: HashMap<AccountId, u64>,
    pub records: Vec<TransactionRecord>,
}

impl StagedWrites {
    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id).map(|staged| &staged.account)
    }

    pub fn has_record(&self, id: &str) -> bool {
        self.records.iter().any(|record| record.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.records.is_empty()
    }
}

/// Tracks which scopes a store has issued and not yet closed.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    next_id: AtomicU64,
    open: DashMap<ScopeId, Instant>,
}

impl ScopeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(self: &Arc<Self>) -> Scope {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.open.insert(id, Instant::now());
        Scope {
            id,
            registry: Arc::clone(self),
            staged: Mutex::new(StagedWrites::default()),
        }
    }

    pub fn is_open(&self, id: ScopeId) -> bool {
        self.open.contains_key(&id)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn close(&self, id: ScopeId) {
        self.open.remove(&id);
    }
}

/// An open transaction scope. Single use: consumed by commit or rollback.
#[derive(Debug)]
pub struct Scope {
    id: ScopeId,
    registry: Arc<ScopeRegistry>,
    staged: Mutex<StagedWrites>,
}

impl Scope {
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// True when `registry` issued this scope and it is still open.
    pub fn is_issued_by(&self, registry: &Arc<ScopeRegistry>) -> bool {
        Arc::ptr_eq(&self.registry, registry) && registry.is_open(self.id)
    }

    pub fn staged(&self) -> MutexGuard<'_, StagedWrites> {
        self.staged.lock()
    }

    /// Closes the scope and hands back everything it staged.
    pub fn into_staged(self) -> StagedWrites {
        std::mem::take(&mut *self.staged.lock())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        self.registry.close(self.id);
    }
}
