use crate::domain::ports::AccountLocker;
use crate::error::Result;
use tracing::warn;

/// Holds an account lock until dropped.
///
/// Release runs on every exit path of the scope owning the guard, including
/// early returns through `?` and a cancelled future. A failed release is
/// logged and never replaces the caller's own result.
pub struct LockGuard<'a> {
    locker: &'a dyn AccountLocker,
    account_id: &'a str,
}

impl<'a> LockGuard<'a> {
    pub fn acquire(locker: &'a dyn AccountLocker, account_id: &'a str) -> Result<Self> {
        locker.acquire(account_id)?;
        Ok(Self { locker, account_id })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.locker.release(self.account_id) {
            warn!(account = self.account_id, error = %err, "failed to release account lock");
        }
    }
}
