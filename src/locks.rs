//! Per account mutual exclusion for read-modify-write of account records

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock table keyed by account number. Entries are created on first use and live as long as the
/// table.
#[derive(Debug, Default)]
pub struct AccountLocks {
    table: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held lock of one account, released on drop
pub type AccountGuard = OwnedMutexGuard<()>;

impl AccountLocks {
    fn entry(&self, account_number: &str) -> Arc<AsyncMutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table
            .entry(account_number.to_owned())
            .or_default()
            .clone()
    }

    /// Wait for exclusive access to `account_number`
    pub async fn lock(&self, account_number: &str) -> AccountGuard {
        self.entry(account_number).lock_owned().await
    }

    /// Lock every distinct account in ascending account number order, so two callers locking
    /// overlapping sets can not deadlock.
    pub async fn lock_many(&self, account_numbers: &[&str]) -> Vec<AccountGuard> {
        let mut ordered = account_numbers.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for account_number in ordered {
            guards.push(self.lock(account_number).await);
        }
        guards
    }
}
