//! Ledger store with a per-user lock table
//!
//! Account data lives in a concurrent map that is only ever touched
//! synchronously. Read-modify-write-persist sequences go through `mutate`,
//! which holds the async lock of every involved user for the whole sequence.
//! Locks are taken in ascending `UserId` order so two opposite transfers
//! cannot deadlock.

use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::account::{Account, UserId};
use crate::metrics::EngineMetrics;
use crate::storage::{decode_accounts, encode_accounts, PersistenceBackend};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Copies of the locked accounts, handed to a `mutate` closure
#[derive(Debug)]
pub struct WorkingSet {
    accounts: BTreeMap<UserId, Account>,
}

impl WorkingSet {
    /// Mutable access to an account locked by the enclosing transaction
    pub fn account(&mut self, id: UserId) -> EconomyResult<&mut Account> {
        self.accounts.get_mut(&id).ok_or_else(|| not_locked(id))
    }

    pub fn balance(&self, id: UserId) -> EconomyResult<u64> {
        self.accounts
            .get(&id)
            .map(|a| a.balance)
            .ok_or_else(|| not_locked(id))
    }
}

fn not_locked(id: UserId) -> EconomyError {
    EconomyError::Internal(format!("account {} is not locked in this transaction", id))
}

/// Authoritative in-process ledger backed by a persistence store
pub struct LedgerStore {
    accounts: DashMap<UserId, Account>,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
    backend: Arc<dyn PersistenceBackend>,
    flush_lock: Mutex<()>,
    metrics: Arc<EngineMetrics>,
}

impl LedgerStore {
    /// Load every account from the backend
    pub async fn open(
        backend: Arc<dyn PersistenceBackend>,
        metrics: Arc<EngineMetrics>,
    ) -> EconomyResult<Self> {
        let mapping = backend.load().await?;
        let accounts: DashMap<UserId, Account> = decode_accounts(mapping).into_iter().collect();
        info!("Ledger opened with {} accounts", accounts.len());

        Ok(Self {
            accounts,
            locks: DashMap::new(),
            backend,
            flush_lock: Mutex::new(()),
            metrics,
        })
    }

    /// Current record for `id`, creating an empty account on first access
    pub fn get_or_create(&self, id: UserId) -> Account {
        self.accounts.entry(id).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Point-in-time copy of all accounts, ordered by ID
    ///
    /// Not atomic across users; use it for display only.
    pub fn snapshot(&self) -> BTreeMap<UserId, Account> {
        self.accounts
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Run `f` against the accounts of `ids` as one atomic unit
    ///
    /// If `f` changes anything, the new state is flushed to the backend before
    /// it becomes visible; a failed flush leaves the ledger untouched.
    pub async fn mutate<T, F>(&self, ids: &[UserId], f: F) -> EconomyResult<T>
    where
        F: FnOnce(&mut WorkingSet) -> EconomyResult<T>,
    {
        let (keys, _guards) = self.lock_keys(ids).await;

        let before: BTreeMap<UserId, Account> = keys
            .iter()
            .map(|id| (*id, self.get_or_create(*id)))
            .collect();
        let mut working = WorkingSet {
            accounts: before.clone(),
        };

        let value = f(&mut working)?;

        if working.accounts == before {
            return Ok(value);
        }

        self.commit(working.accounts).await?;
        Ok(value)
    }

    async fn lock_keys(&self, ids: &[UserId]) -> (Vec<UserId>, Vec<OwnedMutexGuard<()>>) {
        let mut keys = ids.to_vec();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for id in &keys {
            let lock = self.locks.entry(*id).or_default().clone();
            guards.push(lock.lock_owned().await);
        }

        (keys, guards)
    }

    /// Save `changes` overlaid on the current ledger, then publish them
    async fn commit(&self, changes: BTreeMap<UserId, Account>) -> EconomyResult<()> {
        let _flush = self.flush_lock.lock().await;

        let mut next = self.snapshot();
        next.extend(changes.iter().map(|(id, account)| (*id, account.clone())));
        let mapping = encode_accounts(&next);

        if let Err(e) = self.backend.save(&mapping).await {
            self.metrics.record_flush_failure();
            warn!(
                "Ledger flush failed, discarding {} pending account changes: {}",
                changes.len(),
                e
            );
            return Err(e.into());
        }

        for (id, account) in changes {
            self.accounts.insert(id, account);
        }
        self.metrics.record_flush();
        debug!("Ledger flushed ({} accounts)", mapping.len());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    async fn store_with(backend: Arc<MemoryBackend>) -> LedgerStore {
        LedgerStore::open(backend, Arc::new(EngineMetrics::new()))
            .await
            .expect("open ledger")
    }

    #[tokio::test]
    async fn test_get_or_create_is_lazy_and_zeroed() {
        let store = store_with(Arc::new(MemoryBackend::new())).await;
        assert!(store.is_empty());
        assert_eq!(store.get_or_create(UserId(5)), Account::default());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_open_loads_existing_accounts() {
        let mut mapping = crate::storage::StoreMapping::new();
        mapping.insert("12".into(), serde_json::json!({ "coins": 30 }));
        let store = store_with(Arc::new(MemoryBackend::with_mapping(mapping))).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get_or_create(UserId(12)), Account::with_balance(30));
    }

    #[tokio::test]
    async fn test_mutate_persists_before_publishing() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;

        store
            .mutate(&[UserId(1)], |ws| {
                ws.account(UserId(1))?.balance = 75;
                Ok(())
            })
            .await
            .expect("mutate");

        assert_eq!(store.get_or_create(UserId(1)).balance, 75);
        assert_eq!(backend.contents()["1"]["coins"], 75);
    }

    #[tokio::test]
    async fn test_failed_flush_leaves_ledger_untouched() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;
        backend.set_fail_writes(true);

        let result = store
            .mutate(&[UserId(1)], |ws| {
                ws.account(UserId(1))?.balance = 10;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(EconomyError::Storage(_))));
        assert_eq!(store.get_or_create(UserId(1)).balance, 0);
    }

    #[tokio::test]
    async fn test_unchanged_mutation_skips_flush() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_with(backend.clone()).await;

        store.mutate(&[UserId(1)], |ws| ws.balance(UserId(1))).await.expect("read");
        assert_eq!(backend.save_count(), 0);
    }

    #[tokio::test]
    async fn test_unlocked_account_is_refused() {
        let store = store_with(Arc::new(MemoryBackend::new())).await;
        let result = store.mutate(&[UserId(1)], |ws| ws.account(UserId(2)).map(|_| ())).await;
        assert!(matches!(result, Err(EconomyError::Internal(_))));
    }
}
