//! Transaction primitives: credit, debit, transfer
//!
//! Balances only move through the `apply_*` helpers below, whether the caller
//! is a plain payment, a single-shot game or a duel settlement. Strict debits
//! fail on insufficient funds; only administrative removal clamps at zero.

use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::account::UserId;
use crate::ledger::store::{LedgerStore, WorkingSet};
use crate::metrics::EngineMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: UserId,
    pub to: UserId,
    pub amount: u64,
    pub from_balance: u64,
    pub to_balance: u64,
}

/// Result of an administrative removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClampedDebit {
    pub requested: u64,
    pub removed: u64,
    pub balance: u64,
}

/// Result of a successful daily claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyClaim {
    pub reward: u64,
    pub balance: u64,
    pub next_claim_at: DateTime<Utc>,
}

/// Validate a caller-supplied amount
pub fn positive_amount(amount: i64) -> EconomyResult<u64> {
    u64::try_from(amount)
        .ok()
        .filter(|a| *a > 0)
        .ok_or(EconomyError::InvalidAmount(amount))
}

pub(crate) fn apply_credit(ws: &mut WorkingSet, id: UserId, amount: u64) -> EconomyResult<u64> {
    let account = ws.account(id)?;
    account.balance = account
        .balance
        .checked_add(amount)
        .ok_or(EconomyError::BalanceOverflow)?;
    Ok(account.balance)
}

pub(crate) fn apply_debit(ws: &mut WorkingSet, id: UserId, amount: u64) -> EconomyResult<u64> {
    let account = ws.account(id)?;
    account.balance = account
        .balance
        .checked_sub(amount)
        .ok_or(EconomyError::InsufficientFunds {
            needed: amount,
            available: account.balance,
        })?;
    Ok(account.balance)
}

pub(crate) fn apply_transfer(
    ws: &mut WorkingSet,
    from: UserId,
    to: UserId,
    amount: u64,
) -> EconomyResult<TransferReceipt> {
    if from == to {
        let balance = ws.balance(from)?;
        return Ok(TransferReceipt {
            from,
            to,
            amount,
            from_balance: balance,
            to_balance: balance,
        });
    }

    let from_balance = apply_debit(ws, from, amount)?;
    let to_balance = apply_credit(ws, to, amount)?;
    Ok(TransferReceipt {
        from,
        to,
        amount,
        from_balance,
        to_balance,
    })
}

/// Ensure `id` can cover `amount` without changing anything
pub(crate) fn require_funds(ws: &WorkingSet, id: UserId, amount: u64) -> EconomyResult<()> {
    let available = ws.balance(id)?;
    if available < amount {
        return Err(EconomyError::InsufficientFunds {
            needed: amount,
            available,
        });
    }
    Ok(())
}

/// Atomic balance operations over the shared ledger
#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<LedgerStore>,
    metrics: Arc<EngineMetrics>,
    daily_reward: u64,
    daily_cooldown: chrono::Duration,
}

impl TransactionEngine {
    pub fn new(
        store: Arc<LedgerStore>,
        metrics: Arc<EngineMetrics>,
        daily_reward: u64,
        daily_cooldown: chrono::Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            daily_reward,
            daily_cooldown,
        }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn balance(&self, id: UserId) -> u64 {
        self.store.get_or_create(id).balance
    }

    /// Add coins; returns the new balance
    pub async fn credit(&self, id: UserId, amount: i64) -> EconomyResult<u64> {
        let amount = positive_amount(amount)?;
        let balance = self
            .store
            .mutate(&[id], |ws| apply_credit(ws, id, amount))
            .await?;
        self.metrics.record_credit();
        debug!("Credited {} to {} (balance {})", amount, id, balance);
        Ok(balance)
    }

    /// Remove coins, failing if the balance does not cover them
    pub async fn debit_strict(&self, id: UserId, amount: i64) -> EconomyResult<u64> {
        let amount = positive_amount(amount)?;
        let balance = self
            .store
            .mutate(&[id], |ws| apply_debit(ws, id, amount))
            .await?;
        self.metrics.record_debit();
        debug!("Debited {} from {} (balance {})", amount, id, balance);
        Ok(balance)
    }

    /// Player-initiated debit; same as `debit_strict`
    pub async fn debit(&self, id: UserId, amount: i64) -> EconomyResult<u64> {
        self.debit_strict(id, amount).await
    }

    /// Administrative removal: takes what is there, never below zero
    pub async fn force_debit_clamped(
        &self,
        id: UserId,
        amount: i64,
    ) -> EconomyResult<ClampedDebit> {
        let requested = positive_amount(amount)?;
        let result = self
            .store
            .mutate(&[id], |ws| {
                let account = ws.account(id)?;
                let removed = requested.min(account.balance);
                account.balance -= removed;
                Ok(ClampedDebit {
                    requested,
                    removed,
                    balance: account.balance,
                })
            })
            .await?;
        self.metrics.record_debit();
        info!(
            "Admin removed {} of {} requested coins from {}",
            result.removed, requested, id
        );
        Ok(result)
    }

    /// Move coins between two accounts atomically
    ///
    /// A self-transfer is accepted and changes nothing.
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: i64,
    ) -> EconomyResult<TransferReceipt> {
        let amount = positive_amount(amount)?;
        let receipt = self
            .store
            .mutate(&[from, to], |ws| apply_transfer(ws, from, to, amount))
            .await?;
        self.metrics.record_transfer();
        debug!("Transferred {} from {} to {}", amount, from, to);
        Ok(receipt)
    }

    /// Grant the daily reward if the cooldown since the last claim has passed
    pub async fn claim_daily(&self, id: UserId, now: DateTime<Utc>) -> EconomyResult<DailyClaim> {
        let reward = self.daily_reward;
        let cooldown = self.daily_cooldown;

        let claim = self
            .store
            .mutate(&[id], |ws| {
                if let Some(last) = ws.account(id)?.last_claim {
                    let next = last + cooldown;
                    if now < next {
                        return Err(EconomyError::ClaimCooldown {
                            remaining_secs: (next - now).num_seconds(),
                        });
                    }
                }
                let balance = apply_credit(ws, id, reward)?;
                ws.account(id)?.last_claim = Some(now);
                Ok(DailyClaim {
                    reward,
                    balance,
                    next_claim_at: now + cooldown,
                })
            })
            .await?;

        self.metrics.record_credit();
        info!("User {} claimed daily reward of {}", id, reward);
        Ok(claim)
    }

    /// Richest accounts first; ties broken by ascending ID
    pub fn leaderboard(&self, limit: usize) -> Vec<(UserId, u64)> {
        let mut rows: Vec<(UserId, u64)> = self
            .store
            .snapshot()
            .into_iter()
            .map(|(id, account)| (id, account.balance))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        rows.truncate(limit);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use chrono::TimeZone;

    async fn engine() -> TransactionEngine {
        let metrics = Arc::new(EngineMetrics::new());
        let store = LedgerStore::open(Arc::new(MemoryBackend::new()), metrics.clone())
            .await
            .expect("open ledger");
        TransactionEngine::new(Arc::new(store), metrics, 100, chrono::Duration::hours(24))
    }

    #[test]
    fn test_positive_amount() {
        assert_eq!(positive_amount(5).unwrap(), 5);
        assert!(matches!(positive_amount(0), Err(EconomyError::InvalidAmount(0))));
        assert!(matches!(positive_amount(-3), Err(EconomyError::InvalidAmount(-3))));
    }

    #[tokio::test]
    async fn test_credit_and_strict_debit() {
        let engine = engine().await;
        let alice = UserId(1);

        assert_eq!(engine.credit(alice, 50).await.unwrap(), 50);
        assert_eq!(engine.debit(alice, 20).await.unwrap(), 30);

        match engine.debit_strict(alice, 31).await {
            Err(EconomyError::InsufficientFunds { needed, available }) => {
                assert_eq!(needed, 31);
                assert_eq!(available, 30);
            }
            other => panic!("Expected insufficient funds, got {:?}", other),
        }
        assert_eq!(engine.balance(alice), 30);
    }

    #[tokio::test]
    async fn test_forced_removal_clamps_at_zero() {
        let engine = engine().await;
        let bob = UserId(2);
        engine.credit(bob, 40).await.unwrap();

        let removed = engine.force_debit_clamped(bob, 100).await.unwrap();
        assert_eq!(
            removed,
            ClampedDebit {
                requested: 100,
                removed: 40,
                balance: 0
            }
        );
    }

    #[tokio::test]
    async fn test_transfer_conserves_coins() {
        let engine = engine().await;
        let (a, b) = (UserId(1), UserId(2));
        engine.credit(a, 100).await.unwrap();
        engine.credit(b, 10).await.unwrap();

        let receipt = engine.transfer(a, b, 60).await.unwrap();
        assert_eq!(receipt.from_balance, 40);
        assert_eq!(receipt.to_balance, 70);
        assert_eq!(engine.balance(a) + engine.balance(b), 110);

        assert!(matches!(
            engine.transfer(a, b, 41).await,
            Err(EconomyError::InsufficientFunds { .. })
        ));
        assert_eq!(engine.balance(a), 40);
        assert_eq!(engine.balance(b), 70);
    }

    #[tokio::test]
    async fn test_self_transfer_is_noop() {
        let engine = engine().await;
        let a = UserId(1);
        engine.credit(a, 5).await.unwrap();

        let receipt = engine.transfer(a, a, 500).await.unwrap();
        assert_eq!(receipt.from_balance, 5);
        assert_eq!(engine.balance(a), 5);
        assert!(matches!(engine.transfer(a, a, 0).await, Err(EconomyError::InvalidAmount(0))));
    }

    #[tokio::test]
    async fn test_daily_claim_cooldown() {
        let engine = engine().await;
        let user = UserId(9);
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

        let claim = engine.claim_daily(user, start).await.unwrap();
        assert_eq!(claim.balance, 100);

        let later = start + chrono::Duration::hours(23);
        match engine.claim_daily(user, later).await {
            Err(EconomyError::ClaimCooldown { remaining_secs }) => assert_eq!(remaining_secs, 3600),
            other => panic!("Expected cooldown, got {:?}", other),
        }

        let next_day = start + chrono::Duration::hours(24);
        assert_eq!(engine.claim_daily(user, next_day).await.unwrap().balance, 200);
    }

    #[tokio::test]
    async fn test_leaderboard_ordering() {
        let engine = engine().await;
        engine.credit(UserId(3), 10).await.unwrap();
        engine.credit(UserId(1), 30).await.unwrap();
        engine.credit(UserId(2), 30).await.unwrap();

        assert_eq!(
            engine.leaderboard(2),
            vec![(UserId(1), 30), (UserId(2), 30)]
        );
    }
}
