use crate::config::{invalid, GamesConfig};
use crate::errors::{EconomyError, EconomyResult};
use crate::games::coinflip::{self, CoinFlipOutcome, CoinSide};
use crate::games::random::RandomSource;
use crate::games::rarity::{DrawnItem, RarityTable, RarityTier};
use crate::games::roulette::{self, RouletteSpin};
use crate::ledger::transactions::{apply_credit, apply_debit, positive_amount, require_funds};
use crate::ledger::{CaughtItem, LedgerStore, UserId};
use crate::metrics::EngineMetrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Settled coin flip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoinFlipPlay {
    pub user: UserId,
    pub bet: u64,
    pub outcome: CoinFlipOutcome,
    pub balance: u64,
}

/// Settled roulette spin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoulettePlay {
    pub user: UserId,
    pub bet: u64,
    pub spin: RouletteSpin,
    /// Coins credited on a hit, zero on a miss
    pub winnings: u64,
    pub balance: u64,
}

/// Item added to a user's inventory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FishCatch {
    pub user: UserId,
    pub item: DrawnItem,
    pub inventory_size: usize,
}

/// An open fishing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FishingCast {
    pub user: UserId,
    pub bite_at: Instant,
    pub closes_at: Instant,
}

impl FishingCast {
    pub async fn wait_for_bite(&self) {
        tokio::time::sleep_until(self.bite_at).await;
    }
}

/// Resolves single-shot games and applies their payouts to the ledger
pub struct GameProcessor {
    store: Arc<LedgerStore>,
    metrics: Arc<EngineMetrics>,
    rng: Mutex<Box<dyn RandomSource>>,
    rarity: RarityTable,
    roulette_multiplier: u64,
    bite_delay_secs: (u32, u32),
    catch_window: Duration,
    casts: DashMap<UserId, FishingCast>,
}

impl GameProcessor {
    pub fn new(
        store: Arc<LedgerStore>,
        metrics: Arc<EngineMetrics>,
        config: &GamesConfig,
        rarity: RarityTable,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            metrics,
            rng: Mutex::new(rng),
            rarity,
            roulette_multiplier: config.roulette_multiplier,
            bite_delay_secs: (
                saturating_secs(config.fishing_bite_min_secs),
                saturating_secs(config.fishing_bite_max_secs),
            ),
            catch_window: Duration::from_secs(config.fishing_catch_window_secs),
            casts: DashMap::new(),
        }
    }

    fn rng(&self) -> MutexGuard<'_, Box<dyn RandomSource>> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bet on heads or tails: win `bet` on a match, lose it otherwise
    pub async fn resolve_coin_flip(
        &self,
        user: UserId,
        call: CoinSide,
        bet: i64,
    ) -> EconomyResult<CoinFlipPlay> {
        let bet = positive_amount(bet)?;

        let play = self
            .store
            .mutate(&[user], |ws| {
                require_funds(ws, user, bet)?;
                let outcome = coinflip::flip(call, &mut **self.rng());
                let balance = if outcome.won {
                    apply_credit(ws, user, bet)?
                } else {
                    apply_debit(ws, user, bet)?
                };
                Ok(CoinFlipPlay {
                    user,
                    bet,
                    outcome,
                    balance,
                })
            })
            .await?;

        self.metrics.record_game();
        debug!(
            "Coin flip for {}: called {}, drew {}, balance {}",
            user, call, play.outcome.draw, play.balance
        );
        Ok(play)
    }

    /// Straight-up roulette bet on `number` in `0..=36`
    pub async fn resolve_roulette(
        &self,
        user: UserId,
        number: i64,
        bet: i64,
    ) -> EconomyResult<RoulettePlay> {
        let number = roulette::validate_pocket(number)?;
        let bet = positive_amount(bet)?;
        let multiplier = self.roulette_multiplier;

        let play = self
            .store
            .mutate(&[user], |ws| {
                require_funds(ws, user, bet)?;
                let spin = roulette::spin(number, &mut **self.rng());
                let (winnings, balance) = if spin.won {
                    let winnings = bet
                        .checked_mul(multiplier)
                        .ok_or(EconomyError::BalanceOverflow)?;
                    (winnings, apply_credit(ws, user, winnings)?)
                } else {
                    (0, apply_debit(ws, user, bet)?)
                };
                Ok(RoulettePlay {
                    user,
                    bet,
                    spin,
                    winnings,
                    balance,
                })
            })
            .await?;

        self.metrics.record_game();
        debug!(
            "Roulette for {}: picked {}, ball landed on {} {}",
            user, number, play.spin.result, play.spin.color
        );
        Ok(play)
    }

    /// Weighted draw from the rarity table, appended to the user's inventory
    pub async fn draw_item(&self, user: UserId) -> EconomyResult<FishCatch> {
        let catch = self
            .store
            .mutate(&[user], |ws| {
                let item = self.rarity.draw(&mut **self.rng());
                let account = ws.account(user)?;
                account.inventory.push(CaughtItem {
                    name: item.name.clone(),
                    tier: item.tier,
                });
                Ok(FishCatch {
                    user,
                    inventory_size: account.inventory.len(),
                    item,
                })
            })
            .await?;

        self.metrics.record_catch();
        info!("User {} caught {} ({})", user, catch.item.name, catch.item.tier);
        Ok(catch)
    }

    /// Open a fishing session; the fish bites after a random delay
    pub fn cast_line(&self, user: UserId) -> EconomyResult<FishingCast> {
        let now = Instant::now();
        let entry = self.casts.entry(user);
        if let Entry::Occupied(open) = &entry {
            if open.get().closes_at >= now {
                return Err(EconomyError::CastNotReady {
                    user,
                    reason: "a line is already in the water",
                });
            }
        }

        let (min, max) = self.bite_delay_secs;
        let delay = self.rng().roll(min, max);
        let cast = now
            .checked_add(Duration::from_secs(u64::from(delay)))
            .and_then(|bite_at| {
                Some(FishingCast {
                    user,
                    bite_at,
                    closes_at: bite_at.checked_add(self.catch_window)?,
                })
            })
            .ok_or_else(|| {
                invalid(
                    "games.fishing_catch_window_secs",
                    &self.catch_window.as_secs().to_string(),
                    "Fishing deadline is out of range",
                )
            })?;

        match entry {
            Entry::Occupied(mut open) => {
                open.insert(cast);
            }
            Entry::Vacant(slot) => {
                slot.insert(cast);
            }
        }

        debug!("User {} cast a line; bite in {}s", user, delay);
        Ok(cast)
    }

    /// Reel in during the catch window; each cast yields at most one item
    pub async fn catch(&self, user: UserId) -> EconomyResult<FishCatch> {
        let now = Instant::now();
        let cast = self
            .casts
            .get(&user)
            .map(|c| *c)
            .ok_or(EconomyError::NoActiveCast(user))?;

        if now < cast.bite_at {
            return Err(EconomyError::CastNotReady {
                user,
                reason: "nothing is biting yet",
            });
        }

        if now > cast.closes_at {
            self.casts.remove_if(&user, |_, c| *c == cast);
            return Err(EconomyError::CastNotReady {
                user,
                reason: "the fish got away",
            });
        }

        if self.casts.remove_if(&user, |_, c| *c == cast).is_none() {
            return Err(EconomyError::NoActiveCast(user));
        }

        self.draw_item(user).await
    }

    /// Caught item names grouped by tier
    pub fn inventory(&self, user: UserId) -> Vec<(RarityTier, Vec<String>)> {
        self.store.get_or_create(user).inventory_by_rarity()
    }
}

fn saturating_secs(secs: u64) -> u32 {
    u32::try_from(secs).unwrap_or(u32::MAX)
}
