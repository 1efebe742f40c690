use crate::games::rarity::RarityTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, stable identifier of a chat user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(UserId)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        UserId(id)
    }
}

/// One caught item in a user's inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaughtItem {
    pub name: String,
    #[serde(rename = "rarity")]
    pub tier: RarityTier,
}

/// Per-user balance and inventory record
///
/// `balance` is unsigned so a negative balance is unrepresentable; every path
/// that lowers it goes through the ledger's debit helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: u64,
    pub last_claim: Option<DateTime<Utc>>,
    pub inventory: Vec<CaughtItem>,
}

impl Account {
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Caught item names grouped by tier, in declared tier order, empty tiers omitted
    pub fn inventory_by_rarity(&self) -> Vec<(RarityTier, Vec<String>)> {
        RarityTier::ALL
            .iter()
            .filter_map(|tier| {
                let names: Vec<String> = self
                    .inventory
                    .iter()
                    .filter(|item| item.tier == *tier)
                    .map(|item| item.name.clone())
                    .collect();
                (!names.is_empty()).then_some((*tier, names))
            })
            .collect()
    }
}
