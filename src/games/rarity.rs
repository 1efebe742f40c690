//! Rarity tiers and the fishing item table

use crate::config::RarityTierConfig;
use crate::errors::{ConfigurationError, EconomyResult};
use crate::games::random::RandomSource;
use crate::games::sampling::WeightedTable;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Item rarity, in declared (most to least common) order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RarityTier {
    #[serde(alias = "common")]
    Common,
    #[serde(alias = "uncommon")]
    Uncommon,
    #[serde(alias = "rare")]
    Rare,
    #[serde(alias = "epic")]
    Epic,
    #[serde(alias = "legendary")]
    Legendary,
}

impl RarityTier {
    pub const ALL: [RarityTier; 5] = [
        RarityTier::Common,
        RarityTier::Uncommon,
        RarityTier::Rare,
        RarityTier::Epic,
        RarityTier::Legendary,
    ];
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RarityTier::Common => write!(f, "Common"),
            RarityTier::Uncommon => write!(f, "Uncommon"),
            RarityTier::Rare => write!(f, "Rare"),
            RarityTier::Epic => write!(f, "Epic"),
            RarityTier::Legendary => write!(f, "Legendary"),
        }
    }
}

/// Item picked by a weighted draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawnItem {
    pub name: String,
    pub tier: RarityTier,
    pub roll: u32,
    /// True when the roll fell past the table and the fallback tier was used
    pub fallback: bool,
}

/// Weighted tiers with their item names
#[derive(Debug, Clone, PartialEq)]
pub struct RarityTable {
    weights: WeightedTable<RarityTier>,
    items: BTreeMap<RarityTier, Vec<String>>,
    fallback: RarityTier,
}

pub const FALLBACK_TIER: RarityTier = RarityTier::Common;

static STANDARD_TABLE: Lazy<RarityTable> = Lazy::new(|| {
    let tier = |tier, weight, items: &[&str]| RarityTierConfig {
        tier,
        weight,
        items: items.iter().map(|s| s.to_string()).collect(),
    };
    RarityTable::build(vec![
        tier(RarityTier::Common, 60, &["Minnow", "Bluegill", "Carp"]),
        tier(RarityTier::Uncommon, 25, &["Trout", "Bass"]),
        tier(RarityTier::Rare, 10, &["Pike", "Catfish"]),
        tier(RarityTier::Epic, 4, &["Golden Koi", "Electric Eel"]),
        tier(RarityTier::Legendary, 1, &["Ancient Leviathan"]),
    ])
});

impl RarityTable {
    /// The built-in fishing table (60/25/10/4/1)
    pub fn standard() -> &'static RarityTable {
        &STANDARD_TABLE
    }

    /// Build a table from configured tiers
    ///
    /// Weights that do not sum to 100 are accepted with a warning: rolls past
    /// the last bound land in the fallback tier instead of failing. A tier
    /// that can be selected must name at least one item, and the fallback
    /// tier must be present.
    pub fn new(tiers: Vec<RarityTierConfig>) -> EconomyResult<Self> {
        if let Some(empty) = tiers.iter().find(|t| t.weight > 0 && t.items.is_empty()) {
            return Err(ConfigurationError::EmptyTier(empty.tier.to_string()).into());
        }
        if !tiers.iter().any(|t| t.tier == FALLBACK_TIER && !t.items.is_empty()) {
            return Err(ConfigurationError::EmptyTier(FALLBACK_TIER.to_string()).into());
        }

        let table = Self::build(tiers);
        let total = table.weights.total_weight();
        if total != 100 {
            warn!(
                "Rarity weights sum to {} instead of 100; out-of-range rolls fall back to {}",
                total, table.fallback
            );
        }
        Ok(table)
    }

    fn build(mut tiers: Vec<RarityTierConfig>) -> Self {
        tiers.sort_by_key(|t| t.tier);
        let weights = WeightedTable::new(tiers.iter().map(|t| (t.tier, t.weight)).collect());
        let items = tiers.into_iter().map(|t| (t.tier, t.items)).collect();
        Self {
            weights,
            items,
            fallback: FALLBACK_TIER,
        }
    }

    /// Strict check used when loading configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let total = self.weights.total_weight();
        if total != 100 {
            return Err(ConfigurationError::RarityWeights { total });
        }
        Ok(())
    }

    pub fn items(&self, tier: RarityTier) -> &[String] {
        self.items.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tier for a roll in `1..=100`, and whether the fallback was used
    pub fn tier_for_roll(&self, roll: u32) -> (RarityTier, bool) {
        match self.weights.select(roll) {
            Some(tier) => (*tier, false),
            None => {
                warn!(
                    "Roll {} is beyond the rarity table; using fallback tier {}",
                    roll, self.fallback
                );
                (self.fallback, true)
            }
        }
    }

    /// Roll `1..=100`, pick the tier, then pick uniformly among its items
    pub fn draw(&self, rng: &mut dyn RandomSource) -> DrawnItem {
        let roll = rng.roll(1, 100);
        let (mut tier, mut fallback) = self.tier_for_roll(roll);

        if self.items(tier).is_empty() {
            tier = self.fallback;
            fallback = true;
        }

        let names = self.items(tier);
        let name = rng
            .pick_index(names.len())
            .and_then(|i| names.get(i))
            .cloned()
            .unwrap_or_default();

        DrawnItem {
            name,
            tier,
            roll,
            fallback,
        }
    }
}
