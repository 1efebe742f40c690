//! Game resolvers
//!
//! Pure outcome logic lives in one module per game; `GameProcessor` applies
//! the outcomes to the ledger.

pub mod coinflip;
pub mod processor;
pub mod random;
pub mod rarity;
pub mod roulette;
pub mod rps;
pub mod sampling;

pub use coinflip::{CoinFlipOutcome, CoinSide};
pub use processor::{CoinFlipPlay, FishCatch, FishingCast, GameProcessor, RoulettePlay};
pub use random::{RandomSource, RngSource, SequenceRandom};
pub use rarity::{DrawnItem, RarityTable, RarityTier};
pub use roulette::{RouletteColor, RouletteSpin};
pub use rps::{Move, Showdown};
pub use sampling::WeightedTable;
