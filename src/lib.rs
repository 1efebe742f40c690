//! Coinpurse - virtual-currency ledger and wagering minigames
//!
//! A per-user coin ledger with atomic, persisted balance updates, single-shot
//! games (coin flip, roulette, fishing) and wagered rock-paper-scissors duels
//! with a timeout-driven state machine. Every operation returns a typed
//! result; nothing here panics on bad input.

pub mod challenge;
pub mod config;
pub mod economy;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod metrics;
pub mod storage;

pub use challenge::{
    Actor, ChallengeEvent, ChallengeId, ChallengeManager, ChallengeStatus, SessionRegistry,
};
pub use config::{ConfigLoader, EconomyConfig};
pub use economy::{Economy, EconomyBuilder};
pub use errors::{EconomyError, EconomyResult};
pub use ledger::{Account, LedgerStore, TransactionEngine, UserId};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use storage::{JsonFileBackend, MemoryBackend, PersistenceBackend};
