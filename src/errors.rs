//! Error types for the coinpurse wagering engine
//!
//! Every failure is recoverable and reported to the caller as a value; nothing
//! in this crate is allowed to take the process down on bad input.

use crate::challenge::{ChallengeId, ChallengeStatus};
use crate::ledger::UserId;
use std::fmt;

/// Root error type for all engine operations
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    #[error("Insufficient funds: needed {needed}, available {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Invalid amount {0}: must be greater than zero")]
    InvalidAmount(i64),

    #[error("A user cannot challenge themselves")]
    SelfChallenge,

    #[error("Bots cannot take part in wagers or payments")]
    BotTarget,

    #[error("User {0} is already engaged in a challenge")]
    AlreadyEngaged(UserId),

    #[error("User {0} is not a participant of this challenge")]
    NotAParticipant(UserId),

    #[error("Only the challenged user can answer; {0} is the challenger")]
    NotOpponent(UserId),

    #[error("User {0} has already submitted a move")]
    DuplicateMove(UserId),

    #[error("Challenge {0} not found")]
    ChallengeNotFound(ChallengeId),

    #[error("Cannot {action} while challenge is {status}")]
    InvalidTransition {
        status: ChallengeStatus,
        action: &'static str,
    },

    #[error("Invalid choice '{0}'")]
    InvalidChoice(String),

    #[error("Invalid roulette number {0}: choose between 0 and 36")]
    InvalidNumber(i64),

    #[error("Daily reward already claimed; next claim in {remaining_secs}s")]
    ClaimCooldown { remaining_secs: i64 },

    #[error("No fishing session is open for user {0}")]
    NoActiveCast(UserId),

    #[error("Fishing session for user {user} is not ready: {reason}")]
    CastNotReady { user: UserId, reason: &'static str },

    #[error("Balance overflow")]
    BalanceOverflow,

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration and validation errors
#[derive(Debug)]
pub enum ConfigurationError {
    InvalidValue { field: String, value: String, reason: String },
    RarityWeights { total: u32 },
    EmptyTier(String),
    LoadFailed(String),
}

/// Persistence backend errors
#[derive(Debug)]
pub enum StorageError {
    ReadFailed(String),
    WriteFailed(String),
    CorruptedData(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::InvalidValue { field, value, reason } => {
                write!(f, "Invalid value for {}: '{}' ({})", field, value, reason)
            }
            ConfigurationError::RarityWeights { total } => {
                write!(f, "Rarity weights must sum to 100, got {}", total)
            }
            ConfigurationError::EmptyTier(tier) => {
                write!(f, "Rarity tier {} has a weight but no items", tier)
            }
            ConfigurationError::LoadFailed(msg) => {
                write!(f, "Failed to load configuration: {}", msg)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::ReadFailed(msg) => write!(f, "Read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "Write failed: {}", msg),
            StorageError::CorruptedData(msg) => write!(f, "Corrupted data: {}", msg),
        }
    }
}

impl std::error::Error for ConfigurationError {}
impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::ReadFailed(e.to_string()),
            _ => StorageError::WriteFailed(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::CorruptedData(e.to_string())
    }
}

// Convenience type alias for Results
pub type EconomyResult<T> = Result<T, EconomyError>;
