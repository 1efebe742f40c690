//! Two-player wagered duels

pub mod manager;
pub mod registry;
pub mod types;

pub use manager::ChallengeManager;
pub use registry::SessionRegistry;
pub use types::{
    Actor, Challenge, ChallengeEvent, ChallengeId, ChallengeResolution, ChallengeStatus,
    MoveReceipt, Settlement,
};
