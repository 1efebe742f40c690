//! Challenge data model

use crate::games::rps::Move;
use crate::ledger::{TransferReceipt, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Unique identifier of a duel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub Uuid);

impl ChallengeId {
    pub fn new() -> Self {
        ChallengeId(Uuid::new_v4())
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Proposed,
    Accepted,
    Resolved,
    Rejected,
    Expired,
}

impl ChallengeStatus {
    /// Resolved, Rejected and Expired are final
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ChallengeStatus::Resolved | ChallengeStatus::Rejected | ChallengeStatus::Expired
        )
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChallengeStatus::Proposed => write!(f, "proposed"),
            ChallengeStatus::Accepted => write!(f, "accepted"),
            ChallengeStatus::Resolved => write!(f, "resolved"),
            ChallengeStatus::Rejected => write!(f, "rejected"),
            ChallengeStatus::Expired => write!(f, "expired"),
        }
    }
}

/// A user as seen by the dispatch layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: UserId,
    /// Non-player accounts can never hold a stake
    pub is_bot: bool,
}

impl Actor {
    pub fn player(id: UserId) -> Self {
        Actor {
            id,
            is_bot: false,
        }
    }

    pub fn bot(id: UserId) -> Self {
        Actor {
            id,
            is_bot: true,
        }
    }
}

/// One wagered rock-paper-scissors duel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub challenger: UserId,
    pub opponent: UserId,
    pub bet: u64,
    pub status: ChallengeStatus,
    /// At most one move per participant
    pub moves: BTreeMap<UserId, Move>,
    pub created_at: Instant,
    /// The challenge expires here unless it was resolved or rejected first
    pub deadline: Instant,
}

impl Challenge {
    pub fn participants(&self) -> [UserId; 2] {
        [self.challenger, self.opponent]
    }

    pub fn is_participant(&self, id: UserId) -> bool {
        id == self.challenger || id == self.opponent
    }

    /// The participant facing `id`
    pub fn counterpart(&self, id: UserId) -> UserId {
        if id == self.challenger {
            self.opponent
        } else {
            self.challenger
        }
    }

    /// Both moves, challenger first, once they are in
    pub fn both_moves(&self) -> Option<(Move, Move)> {
        Some((*self.moves.get(&self.challenger)?, *self.moves.get(&self.opponent)?))
    }
}

/// How coins moved when a duel resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    /// Equal moves, nothing moves
    Tie,
    /// The loser paid the bet to the winner
    Paid(TransferReceipt),
    /// The loser could no longer cover the bet; nothing moves
    Unfunded { winner: UserId, loser: UserId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResolution {
    pub id: ChallengeId,
    pub challenger: UserId,
    pub opponent: UserId,
    pub challenger_move: Move,
    pub opponent_move: Move,
    pub winner: Option<UserId>,
    pub bet: u64,
    pub settlement: Settlement,
}

/// Result of a move submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveReceipt {
    /// Recorded; still waiting on `pending`
    Waiting { pending: UserId },
    /// This move completed the duel
    Resolved(ChallengeResolution),
}

/// Lifecycle notifications for the dispatch layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeEvent {
    Proposed {
        id: ChallengeId,
        challenger: UserId,
        opponent: UserId,
        bet: u64,
    },
    Accepted {
        id: ChallengeId,
    },
    Rejected {
        id: ChallengeId,
    },
    Resolved(ChallengeResolution),
    Expired {
        id: ChallengeId,
        challenger: UserId,
        opponent: UserId,
        moves_received: usize,
    },
}

impl ChallengeEvent {
    pub fn challenge_id(&self) -> ChallengeId {
        match self {
            ChallengeEvent::Proposed { id, .. }
            | ChallengeEvent::Accepted { id }
            | ChallengeEvent::Rejected { id }
            | ChallengeEvent::Expired { id, .. } => *id,
            ChallengeEvent::Resolved(resolution) => resolution.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_display_and_terminal() {
        assert_eq!(ChallengeStatus::Proposed.to_string(), "proposed");
        assert!(!ChallengeStatus::Accepted.is_terminal());
        assert!(ChallengeStatus::Expired.is_terminal());
    }

    #[tokio::test]
    async fn test_both_moves_requires_each_side() {
        let now = Instant::now();
        let mut challenge = Challenge {
            id: ChallengeId::new(),
            challenger: UserId(1),
            opponent: UserId(2),
            bet: 10,
            status: ChallengeStatus::Accepted,
            moves: BTreeMap::new(),
            created_at: now,
            deadline: now + Duration::from_secs(60),
        };

        challenge.moves.insert(UserId(2), Move::Paper);
        assert_eq!(challenge.both_moves(), None);
        assert_eq!(challenge.counterpart(UserId(2)), UserId(1));

        challenge.moves.insert(UserId(1), Move::Rock);
        assert_eq!(challenge.both_moves(), Some((Move::Rock, Move::Paper)));
    }
}
