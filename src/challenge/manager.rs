//! Challenge state machine
//!
//! ```text
//! Proposed --accept--> Accepted --both moves--> Resolved
//!    |  \--reject--> Rejected       |
//!    \------------ timeout ---------+--> Expired
//! ```
//!
//! Every transition happens under the challenge's own async lock. The timeout
//! task and the second move both go through the same guarded finalization, so
//! whichever takes the lock first decides the outcome and the other becomes a
//! no-op. Terminal challenges leave the table and free their participants.

use crate::challenge::registry::SessionRegistry;
use crate::config::invalid;
use crate::challenge::types::{
    Actor, Challenge, ChallengeEvent, ChallengeId, ChallengeResolution, ChallengeStatus,
    MoveReceipt, Settlement,
};
use crate::errors::{EconomyError, EconomyResult};
use crate::games::rps::{Move, Showdown};
use crate::ledger::transactions::{apply_transfer, positive_amount};
use crate::ledger::{TransactionEngine, UserId};
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct ChallengeSlot {
    state: Mutex<Challenge>,
    timer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChallengeSlot {
    fn new(challenge: Challenge) -> Self {
        Self {
            state: Mutex::new(challenge),
            timer: std::sync::Mutex::new(None),
        }
    }

    fn set_timer(&self, handle: JoinHandle<()>) {
        *self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    fn take_timer(&self) -> Option<JoinHandle<()>> {
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }
}

struct ManagerInner {
    engine: TransactionEngine,
    registry: Arc<SessionRegistry>,
    challenges: DashMap<ChallengeId, Arc<ChallengeSlot>>,
    events: broadcast::Sender<ChallengeEvent>,
    timeout: Duration,
}

/// Runs wagered rock-paper-scissors duels between two players
#[derive(Clone)]
pub struct ChallengeManager {
    inner: Arc<ManagerInner>,
}

impl ChallengeManager {
    pub fn new(
        engine: TransactionEngine,
        registry: Arc<SessionRegistry>,
        timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(ManagerInner {
                engine,
                registry,
                challenges: DashMap::new(),
                events,
                timeout,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.inner.registry
    }

    /// Stream of lifecycle events, including timeouts
    pub fn subscribe(&self) -> broadcast::Receiver<ChallengeEvent> {
        self.inner.events.subscribe()
    }

    /// Number of challenges that have not reached a final state
    pub fn active_count(&self) -> usize {
        self.inner.challenges.len()
    }

    /// Current state of a live challenge
    pub async fn get(&self, id: ChallengeId) -> EconomyResult<Challenge> {
        let slot = self.inner.slot(id)?;
        let challenge = slot.state.lock().await;
        Ok(challenge.clone())
    }

    /// Open a duel and start its timeout window
    pub async fn propose(
        &self,
        challenger: Actor,
        opponent: Actor,
        bet: i64,
    ) -> EconomyResult<Challenge> {
        if challenger.id == opponent.id {
            return Err(EconomyError::SelfChallenge);
        }
        if challenger.is_bot || opponent.is_bot {
            return Err(EconomyError::BotTarget);
        }
        let bet = positive_amount(bet)?;
        self.inner.require_stakes(challenger.id, opponent.id, bet)?;

        let created_at = Instant::now();
        let deadline = created_at.checked_add(self.inner.timeout).ok_or_else(|| {
            invalid(
                "challenge.timeout_secs",
                &self.inner.timeout.as_secs().to_string(),
                "Challenge deadline is out of range",
            )
        })?;

        let id = ChallengeId::new();
        self.inner.registry.occupy(id, &[challenger.id, opponent.id])?;

        let challenge = Challenge {
            id,
            challenger: challenger.id,
            opponent: opponent.id,
            bet,
            status: ChallengeStatus::Proposed,
            moves: Default::default(),
            created_at,
            deadline,
        };

        let slot = Arc::new(ChallengeSlot::new(challenge.clone()));
        self.inner.challenges.insert(id, slot.clone());
        slot.set_timer(spawn_timeout(Arc::downgrade(&self.inner), id, challenge.deadline));

        self.inner.engine.metrics().record_challenge_proposed();
        self.inner.emit(ChallengeEvent::Proposed {
            id,
            challenger: challenger.id,
            opponent: opponent.id,
            bet,
        });
        info!(
            "Challenge {}: {} challenged {} for {} coins",
            id, challenger.id, opponent.id, bet
        );

        Ok(challenge)
    }

    /// Opponent agrees to the duel; both stakes are checked again
    pub async fn accept(&self, id: ChallengeId, actor: UserId) -> EconomyResult<Challenge> {
        let slot = self.inner.slot(id)?;
        let mut challenge = slot.state.lock().await;

        require_opponent(&challenge, actor)?;
        if challenge.status != ChallengeStatus::Proposed {
            return Err(EconomyError::InvalidTransition {
                status: challenge.status,
                action: "accept",
            });
        }
        self.inner
            .require_stakes(challenge.challenger, challenge.opponent, challenge.bet)?;

        challenge.status = ChallengeStatus::Accepted;
        self.inner.emit(ChallengeEvent::Accepted { id });
        info!("Challenge {} accepted by {}", id, actor);

        Ok(challenge.clone())
    }

    /// Opponent declines; participants are freed immediately
    pub async fn reject(&self, id: ChallengeId, actor: UserId) -> EconomyResult<Challenge> {
        let slot = self.inner.slot(id)?;
        let mut challenge = slot.state.lock().await;

        require_opponent(&challenge, actor)?;
        if challenge.status != ChallengeStatus::Proposed {
            return Err(EconomyError::InvalidTransition {
                status: challenge.status,
                action: "reject",
            });
        }

        challenge.status = ChallengeStatus::Rejected;
        self.inner.close(&slot, &challenge);
        self.inner.engine.metrics().record_challenge_rejected();
        self.inner.emit(ChallengeEvent::Rejected { id });
        info!("Challenge {} rejected by {}", id, actor);

        Ok(challenge.clone())
    }

    /// Record a participant's move; the second move resolves the duel
    pub async fn submit_move(
        &self,
        id: ChallengeId,
        actor: UserId,
        choice: Move,
    ) -> EconomyResult<MoveReceipt> {
        let slot = self.inner.slot(id)?;
        let mut challenge = slot.state.lock().await;

        if !challenge.is_participant(actor) {
            return Err(EconomyError::NotAParticipant(actor));
        }
        if challenge.status != ChallengeStatus::Accepted {
            return Err(EconomyError::InvalidTransition {
                status: challenge.status,
                action: "submit a move",
            });
        }
        if challenge.moves.contains_key(&actor) {
            return Err(EconomyError::DuplicateMove(actor));
        }

        challenge.moves.insert(actor, choice);
        debug!("Challenge {}: {} played", id, actor);

        let moves = match challenge.both_moves() {
            Some(moves) => moves,
            None => {
                return Ok(MoveReceipt::Waiting {
                    pending: challenge.counterpart(actor),
                })
            }
        };

        match self.inner.settle(&slot, &mut challenge, moves).await {
            Ok(resolution) => Ok(MoveReceipt::Resolved(resolution)),
            Err(e) => {
                // Leave the duel as it was so the move can be retried
                challenge.moves.remove(&actor);
                Err(e)
            }
        }
    }

    /// Finalize a challenge now
    ///
    /// With both moves in, the duel is settled; otherwise it expires and no
    /// coins move. A finished challenge has already left the table, so a later
    /// call fails with `ChallengeNotFound`; a call that was waiting on the lock
    /// while another path finalized it returns the final status unchanged.
    pub async fn resolve(&self, id: ChallengeId) -> EconomyResult<ChallengeStatus> {
        self.inner.resolve(id).await
    }
}

impl ManagerInner {
    fn slot(&self, id: ChallengeId) -> EconomyResult<Arc<ChallengeSlot>> {
        self.challenges
            .get(&id)
            .map(|slot| slot.clone())
            .ok_or(EconomyError::ChallengeNotFound(id))
    }

    fn emit(&self, event: ChallengeEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn require_stakes(&self, challenger: UserId, opponent: UserId, bet: u64) -> EconomyResult<()> {
        for id in [challenger, opponent] {
            let available = self.engine.balance(id);
            if available < bet {
                return Err(EconomyError::InsufficientFunds {
                    needed: bet,
                    available,
                });
            }
        }
        Ok(())
    }

    async fn resolve(&self, id: ChallengeId) -> EconomyResult<ChallengeStatus> {
        let slot = self.slot(id)?;
        let mut challenge = slot.state.lock().await;

        if challenge.status.is_terminal() {
            return Ok(challenge.status);
        }

        match challenge.both_moves() {
            Some(moves) => {
                self.settle(&slot, &mut challenge, moves).await?;
            }
            None => self.expire(&slot, &mut challenge),
        }

        Ok(challenge.status)
    }

    async fn settle(
        &self,
        slot: &ChallengeSlot,
        challenge: &mut Challenge,
        (challenger_move, opponent_move): (Move, Move),
    ) -> EconomyResult<ChallengeResolution> {
        let (winner, settlement) = match challenger_move.against(opponent_move) {
            Showdown::Tie => (None, Settlement::Tie),
            Showdown::FirstWins => (
                Some(challenge.challenger),
                self.pay_out(challenge.challenger, challenge.opponent, challenge.bet).await?,
            ),
            Showdown::SecondWins => (
                Some(challenge.opponent),
                self.pay_out(challenge.opponent, challenge.challenger, challenge.bet).await?,
            ),
        };

        challenge.status = ChallengeStatus::Resolved;
        self.close(slot, challenge);

        let resolution = ChallengeResolution {
            id: challenge.id,
            challenger: challenge.challenger,
            opponent: challenge.opponent,
            challenger_move,
            opponent_move,
            winner,
            bet: challenge.bet,
            settlement,
        };

        self.engine.metrics().record_challenge_resolved();
        self.emit(ChallengeEvent::Resolved(resolution.clone()));
        match winner {
            Some(winner) => info!(
                "Challenge {} resolved: {} beat {} and wins {}",
                challenge.id,
                winner,
                challenge.counterpart(winner),
                challenge.bet
            ),
            None => info!("Challenge {} resolved as a tie", challenge.id),
        }

        Ok(resolution)
    }

    async fn pay_out(&self, winner: UserId, loser: UserId, bet: u64) -> EconomyResult<Settlement> {
        let result = self
            .engine
            .store()
            .mutate(&[winner, loser], |ws| apply_transfer(ws, loser, winner, bet))
            .await;

        match result {
            Ok(receipt) => {
                self.engine.metrics().record_transfer();
                Ok(Settlement::Paid(receipt))
            }
            Err(EconomyError::InsufficientFunds { needed, available }) => {
                warn!(
                    "Loser {} can no longer cover the bet ({} of {}); no coins moved",
                    loser, available, needed
                );
                Ok(Settlement::Unfunded { winner, loser })
            }
            Err(e) => Err(e),
        }
    }

    fn expire(&self, slot: &ChallengeSlot, challenge: &mut Challenge) {
        challenge.status = ChallengeStatus::Expired;
        self.close(slot, challenge);

        self.engine.metrics().record_challenge_expired();
        self.emit(ChallengeEvent::Expired {
            id: challenge.id,
            challenger: challenge.challenger,
            opponent: challenge.opponent,
            moves_received: challenge.moves.len(),
        });
        info!(
            "Challenge {} expired with {} of 2 moves",
            challenge.id,
            challenge.moves.len()
        );
    }

    /// Cancel the timer, free the participants and drop the challenge
    fn close(&self, slot: &ChallengeSlot, challenge: &Challenge) {
        if let Some(timer) = slot.take_timer() {
            timer.abort();
        }
        self.registry
            .release_challenge(challenge.id, &challenge.participants());
        self.challenges.remove(&challenge.id);
    }
}

fn require_opponent(challenge: &Challenge, actor: UserId) -> EconomyResult<()> {
    if actor == challenge.opponent {
        Ok(())
    } else if actor == challenge.challenger {
        Err(EconomyError::NotOpponent(actor))
    } else {
        Err(EconomyError::NotAParticipant(actor))
    }
}

fn spawn_timeout(inner: Weak<ManagerInner>, id: ChallengeId, deadline: Instant) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;

        let inner = match inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };

        // Detach our own handle so finalization does not abort this task
        if let Ok(slot) = inner.slot(id) {
            slot.take_timer();
        }

        match inner.resolve(id).await {
            Ok(status) => debug!("Challenge {} timeout fired ({})", id, status),
            Err(EconomyError::ChallengeNotFound(_)) => {}
            Err(e) => error!("Challenge {} timeout could not finalize: {}", id, e),
        }
    })
}
