//! Which users are currently inside a live challenge

use crate::challenge::types::ChallengeId;
use crate::errors::{EconomyError, EconomyResult};
use crate::ledger::UserId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Process-wide table of engaged users
///
/// All participants of a challenge are claimed or released under one lock, so
/// two challenges can never hold the same user.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    engaged: Mutex<HashMap<UserId, ChallengeId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<UserId, ChallengeId>> {
        self.engaged.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim every ID for `challenge`, or none of them
    pub fn occupy(&self, challenge: ChallengeId, ids: &[UserId]) -> EconomyResult<()> {
        let mut table = self.table();
        if let Some(taken) = ids.iter().find(|id| table.contains_key(*id)) {
            return Err(EconomyError::AlreadyEngaged(*taken));
        }
        for id in ids {
            table.insert(*id, challenge);
        }
        debug!("Challenge {} occupies {:?}", challenge, ids);
        Ok(())
    }

    /// Free the given IDs; unknown IDs are ignored
    pub fn release(&self, ids: &[UserId]) {
        let mut table = self.table();
        for id in ids {
            table.remove(id);
        }
    }

    /// Free only the entries still held by `challenge`
    pub fn release_challenge(&self, challenge: ChallengeId, ids: &[UserId]) {
        let mut table = self.table();
        for id in ids {
            if table.get(id) == Some(&challenge) {
                table.remove(id);
            }
        }
        debug!("Challenge {} released {:?}", challenge, ids);
    }

    pub fn engaged_in(&self, id: UserId) -> Option<ChallengeId> {
        self.table().get(&id).copied()
    }

    pub fn is_engaged(&self, id: UserId) -> bool {
        self.table().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupy_is_all_or_nothing() {
        let registry = SessionRegistry::new();
        let first = ChallengeId::new();
        registry.occupy(first, &[UserId(1), UserId(2)]).unwrap();

        let second = ChallengeId::new();
        match registry.occupy(second, &[UserId(3), UserId(2)]) {
            Err(EconomyError::AlreadyEngaged(id)) => assert_eq!(id, UserId(2)),
            other => panic!("Expected AlreadyEngaged, got {:?}", other),
        }
        assert!(!registry.is_engaged(UserId(3)));
        assert_eq!(registry.engaged_in(UserId(1)), Some(first));
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.occupy(ChallengeId::new(), &[UserId(1), UserId(2)]).unwrap();

        registry.release(&[UserId(1), UserId(2)]);
        registry.release(&[UserId(1), UserId(2)]);
        registry.release(&[UserId(99)]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_challenge_leaves_newer_claims() {
        let registry = SessionRegistry::new();
        let old = ChallengeId::new();
        let new = ChallengeId::new();
        registry.occupy(new, &[UserId(1), UserId(2)]).unwrap();

        registry.release_challenge(old, &[UserId(1), UserId(2)]);
        assert_eq!(registry.len(), 2);

        registry.release_challenge(new, &[UserId(1), UserId(2)]);
        assert!(registry.is_empty());
    }
}
