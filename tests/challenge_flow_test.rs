//! Duel lifecycle through the public API

use coinpurse::challenge::{Actor, ChallengeEvent, MoveReceipt, Settlement};
use coinpurse::games::Move;
use coinpurse::{ChallengeStatus, Economy, EconomyError, UserId};
use std::time::Duration;

async fn funded_economy(users: &[u64], coins: i64) -> Economy {
    let economy = Economy::in_memory().await.expect("economy");
    for user in users {
        economy.admin_add(UserId(*user), coins).await.expect("fund");
    }
    economy
}

#[tokio::test(start_paused = true)]
async fn test_full_duel_pays_winner() {
    let economy = funded_economy(&[1, 2], 100).await;
    let manager = economy.challenges();
    let mut events = manager.subscribe();

    let challenge = manager
        .propose(Actor::player(UserId(1)), Actor::player(UserId(2)), 25)
        .await
        .unwrap();
    manager.accept(challenge.id, UserId(2)).await.unwrap();

    let (first, second) = futures::future::join(
        manager.submit_move(challenge.id, UserId(1), "🪨".parse::<Move>().unwrap()),
        manager.submit_move(challenge.id, UserId(2), "scissors".parse::<Move>().unwrap()),
    )
    .await;

    let resolved = [first.unwrap(), second.unwrap()]
        .into_iter()
        .find_map(|receipt| match receipt {
            MoveReceipt::Resolved(resolution) => Some(resolution),
            MoveReceipt::Waiting { .. } => None,
        })
        .expect("one submission resolves the duel");

    assert_eq!(resolved.winner, Some(UserId(1)));
    assert!(matches!(resolved.settlement, Settlement::Paid(_)));
    assert_eq!(economy.balance(UserId(1)), 125);
    assert_eq!(economy.balance(UserId(2)), 75);

    let kinds: Vec<&'static str> = std::iter::from_fn(|| events.try_recv().ok())
        .map(|event| match event {
            ChallengeEvent::Proposed { .. } => "proposed",
            ChallengeEvent::Accepted { .. } => "accepted",
            ChallengeEvent::Rejected { .. } => "rejected",
            ChallengeEvent::Resolved(_) => "resolved",
            ChallengeEvent::Expired { .. } => "expired",
        })
        .collect();
    assert_eq!(kinds, vec!["proposed", "accepted", "resolved"]);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(economy.balance(UserId(1)), 125);
    assert_eq!(economy.metrics().challenges_expired, 0);
}

#[tokio::test(start_paused = true)]
async fn test_engaged_users_are_freed_after_expiry() {
    let economy = funded_economy(&[1, 2, 3], 10).await;
    let manager = economy.challenges();

    let stale = manager
        .propose(Actor::player(UserId(1)), Actor::player(UserId(2)), 5)
        .await
        .unwrap();
    assert!(matches!(
        manager
            .propose(Actor::player(UserId(3)), Actor::player(UserId(1)), 5)
            .await,
        Err(EconomyError::AlreadyEngaged(UserId(1)))
    ));

    tokio::time::sleep(Duration::from_secs(61)).await;

    assert!(matches!(
        manager.get(stale.id).await,
        Err(EconomyError::ChallengeNotFound(_))
    ));
    let fresh = manager
        .propose(Actor::player(UserId(3)), Actor::player(UserId(1)), 5)
        .await
        .expect("participants were released");
    assert_eq!(fresh.status, ChallengeStatus::Proposed);
    assert_eq!(economy.metrics().challenges_expired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_move_just_before_deadline_resolves() {
    let economy = funded_economy(&[1, 2], 50).await;
    let manager = economy.challenges();

    let challenge = manager
        .propose(Actor::player(UserId(1)), Actor::player(UserId(2)), 50)
        .await
        .unwrap();
    manager.accept(challenge.id, UserId(2)).await.unwrap();
    manager.submit_move(challenge.id, UserId(1), Move::Paper).await.unwrap();

    tokio::time::sleep_until(challenge.deadline - Duration::from_millis(1)).await;
    let landed = manager.submit_move(challenge.id, UserId(2), Move::Rock);
    let receipt = landed.await.unwrap();
    assert!(matches!(receipt, MoveReceipt::Resolved(_)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(economy.balance(UserId(1)), 100);
    assert_eq!(economy.balance(UserId(2)), 0);
    assert_eq!(economy.metrics().challenges_resolved, 1);
    assert_eq!(economy.metrics().challenges_expired, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_move_and_resolve_settle_once() {
    const ROUNDS: u64 = 150;
    let users: Vec<u64> = (1..=ROUNDS * 2).collect();
    let economy = funded_economy(&users, 10).await;
    let (mut resolved, mut expired) = (0, 0);

    for round in 0..ROUNDS {
        let (challenger, opponent) = (UserId(round * 2 + 1), UserId(round * 2 + 2));
        let manager = economy.challenges().clone();
        let challenge = manager
            .propose(Actor::player(challenger), Actor::player(opponent), 10)
            .await
            .unwrap();
        manager.accept(challenge.id, opponent).await.unwrap();
        manager.submit_move(challenge.id, challenger, Move::Paper).await.unwrap();

        let mover = manager.clone();
        let finisher = manager.clone();
        let id = challenge.id;
        let second = tokio::spawn(async move { mover.submit_move(id, opponent, Move::Rock).await });
        let forced = tokio::spawn(async move { finisher.resolve(id).await });
        let (second, forced) = (second.await.unwrap(), forced.await.unwrap());

        match (second, forced) {
            (Ok(MoveReceipt::Resolved(_)), Ok(ChallengeStatus::Resolved))
            | (Ok(MoveReceipt::Resolved(_)), Err(EconomyError::ChallengeNotFound(_))) => {
                resolved += 1;
                assert_eq!(economy.balance(challenger), 20);
                assert_eq!(economy.balance(opponent), 0);
            }
            (Err(_), Ok(ChallengeStatus::Expired)) => {
                expired += 1;
                assert_eq!(economy.balance(challenger), 10);
                assert_eq!(economy.balance(opponent), 10);
            }
            other => panic!("Round {} settled inconsistently: {:?}", round, other),
        }

        assert_eq!(economy.balance(challenger) + economy.balance(opponent), 20);
        assert!(manager.registry().is_empty());
        assert_eq!(manager.active_count(), 0);
    }

    let metrics = economy.metrics();
    assert_eq!(resolved + expired, ROUNDS);
    assert_eq!(metrics.challenges_resolved, resolved);
    assert_eq!(metrics.challenges_expired, expired);
}
