//! Concurrent ledger access: conservation, no overdraft, no deadlock

use coinpurse::{Economy, EconomyError, UserId};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_transfers_conserve_each_pair() {
    let economy = Economy::in_memory().await.expect("economy");
    let ledger = economy.ledger().clone();

    for pair in 0..10u64 {
        ledger.credit(UserId(pair * 2), 100).await.unwrap();
        ledger.credit(UserId(pair * 2 + 1), 20).await.unwrap();
    }

    let mut tasks = Vec::new();
    for pair in 0..10u64 {
        let ledger = ledger.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                ledger
                    .transfer(UserId(pair * 2), UserId(pair * 2 + 1), 5)
                    .await
                    .expect("transfer");
            }
        }));
    }
    for task in futures::future::join_all(tasks).await {
        task.expect("task panicked");
    }

    for pair in 0..10u64 {
        assert_eq!(ledger.balance(UserId(pair * 2)), 50);
        assert_eq!(ledger.balance(UserId(pair * 2 + 1)), 70);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simultaneous_debits_never_overdraw() {
    let economy = Economy::in_memory().await.expect("economy");
    let ledger = economy.ledger().clone();
    let user = UserId(42);
    ledger.credit(user, 100).await.unwrap();

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.debit_strict(user, 3).await })
        })
        .collect();

    let mut succeeded = 0;
    let mut refused = 0;
    for result in futures::future::join_all(tasks).await {
        match result.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(EconomyError::InsufficientFunds { .. }) => refused += 1,
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 33);
    assert_eq!(refused, 17);
    assert_eq!(ledger.balance(user), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_transfers_do_not_deadlock() {
    let economy = Economy::in_memory().await.expect("economy");
    let ledger = economy.ledger().clone();
    let (a, b) = (UserId(1), UserId(2));
    ledger.credit(a, 1_000).await.unwrap();
    ledger.credit(b, 1_000).await.unwrap();

    let forward = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                ledger.transfer(a, b, 1).await.expect("a -> b");
            }
        })
    };
    let backward = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                ledger.transfer(b, a, 1).await.expect("b -> a");
            }
        })
    };

    let both = futures::future::join(forward, backward);
    let (f, r) = tokio::time::timeout(Duration::from_secs(10), both)
        .await
        .expect("transfers deadlocked");
    f.unwrap();
    r.unwrap();

    assert_eq!(ledger.balance(a) + ledger.balance(b), 2_000);
}
