use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cyberbank_cards::{
    AccountStore, CardDraft, CardKind, InMemoryAccountStore, Pin, RetryPolicy, TransferEngine, TransferRequest,
};
use cyberbank_core::{CardId, UserId};

const CARDS: i64 = 6;
const OPENING_BALANCE: u64 = 1_000;

fn seeded_store() -> (Arc<InMemoryAccountStore>, Vec<CardId>) {
    let store = Arc::new(InMemoryAccountStore::new());
    let ids = (1..=CARDS)
        .map(|owner| {
            store
                .insert(CardDraft {
                    owner: UserId::new(owner),
                    kind: CardKind::Debit,
                    pin: Pin::parse("2468").unwrap(),
                    balance: OPENING_BALANCE,
                    title: format!("ring-{owner}"),
                })
                .unwrap()
                .id
        })
        .collect();
    (store, ids)
}

#[test]
fn observers_never_see_a_half_applied_transfer() {
    let (store, ids) = seeded_store();
    let expected_total = u128::from(OPENING_BALANCE) * CARDS as u128;
    let engine = TransferEngine::new(store.clone(), RetryPolicy::new(1_000));
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        let observer = s.spawn(|| {
            let mut samples = 0u64;
            while !done.load(Ordering::Acquire) {
                let snapshot = store.list().unwrap();
                let total: u128 = snapshot.iter().map(|c| u128::from(c.balance)).sum();
                assert_eq!(total, expected_total, "observed a partial transfer");
                samples += 1;
            }
            samples
        });

        let workers: Vec<_> = (0..ids.len())
            .map(|i| {
                let engine = &engine;
                let ids = &ids;
                s.spawn(move || {
                    for round in 0..200u64 {
                        let req = TransferRequest {
                            sender: ids[i],
                            receiver: ids[(i + 1) % ids.len()],
                            amount: (round % 17 + 1) as i64,
                            pin: "2468".to_string(),
                        };
                        let _ = engine.transfer(&req);
                    }
                })
            })
            .collect();

        for w in workers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
        assert!(observer.join().unwrap() > 0);
    });

    assert_eq!(store.total_balance().unwrap(), expected_total);
    for card in store.list().unwrap() {
        assert!(card.balance <= OPENING_BALANCE * CARDS as u64);
    }
}

#[test]
fn many_concurrent_debits_never_overdraw() {
    let (store, ids) = seeded_store();
    let source = ids[0];
    let engine = TransferEngine::new(store.clone(), RetryPolicy::new(1_000));

    // 40 transfers of 60 against a balance of 1000: at most 16 can succeed.
    let successes: usize = std::thread::scope(|s| {
        let handles: Vec<_> = (0..40)
            .map(|n| {
                let engine = &engine;
                let ids = &ids;
                s.spawn(move || {
                    let req = TransferRequest {
                        sender: source,
                        receiver: ids[1 + n % (ids.len() - 1)],
                        amount: 60,
                        pin: "2468".to_string(),
                    };
                    engine.transfer(&req).is_ok() as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(successes, 16);
    let remaining = store.find_by_id(source).unwrap().unwrap().balance;
    assert_eq!(remaining, OPENING_BALANCE - 16 * 60);
    assert_eq!(store.total_balance().unwrap(), u128::from(OPENING_BALANCE) * CARDS as u128);
}
