//! Card-to-card transfers.
//!
//! A transfer is validated against a snapshot of both cards and then committed
//! with a single two-card compare-and-swap. When another writer got there
//! first the snapshot is stale, so the engine re-reads and tries again, up to
//! [`RetryPolicy::max_attempts`] times. Every attempt re-runs the full
//! validation, so a retry can still end in `InsufficientFunds` or a
//! not-found error if the world changed in between.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use cyberbank_core::{CardId, ErrorKind, Reason};

use crate::card::Card;
use crate::store::{AccountStore, BalanceSwap, StoreError};

/// Funds movement request. Ephemeral; never persisted.
#[derive(Clone, Deserialize)]
pub struct TransferRequest {
    pub sender: CardId,
    pub receiver: CardId,
    /// Minor units. Signed so that negative input is reported as `InvalidAmount`.
    pub amount: i64,
    pub pin: String,
}

impl core::fmt::Debug for TransferRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferRequest")
            .field("sender", &self.sender)
            .field("receiver", &self.receiver)
            .field("amount", &self.amount)
            .finish_non_exhaustive()
    }
}

/// Confirmation of a committed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub id: Uuid,
    pub sender: CardId,
    pub receiver: CardId,
    pub amount: u64,
    pub sender_balance: u64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("transfer amount must be positive")]
    InvalidAmount,

    #[error("sender card {0} not found")]
    SenderNotFound(CardId),

    #[error("receiver card {0} not found")]
    ReceiverNotFound(CardId),

    #[error("cannot transfer to the same card")]
    SelfTransferRejected,

    #[error("incorrect pin")]
    PinMismatch,

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("receiver balance would overflow")]
    BalanceOverflow,

    #[error("transfer could not be committed after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Reason for TransferError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidAmount
            | TransferError::SelfTransferRejected
            | TransferError::BalanceOverflow => ErrorKind::InvalidRequest,
            TransferError::SenderNotFound(_) | TransferError::ReceiverNotFound(_) => ErrorKind::NotFound,
            TransferError::PinMismatch => ErrorKind::PinMismatch,
            TransferError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            TransferError::Conflict { .. } => ErrorKind::Conflict,
            TransferError::Store(e) => e.kind(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "invalid_amount",
            TransferError::SenderNotFound(_) => "sender_not_found",
            TransferError::ReceiverNotFound(_) => "receiver_not_found",
            TransferError::SelfTransferRejected => "self_transfer_rejected",
            TransferError::PinMismatch => "pin_mismatch",
            TransferError::InsufficientFunds { .. } => "insufficient_funds",
            TransferError::BalanceOverflow => "balance_overflow",
            TransferError::Conflict { .. } => "conflict",
            TransferError::Store(e) => e.code(),
        }
    }
}

/// Bound on optimistic commit attempts.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

    /// At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

/// A fully validated transfer, ready to commit.
struct Plan {
    debit: BalanceSwap,
    credit: BalanceSwap,
}

/// Validation against one snapshot of the two cards, in the documented order.
fn plan(
    req: &TransferRequest,
    amount: u64,
    sender: Option<Card>,
    receiver: Option<Card>,
) -> Result<Plan, TransferError> {
    let sender = sender.ok_or(TransferError::SenderNotFound(req.sender))?;
    let receiver = receiver.ok_or(TransferError::ReceiverNotFound(req.receiver))?;

    if sender.id == receiver.id {
        return Err(TransferError::SelfTransferRejected);
    }
    if !sender.pin_matches(&req.pin) {
        return Err(TransferError::PinMismatch);
    }
    if sender.balance < amount {
        return Err(TransferError::InsufficientFunds {
            balance: sender.balance,
            requested: amount,
        });
    }
    let credited = receiver
        .balance
        .checked_add(amount)
        .ok_or(TransferError::BalanceOverflow)?;

    Ok(Plan {
        debit: BalanceSwap {
            id: sender.id,
            expected: sender.balance,
            new: sender.balance - amount,
        },
        credit: BalanceSwap {
            id: receiver.id,
            expected: receiver.balance,
            new: credited,
        },
    })
}

/// Moves funds between cards through an [`AccountStore`].
#[derive(Debug, Clone)]
pub struct TransferEngine<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S: AccountStore> TransferEngine<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn transfer(&self, req: &TransferRequest) -> Result<TransferReceipt, TransferError> {
        let amount = u64::try_from(req.amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(TransferError::InvalidAmount)?;

        for attempt in 1..=self.retry.max_attempts() {
            let sender = self.store.find_by_id(req.sender)?;
            let receiver = if req.receiver == req.sender {
                sender.clone()
            } else {
                self.store.find_by_id(req.receiver)?
            };

            let planned = plan(req, amount, sender, receiver)?;

            if self.store.compare_and_swap_pair(planned.debit, planned.credit)? {
                let receipt = TransferReceipt {
                    id: Uuid::now_v7(),
                    sender: req.sender,
                    receiver: req.receiver,
                    amount,
                    sender_balance: planned.debit.new,
                    completed_at: Utc::now(),
                };
                tracing::info!(
                    transfer_id = %receipt.id,
                    sender = %req.sender,
                    receiver = %req.receiver,
                    amount,
                    attempt,
                    "transfer committed"
                );
                return Ok(receipt);
            }

            tracing::debug!(sender = %req.sender, receiver = %req.receiver, attempt, "transfer cas miss, retrying");
            std::thread::yield_now();
        }

        tracing::warn!(
            sender = %req.sender,
            receiver = %req.receiver,
            attempts = self.retry.max_attempts(),
            "transfer retries exhausted"
        );
        Err(TransferError::Conflict {
            attempts: self.retry.max_attempts(),
        })
    }

    /// Credit a single card (test funding). Returns the updated card.
    pub fn credit(&self, card: CardId, amount: i64) -> Result<Card, TransferError> {
        let amount = u64::try_from(amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(TransferError::InvalidAmount)?;

        for _ in 0..self.retry.max_attempts() {
            let mut current = self
                .store
                .find_by_id(card)?
                .ok_or(StoreError::NotFound(card))?;
            let new = current
                .balance
                .checked_add(amount)
                .ok_or(TransferError::BalanceOverflow)?;

            let swap = BalanceSwap {
                id: card,
                expected: current.balance,
                new,
            };
            if self.store.compare_and_swap_balance(swap)? {
                tracing::info!(card = %card, amount, "card credited");
                current.balance = new;
                return Ok(current);
            }
            std::thread::yield_now();
        }

        Err(TransferError::Conflict {
            attempts: self.retry.max_attempts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{CardDraft, CardKind, Pin};
    use crate::store::InMemoryAccountStore;
    use cyberbank_core::UserId;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn open(store: &InMemoryAccountStore, owner: i64, pin: &str, balance: u64) -> CardId {
        store
            .insert(CardDraft {
                owner: UserId::new(owner),
                kind: CardKind::Debit,
                pin: Pin::parse(pin).unwrap(),
                balance,
                title: format!("card of {owner}"),
            })
            .unwrap()
            .id
    }

    fn balance(store: &InMemoryAccountStore, id: CardId) -> u64 {
        store.find_by_id(id).unwrap().unwrap().balance
    }

    fn request(sender: CardId, receiver: CardId, amount: i64, pin: &str) -> TransferRequest {
        TransferRequest {
            sender,
            receiver,
            amount,
            pin: pin.to_string(),
        }
    }

    fn engine(store: &Arc<InMemoryAccountStore>) -> TransferEngine<Arc<InMemoryAccountStore>> {
        TransferEngine::new(store.clone(), RetryPolicy::default())
    }

    #[test]
    fn successful_then_failed_transfer_between_two_cards() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, "1234", 1000);
        let b = open(&store, 2, "0000", 500);
        let engine = engine(&store);

        let receipt = engine.transfer(&request(a, b, 300, "1234")).unwrap();
        assert_eq!(receipt.sender_balance, 700);
        assert_eq!(receipt.amount, 300);
        assert_eq!(balance(&store, a), 700);
        assert_eq!(balance(&store, b), 800);

        let err = engine.transfer(&request(a, b, 800, "1234")).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientFunds {
                balance: 700,
                requested: 800
            }
        );
        assert_eq!(balance(&store, a), 700);
        assert_eq!(balance(&store, b), 800);
    }

    #[test]
    fn validation_follows_the_documented_order() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, "1234", 100);
        let b = open(&store, 2, "0000", 0);
        let missing = CardId::new(999);
        let engine = engine(&store);

        // amount is checked before anything else, even for unknown cards
        assert_eq!(engine.transfer(&request(missing, missing, 0, "x")), Err(TransferError::InvalidAmount));
        assert_eq!(engine.transfer(&request(a, b, -5, "1234")), Err(TransferError::InvalidAmount));
        assert_eq!(
            engine.transfer(&request(missing, b, 10, "1234")),
            Err(TransferError::SenderNotFound(missing))
        );
        assert_eq!(
            engine.transfer(&request(a, missing, 10, "1234")),
            Err(TransferError::ReceiverNotFound(missing))
        );
        assert_eq!(engine.transfer(&request(a, a, 10, "1234")), Err(TransferError::SelfTransferRejected));
        assert_eq!(engine.transfer(&request(a, b, 10, "4321")), Err(TransferError::PinMismatch));
        // a wrong pin wins over insufficient funds
        assert_eq!(engine.transfer(&request(a, b, 1000, "4321")), Err(TransferError::PinMismatch));

        assert_eq!(balance(&store, a), 100);
        assert_eq!(balance(&store, b), 0);
    }

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            TransferError::InvalidAmount,
            TransferError::SenderNotFound(CardId::new(1)),
            TransferError::ReceiverNotFound(CardId::new(1)),
            TransferError::SelfTransferRejected,
            TransferError::PinMismatch,
            TransferError::InsufficientFunds { balance: 0, requested: 1 },
            TransferError::BalanceOverflow,
            TransferError::Conflict { attempts: 1 },
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert_eq!(TransferError::PinMismatch.kind(), ErrorKind::PinMismatch);
    }

    #[test]
    fn two_concurrent_transfers_cannot_overdraw() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, "1234", 100);
        let b = open(&store, 2, "0000", 0);
        let c = open(&store, 3, "0000", 0);
        let engine = engine(&store);

        let results: Vec<Result<TransferReceipt, TransferError>> = std::thread::scope(|s| {
            let first = s.spawn(|| engine.transfer(&request(a, b, 60, "1234")));
            let second = s.spawn(|| engine.transfer(&request(a, c, 60, "1234")));
            vec![first.join().unwrap(), second.join().unwrap()]
        });

        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        assert!(results.iter().any(|r| matches!(r, Err(TransferError::InsufficientFunds { .. }))));
        assert_eq!(balance(&store, a), 40);
        assert_eq!(balance(&store, b) + balance(&store, c), 60);
    }

    /// Store wrapper whose pair CAS always loses the race.
    struct AlwaysStale(InMemoryAccountStore, AtomicUsize);

    impl AccountStore for AlwaysStale {
        fn find_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError> {
            self.0.find_by_id(id)
        }
        fn list(&self) -> Result<Vec<Card>, StoreError> {
            self.0.list()
        }
        fn list_by_owner(&self, owner: UserId) -> Result<Vec<Card>, StoreError> {
            self.0.list_by_owner(owner)
        }
        fn insert(&self, draft: CardDraft) -> Result<Card, StoreError> {
            self.0.insert(draft)
        }
        fn save(&self, card: &Card) -> Result<(), StoreError> {
            self.0.save(card)
        }
        fn delete(&self, id: CardId) -> Result<bool, StoreError> {
            self.0.delete(id)
        }
        fn compare_and_swap_balance(&self, _swap: BalanceSwap) -> Result<bool, StoreError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
        fn compare_and_swap_pair(&self, _debit: BalanceSwap, _credit: BalanceSwap) -> Result<bool, StoreError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    }

    #[test]
    fn exhausted_retries_surface_as_conflict() {
        let inner = InMemoryAccountStore::new();
        let a = open(&inner, 1, "1234", 100);
        let b = open(&inner, 2, "0000", 0);
        let store = Arc::new(AlwaysStale(inner, AtomicUsize::new(0)));
        let engine = TransferEngine::new(store.clone(), RetryPolicy::new(3));

        assert_eq!(
            engine.transfer(&request(a, b, 10, "1234")),
            Err(TransferError::Conflict { attempts: 3 })
        );
        assert_eq!(store.1.load(Ordering::SeqCst), 3);
        assert_eq!(store.0.find_by_id(a).unwrap().unwrap().balance, 100);
    }

    #[test]
    fn credit_adds_to_a_single_card() {
        let store = Arc::new(InMemoryAccountStore::new());
        let a = open(&store, 1, "1234", 5);
        let engine = engine(&store);

        assert_eq!(engine.credit(a, 95).unwrap().balance, 100);
        assert_eq!(engine.credit(a, 0), Err(TransferError::InvalidAmount));
        let err = engine.credit(CardId::new(77), 1).unwrap_err();
        assert_eq!(err.code(), "card_not_found");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: concurrent transfers conserve the total and never drive a
        /// balance below zero, whatever the interleaving.
        #[test]
        fn concurrent_transfers_conserve_money(
            initial in prop::collection::vec(0u64..500, 2..5),
            transfers in prop::collection::vec((0usize..5, 0usize..5, 1i64..300), 1..24),
        ) {
            let store = Arc::new(InMemoryAccountStore::new());
            let ids: Vec<CardId> = initial
                .iter()
                .enumerate()
                .map(|(i, b)| open(&store, i as i64 + 1, "1234", *b))
                .collect();
            let total_before = store.total_balance().unwrap();
            let engine = TransferEngine::new(store.clone(), RetryPolicy::new(64));

            std::thread::scope(|s| {
                for chunk in transfers.chunks(4) {
                    let engine = &engine;
                    let ids = &ids;
                    s.spawn(move || {
                        for (from, to, amount) in chunk {
                            let req = request(ids[from % ids.len()], ids[to % ids.len()], *amount, "1234");
                            let _ = engine.transfer(&req);
                        }
                    });
                }
            });

            prop_assert_eq!(store.total_balance().unwrap(), total_before);
        }
    }
}
