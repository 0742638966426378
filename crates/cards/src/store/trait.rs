use std::sync::Arc;

use thiserror::Error;

use cyberbank_core::{CardId, ErrorKind, Reason, UserId};

use crate::card::{Card, CardDraft};

/// Account store operation error.
///
/// These are **infrastructure errors**. Business outcomes (insufficient funds,
/// PIN mismatch, ...) are decided by the caller from the snapshots it reads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("card {0} not found")]
    NotFound(CardId),

    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

impl Reason for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Unavailable(_) => ErrorKind::Internal,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "card_not_found",
            StoreError::Unavailable(_) => "store_unavailable",
        }
    }
}

/// One leg of a conditional balance update: `expected` is the balance the
/// caller observed, `new` the balance it wants to write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BalanceSwap {
    pub id: CardId,
    pub expected: u64,
    pub new: u64,
}

/// Card account persistence.
///
/// ## Balance updates
///
/// Balances are never written by `save`. They change only through:
/// - `compare_and_swap_balance`: one card, succeeds iff the stored balance
///   still equals `expected`;
/// - `compare_and_swap_pair`: two cards as one unit, succeeds iff **both**
///   stored balances still equal their `expected` values. Either both writes
///   become visible or neither does.
///
/// A CAS against a card that no longer exists returns `Ok(false)`, so callers
/// re-read and report the missing card through their normal validation.
pub trait AccountStore: Send + Sync {
    fn find_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError>;

    /// All cards ordered by id.
    fn list(&self) -> Result<Vec<Card>, StoreError>;

    fn list_by_owner(&self, owner: UserId) -> Result<Vec<Card>, StoreError>;

    /// Persist a new card and assign its id.
    fn insert(&self, draft: CardDraft) -> Result<Card, StoreError>;

    /// Persist metadata changes (title). The stored balance is kept.
    fn save(&self, card: &Card) -> Result<(), StoreError>;

    /// Remove a card. Returns `false` when it did not exist.
    fn delete(&self, id: CardId) -> Result<bool, StoreError>;

    fn compare_and_swap_balance(&self, swap: BalanceSwap) -> Result<bool, StoreError>;

    fn compare_and_swap_pair(&self, debit: BalanceSwap, credit: BalanceSwap) -> Result<bool, StoreError>;
}

impl<S> AccountStore for Arc<S>
where
    S: AccountStore + ?Sized,
{
    fn find_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        (**self).find_by_id(id)
    }

    fn list(&self) -> Result<Vec<Card>, StoreError> {
        (**self).list()
    }

    fn list_by_owner(&self, owner: UserId) -> Result<Vec<Card>, StoreError> {
        (**self).list_by_owner(owner)
    }

    fn insert(&self, draft: CardDraft) -> Result<Card, StoreError> {
        (**self).insert(draft)
    }

    fn save(&self, card: &Card) -> Result<(), StoreError> {
        (**self).save(card)
    }

    fn delete(&self, id: CardId) -> Result<bool, StoreError> {
        (**self).delete(id)
    }

    fn compare_and_swap_balance(&self, swap: BalanceSwap) -> Result<bool, StoreError> {
        (**self).compare_and_swap_balance(swap)
    }

    fn compare_and_swap_pair(&self, debit: BalanceSwap, credit: BalanceSwap) -> Result<bool, StoreError> {
        (**self).compare_and_swap_pair(debit, credit)
    }
}
