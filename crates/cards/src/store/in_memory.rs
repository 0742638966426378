use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cyberbank_core::{CardId, UserId};

use super::r#trait::{AccountStore, BalanceSwap, StoreError};
use crate::card::{Card, CardDraft};

#[derive(Debug)]
struct Accounts {
    cards: BTreeMap<CardId, Card>,
    next_id: i64,
}

/// In-memory account store.
///
/// Every balance write happens under the single write lock, which is what makes
/// the pair CAS atomic with respect to every reader.
#[derive(Debug)]
pub struct InMemoryAccountStore {
    accounts: RwLock<Accounts>,
}

impl Default for InMemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Accounts {
                cards: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Accounts>, StoreError> {
        self.accounts
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Accounts>, StoreError> {
        self.accounts
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    /// Sum of all balances; used to check conservation.
    pub fn total_balance(&self) -> Result<u128, StoreError> {
        let accounts = self.read()?;
        Ok(accounts.cards.values().map(|c| u128::from(c.balance)).sum())
    }
}

fn holds(accounts: &Accounts, swap: &BalanceSwap) -> bool {
    accounts
        .cards
        .get(&swap.id)
        .is_some_and(|c| c.balance == swap.expected)
}

impl AccountStore for InMemoryAccountStore {
    fn find_by_id(&self, id: CardId) -> Result<Option<Card>, StoreError> {
        Ok(self.read()?.cards.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<Card>, StoreError> {
        Ok(self.read()?.cards.values().cloned().collect())
    }

    fn list_by_owner(&self, owner: UserId) -> Result<Vec<Card>, StoreError> {
        Ok(self
            .read()?
            .cards
            .values()
            .filter(|c| c.owner == owner)
            .cloned()
            .collect())
    }

    fn insert(&self, draft: CardDraft) -> Result<Card, StoreError> {
        let mut accounts = self.write()?;
        let id = CardId::new(accounts.next_id);
        accounts.next_id += 1;

        let card = Card::from_draft(id, draft);
        accounts.cards.insert(id, card.clone());
        Ok(card)
    }

    fn save(&self, card: &Card) -> Result<(), StoreError> {
        let mut accounts = self.write()?;
        let stored = accounts
            .cards
            .get_mut(&card.id)
            .ok_or(StoreError::NotFound(card.id))?;

        let balance = stored.balance;
        *stored = card.clone();
        stored.balance = balance;
        Ok(())
    }

    fn delete(&self, id: CardId) -> Result<bool, StoreError> {
        Ok(self.write()?.cards.remove(&id).is_some())
    }

    fn compare_and_swap_balance(&self, swap: BalanceSwap) -> Result<bool, StoreError> {
        let mut accounts = self.write()?;
        match accounts.cards.get_mut(&swap.id) {
            Some(card) if card.balance == swap.expected => {
                card.balance = swap.new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn compare_and_swap_pair(&self, debit: BalanceSwap, credit: BalanceSwap) -> Result<bool, StoreError> {
        // Both legs must name distinct cards; a degenerate pair never applies.
        if debit.id == credit.id {
            return Ok(false);
        }

        let mut accounts = self.write()?;
        if !holds(&accounts, &debit) || !holds(&accounts, &credit) {
            tracing::debug!(debit = %debit.id, credit = %credit.id, "balance changed underneath, cas rejected");
            return Ok(false);
        }

        for swap in [debit, credit] {
            if let Some(card) = accounts.cards.get_mut(&swap.id) {
                card.balance = swap.new;
            }
        }
        Ok(true)
    }
}
