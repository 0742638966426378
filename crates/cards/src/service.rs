//! Card operations on behalf of an authenticated principal.
//!
//! Role gating (who may call an operation at all) happens in the access guard
//! before these methods run. What remains here is per-card ownership: only the
//! owner, or a principal at [`DELEGATE_TIER`] or above, may modify a card.

use thiserror::Error;

use cyberbank_auth::{Principal, Role};
use cyberbank_core::{CardId, DomainError, ErrorKind, Reason};

use crate::card::{validate_title, Card, CardKind, NewCard};
use crate::store::{AccountStore, StoreError};
use crate::transfer::{RetryPolicy, TransferEngine, TransferError, TransferReceipt, TransferRequest};

/// Lowest tier allowed to act on somebody else's card.
pub const DELEGATE_TIER: Role = Role::Moder;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl Reason for CardError {
    fn kind(&self) -> ErrorKind {
        match self {
            CardError::Domain(e) => e.kind(),
            CardError::Store(e) => e.kind(),
            CardError::Transfer(e) => e.kind(),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            CardError::Domain(e) => e.code(),
            CardError::Store(e) => e.code(),
            CardError::Transfer(e) => e.code(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CardService<S> {
    store: S,
    engine: TransferEngine<S>,
}

impl<S: AccountStore + Clone> CardService<S> {
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            engine: TransferEngine::new(store.clone(), retry),
            store,
        }
    }

    /// Issue a new card owned by the caller.
    pub fn create(&self, principal: &Principal, kind: CardKind, new: NewCard) -> Result<Card, CardError> {
        let draft = new.into_draft(principal.user_id(), kind)?;
        let card = self.store.insert(draft)?;
        tracing::info!(card = %card.id, owner = %card.owner, kind = %kind, "card issued");
        Ok(card)
    }

    pub fn change_title(&self, principal: &Principal, id: CardId, title: &str) -> Result<Card, CardError> {
        let title = validate_title(title)?;
        let mut card = self.owned(principal, id)?;
        card.title = title;
        self.store.save(&card)?;
        Ok(card)
    }

    pub fn delete(&self, principal: &Principal, id: CardId) -> Result<(), CardError> {
        self.owned(principal, id)?;
        if !self.store.delete(id)? {
            return Err(DomainError::not_found("card").into());
        }
        tracing::info!(card = %id, by = %principal.user_id(), "card deleted");
        Ok(())
    }

    pub fn list_own(&self, principal: &Principal) -> Result<Vec<Card>, CardError> {
        Ok(self.store.list_by_owner(principal.user_id())?)
    }

    pub fn list_all(&self) -> Result<Vec<Card>, CardError> {
        Ok(self.store.list()?)
    }

    /// The PIN on the source card is what authorizes the debit.
    pub fn transfer(&self, principal: &Principal, req: &TransferRequest) -> Result<TransferReceipt, CardError> {
        self.engine.transfer(req).map_err(|e| {
            tracing::info!(
                user_id = %principal.user_id(),
                sender = %req.sender,
                reason = e.code(),
                "transfer rejected"
            );
            CardError::from(e)
        })
    }

    /// Test funding: credit `amount` to any card.
    pub fn fund(&self, principal: &Principal, id: CardId, amount: i64) -> Result<Card, CardError> {
        let card = self.engine.credit(id, amount)?;
        tracing::warn!(card = %id, amount, by = %principal.user_id(), "test funding applied");
        Ok(card)
    }

    fn owned(&self, principal: &Principal, id: CardId) -> Result<Card, CardError> {
        let card = self
            .store
            .find_by_id(id)?
            .ok_or(DomainError::not_found("card"))?;
        if !principal.acts_for(card.owner, DELEGATE_TIER) {
            return Err(DomainError::forbidden(format!("card {id} belongs to another user")).into());
        }
        Ok(card)
    }
}
