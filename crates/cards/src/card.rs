use serde::{Deserialize, Serialize};

use cyberbank_core::{CardId, DomainError, UserId};

/// Card product type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Debit,
    Credit,
}

impl core::fmt::Display for CardKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            CardKind::Debit => "debit",
            CardKind::Credit => "credit",
        })
    }
}

/// Card PIN: exactly four ASCII digits.
///
/// Only ever compared for an exact match. `Debug` is redacted and there is no
/// `Serialize` impl, so a PIN cannot end up in a response or a log line.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub const LEN: usize = 4;

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DomainError::validation("pin must be exactly 4 digits"))
        }
    }

    /// Exact comparison; no trimming or normalization of the presented value.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes() == presented.as_bytes()
    }
}

impl core::fmt::Debug for Pin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Pin(****)")
    }
}

/// A card account.
///
/// `balance` is in minor units and can only change through the account store's
/// compare-and-swap primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: CardId,
    pub owner: UserId,
    pub kind: CardKind,
    #[serde(skip_serializing)]
    pin: Pin,
    pub balance: u64,
    pub title: String,
}

impl Card {
    pub fn from_draft(id: CardId, draft: CardDraft) -> Self {
        Self {
            id,
            owner: draft.owner,
            kind: draft.kind,
            pin: draft.pin,
            balance: draft.balance,
            title: draft.title,
        }
    }

    pub fn pin_matches(&self, presented: &str) -> bool {
        self.pin.matches(presented)
    }
}

/// A validated card that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDraft {
    pub owner: UserId,
    pub kind: CardKind,
    pub pin: Pin,
    pub balance: u64,
    pub title: String,
}

/// Card issuance request as received from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCard {
    pub title: String,
    pub pin: String,
    #[serde(default)]
    pub initial_balance: u64,
}

impl NewCard {
    /// Validate into a draft owned by `owner`.
    pub fn into_draft(self, owner: UserId, kind: CardKind) -> Result<CardDraft, DomainError> {
        let title = validate_title(&self.title)?;
        let pin = Pin::parse(&self.pin)?;
        Ok(CardDraft {
            owner,
            kind,
            pin,
            balance: self.initial_balance,
            title,
        })
    }
}

/// Titles are trimmed and must not be empty.
pub fn validate_title(raw: &str) -> Result<String, DomainError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(DomainError::validation("card title cannot be empty"));
    }
    Ok(title.to_string())
}
