//! `cyberbank-cards` — card accounts, the account store and the transfer engine.
//!
//! Nothing here knows about HTTP; callers arrive with an already admitted
//! [`cyberbank_auth::Principal`].

pub mod card;
pub mod service;
pub mod store;
pub mod transfer;

pub use card::{Card, CardDraft, CardKind, NewCard, Pin};
pub use service::{CardError, CardService, DELEGATE_TIER};
pub use store::{AccountStore, BalanceSwap, InMemoryAccountStore, StoreError};
pub use transfer::{RetryPolicy, TransferEngine, TransferError, TransferReceipt, TransferRequest};
