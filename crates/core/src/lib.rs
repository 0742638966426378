//! `cyberbank-core` — shared identifiers and the error taxonomy.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, ErrorKind, Reason};
pub use id::{CardId, UserId};
