//! Account store boundary.
//!
//! The store is the sole mutator of card balances. It exposes per-card lookup,
//! metadata persistence and two optimistic compare-and-swap primitives; the
//! transfer engine builds its retry loop on top of them.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryAccountStore;
pub use r#trait::{AccountStore, BalanceSwap, StoreError};
