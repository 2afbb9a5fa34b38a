//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, the only outward dependency of the
//! ledger is the user document store.

pub mod store;

pub use store::{StoreError, UserStore};

#[cfg(test)]
pub use store::MockUserStore;
