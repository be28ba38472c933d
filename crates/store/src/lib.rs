//! Persistence layer: journal and identity stores.
//!
//! Each store is a trait with two implementations: Postgres (`sqlx`, pooled
//! connections, explicit transactions with rollback on every non-commit exit
//! path) and in-memory (tests/dev).

pub mod identity;
pub mod journal;

#[cfg(test)]
mod integration_tests;

pub use identity::{
    login, register, CurrentCredential, IdentityStore, InMemoryIdentityStore,
    PostgresIdentityStore, UserRecord,
};
pub use journal::{
    InMemoryJournalStore, JournalStore, JournalStoreError, PostgresJournalStore,
};
