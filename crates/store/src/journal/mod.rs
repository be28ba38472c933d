//! Journal workflow store.
//!
//! The trait captures the journal-approval workflow's persistence contract:
//! create/approve/reject plus the read-only query surface. Implementations
//! must keep multi-table mutations atomic: approval either posts every line
//! (ledger row + balance update + audit event) or leaves no trace.

use async_trait::async_trait;
use thiserror::Error;

use tally_core::{AccountId, DomainError, JournalId, UserId};
use tally_journal::{
    Account, AccountEvent, JournalEntry, JournalFilter, LedgerEntry, NewJournalEntry,
};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryJournalStore;
pub use postgres::PostgresJournalStore;

/// Errors surfaced by journal store implementations.
#[derive(Debug, Error)]
pub enum JournalStoreError {
    /// Deterministic business failure (validation, not-found, lifecycle
    /// conflict).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Any database failure. The unit of work has already been rolled back
    /// when this surfaces.
    #[error("persistence failure in {op}: {message}")]
    Persistence { op: &'static str, message: String },
}

impl JournalStoreError {
    pub fn persistence(op: &'static str, message: impl Into<String>) -> Self {
        Self::Persistence {
            op,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::Domain(DomainError::NotFound)
    }
}

pub(crate) fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> JournalStoreError {
    JournalStoreError::persistence(op, err.to_string())
}

/// Persistence contract of the journal workflow engine.
///
/// The engine is the sole writer of journal/ledger/account/event state; the
/// query operations are read-only.
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Validate and persist a new entry with status `pending`.
    ///
    /// Fails with a validation error (and persists nothing) when debits and
    /// credits do not balance.
    async fn create_entry(&self, new: &NewJournalEntry) -> Result<JournalId, JournalStoreError>;

    /// Approve a pending entry and post its lines.
    ///
    /// One atomic unit of work: set status `approved`, then for each stored
    /// line read the account balance, insert a ledger row with
    /// `new_balance = balance + debit - credit`, update the account, and
    /// append an audit event attributed to `approver`. Returns the posted
    /// ledger rows.
    async fn approve_entry(
        &self,
        id: JournalId,
        approver: UserId,
    ) -> Result<Vec<LedgerEntry>, JournalStoreError>;

    /// Reject a pending entry, storing `comment` inside its payload. Line
    /// items are preserved.
    async fn reject_entry(&self, id: JournalId, comment: &str) -> Result<(), JournalStoreError>;

    async fn entry(&self, id: JournalId) -> Result<JournalEntry, JournalStoreError>;

    /// Optional conjunctive filters; no ordering contract.
    async fn entries(&self, filter: &JournalFilter)
        -> Result<Vec<JournalEntry>, JournalStoreError>;

    /// Substring match across payload text and description. The pattern is
    /// bound as a parameter, never interpolated.
    async fn search_entries(&self, text: &str) -> Result<Vec<JournalEntry>, JournalStoreError>;

    /// Store a serialized document blob against the entry, overwriting any
    /// prior attachment.
    async fn attach_documents(&self, id: JournalId, blob: &[u8])
        -> Result<(), JournalStoreError>;

    async fn account(&self, id: AccountId) -> Result<Account, JournalStoreError>;

    /// Audit rows for one account, newest first.
    async fn account_events(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<AccountEvent>, JournalStoreError>;
}
