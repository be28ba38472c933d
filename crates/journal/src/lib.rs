//! `tally-journal`: double-entry journal domain.
//!
//! Pure domain types and rules for the journal-approval workflow: line items,
//! the balance invariant, the status lifecycle, and posting arithmetic.
//! Persistence lives in `tally-store`.

pub mod entry;

pub use entry::{
    Account, AccountEvent, JournalEntry, JournalFilter, JournalLine, JournalPayload,
    JournalStatus, NewJournalEntry,
};
pub use entry::LedgerEntry;
