use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use tally_core::{AccountId, DomainError, JournalId, UserId};
use tally_journal::{
    Account, AccountEvent, JournalEntry, JournalFilter, JournalStatus, LedgerEntry,
    NewJournalEntry,
};

use super::{JournalStore, JournalStoreError};

#[derive(Debug, Default)]
struct State {
    journal: HashMap<JournalId, JournalEntry>,
    documents: HashMap<JournalId, Vec<u8>>,
    accounts: HashMap<AccountId, Account>,
    ledger: Vec<LedgerEntry>,
    events: Vec<AccountEvent>,
}

/// In-memory journal store.
///
/// Intended for tests/dev. Mutations take the write lock for their whole
/// unit of work, which gives the same all-or-nothing visibility as the
/// Postgres transactions.
#[derive(Debug, Default)]
pub struct InMemoryJournalStore {
    state: RwLock<State>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger account (the chart of accounts is external input).
    pub fn seed_account(&self, account_id: AccountId, name: impl Into<String>, balance: i64) {
        let mut state = self.state.write().expect("lock poisoned");
        state.accounts.insert(
            account_id,
            Account {
                account_id,
                name: name.into(),
                balance,
            },
        );
    }

    pub fn ledger_rows(&self) -> Vec<LedgerEntry> {
        self.state.read().expect("lock poisoned").ledger.clone()
    }

    pub fn document_blob(&self, id: JournalId) -> Option<Vec<u8>> {
        self.state
            .read()
            .expect("lock poisoned")
            .documents
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn create_entry(&self, new: &NewJournalEntry) -> Result<JournalId, JournalStoreError> {
        new.validate()?;

        let id = JournalId::new();
        let entry = JournalEntry {
            id,
            transaction_date: new.transaction_date,
            status: JournalStatus::Pending,
            payload: new.clone().into_payload(),
            description: new.description.clone(),
            created_by: new.created_by,
            created_at: Utc::now(),
        };

        let mut state = self.state.write().expect("lock poisoned");
        state.journal.insert(id, entry);
        Ok(id)
    }

    async fn approve_entry(
        &self,
        id: JournalId,
        approver: UserId,
    ) -> Result<Vec<LedgerEntry>, JournalStoreError> {
        let mut state = self.state.write().expect("lock poisoned");

        let entry = state.journal.get(&id).ok_or_else(JournalStoreError::not_found)?;
        entry.status.ensure_pending()?;
        let lines = entry.payload.entries.clone();

        // Stage every posting before touching anything, so a missing account
        // leaves no partial writes.
        let mut staged: Vec<(LedgerEntry, AccountEvent)> = Vec::with_capacity(lines.len());
        let mut balances: HashMap<AccountId, i64> = HashMap::new();
        let now = Utc::now();

        for line in &lines {
            let current = match balances.get(&line.account_id) {
                Some(balance) => *balance,
                None => {
                    state
                        .accounts
                        .get(&line.account_id)
                        .ok_or_else(|| {
                            JournalStoreError::persistence(
                                "approve_entry",
                                format!("account {} does not exist", line.account_id),
                            )
                        })?
                        .balance
                }
            };
            let new_balance = line.post(current).ok_or_else(|| {
                JournalStoreError::persistence(
                    "approve_entry",
                    format!("balance overflow on account {}", line.account_id),
                )
            })?;
            balances.insert(line.account_id, new_balance);

            staged.push((
                LedgerEntry {
                    journal_id: id,
                    account_id: line.account_id,
                    debit: line.debit,
                    credit: line.credit,
                    entry_date: now,
                    new_balance,
                },
                AccountEvent {
                    account_id: line.account_id,
                    before_image: current,
                    after_image: new_balance,
                    changed_by_user_id: approver,
                    event_time: now,
                },
            ));
        }

        let entry = state
            .journal
            .get_mut(&id)
            .ok_or_else(JournalStoreError::not_found)?;
        entry.status = JournalStatus::Approved;

        let mut posted = Vec::with_capacity(staged.len());
        for (ledger_row, event) in staged {
            if let Some(account) = state.accounts.get_mut(&ledger_row.account_id) {
                account.balance = ledger_row.new_balance;
            }
            posted.push(ledger_row.clone());
            state.ledger.push(ledger_row);
            state.events.push(event);
        }

        Ok(posted)
    }

    async fn reject_entry(&self, id: JournalId, comment: &str) -> Result<(), JournalStoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        let entry = state.journal.get_mut(&id).ok_or_else(JournalStoreError::not_found)?;
        entry.status.ensure_pending()?;

        entry.status = JournalStatus::Rejected;
        entry.payload.rejection_comment = Some(comment.to_string());
        Ok(())
    }

    async fn entry(&self, id: JournalId) -> Result<JournalEntry, JournalStoreError> {
        self.state
            .read()
            .expect("lock poisoned")
            .journal
            .get(&id)
            .cloned()
            .ok_or_else(JournalStoreError::not_found)
    }

    async fn entries(
        &self,
        filter: &JournalFilter,
    ) -> Result<Vec<JournalEntry>, JournalStoreError> {
        let state = self.state.read().expect("lock poisoned");
        Ok(state
            .journal
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn search_entries(&self, text: &str) -> Result<Vec<JournalEntry>, JournalStoreError> {
        let state = self.state.read().expect("lock poisoned");
        let mut found = Vec::new();
        for entry in state.journal.values() {
            let payload_text = serde_json::to_string(&entry.payload)
                .map_err(|e| JournalStoreError::persistence("search_entries", e.to_string()))?;
            if payload_text.contains(text) || entry.description.contains(text) {
                found.push(entry.clone());
            }
        }
        Ok(found)
    }

    async fn attach_documents(
        &self,
        id: JournalId,
        blob: &[u8],
    ) -> Result<(), JournalStoreError> {
        let mut state = self.state.write().expect("lock poisoned");
        if !state.journal.contains_key(&id) {
            return Err(JournalStoreError::not_found());
        }
        state.documents.insert(id, blob.to_vec());
        Ok(())
    }

    async fn account(&self, id: AccountId) -> Result<Account, JournalStoreError> {
        self.state
            .read()
            .expect("lock poisoned")
            .accounts
            .get(&id)
            .cloned()
            .ok_or(JournalStoreError::Domain(DomainError::NotFound))
    }

    async fn account_events(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<AccountEvent>, JournalStoreError> {
        let state = self.state.read().expect("lock poisoned");
        let mut events: Vec<AccountEvent> = state
            .events
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.event_time.cmp(&a.event_time));
        Ok(events)
    }
}
