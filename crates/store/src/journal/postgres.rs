//! Postgres-backed journal store.
//!
//! Multi-table mutations run inside a single `sqlx` transaction; a
//! transaction dropped without commit rolls back, so every early-return
//! error path leaves the database untouched. Approval locks the journal row
//! (`FOR UPDATE`) so concurrent approvals of the same entry serialize and
//! the loser observes a non-pending status.
//!
//! All queries bind values through `$n` placeholders; user input is never
//! interpolated into SQL text. The search pattern is built by wrapping the
//! input in `%` wildcards and binding the result as a parameter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use tally_core::{AccountId, JournalId, UserId};
use tally_journal::{
    Account, AccountEvent, JournalEntry, JournalFilter, JournalPayload, JournalStatus,
    LedgerEntry, NewJournalEntry,
};

use super::{map_sqlx_error, JournalStore, JournalStoreError};

#[derive(Debug, Clone)]
pub struct PostgresJournalStore {
    pool: Arc<PgPool>,
}

impl PostgresJournalStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn entry_from_row(row: &PgRow) -> Result<JournalEntry, JournalStoreError> {
    let status_text: String = row
        .try_get("status")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;
    let status = JournalStatus::parse(&status_text)?;

    let payload_json: serde_json::Value = row
        .try_get("payload")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;
    let payload: JournalPayload = serde_json::from_value(payload_json)
        .map_err(|e| JournalStoreError::persistence("decode_journal_row", e.to_string()))?;

    let id: uuid::Uuid = row
        .try_get("journal_id")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;
    let created_by: uuid::Uuid = row
        .try_get("created_by")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;
    let transaction_date: DateTime<Utc> = row
        .try_get("transaction_date")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;
    let description: String = row
        .try_get("description")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| map_sqlx_error("decode_journal_row", e))?;

    Ok(JournalEntry {
        id: JournalId::from_uuid(id),
        transaction_date,
        status,
        payload,
        description,
        created_by: UserId::from_uuid(created_by),
        created_at,
    })
}

const SELECT_JOURNAL: &str = r#"
    SELECT
        journal_id,
        transaction_date,
        status,
        payload,
        description,
        created_by,
        created_at
    FROM journal
"#;

#[async_trait]
impl JournalStore for PostgresJournalStore {
    #[instrument(skip(self, new), fields(lines = new.lines.len()), err)]
    async fn create_entry(&self, new: &NewJournalEntry) -> Result<JournalId, JournalStoreError> {
        new.validate()?;

        let id = JournalId::new();
        let payload = serde_json::to_value(new.clone().into_payload())
            .map_err(|e| JournalStoreError::persistence("create_entry", e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO journal (
                journal_id,
                transaction_date,
                status,
                payload,
                description,
                created_by
            )
            VALUES ($1, $2, 'pending', $3, $4, $5)
            "#,
        )
        .bind(id.as_uuid())
        .bind(new.transaction_date)
        .bind(&payload)
        .bind(&new.description)
        .bind(new.created_by.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_entry", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(id)
    }

    #[instrument(skip(self), fields(journal_id = %id, approver = %approver), err)]
    async fn approve_entry(
        &self,
        id: JournalId,
        approver: UserId,
    ) -> Result<Vec<LedgerEntry>, JournalStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Row lock serializes concurrent approvals of the same entry.
        let row = sqlx::query("SELECT status, payload FROM journal WHERE journal_id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("approve_entry", e))?
            .ok_or_else(JournalStoreError::not_found)?;

        let status_text: String = row
            .try_get("status")
            .map_err(|e| map_sqlx_error("approve_entry", e))?;
        JournalStatus::parse(&status_text)?.ensure_pending()?;

        let payload_json: serde_json::Value = row
            .try_get("payload")
            .map_err(|e| map_sqlx_error("approve_entry", e))?;
        let payload: JournalPayload = serde_json::from_value(payload_json)
            .map_err(|e| JournalStoreError::persistence("approve_entry", e.to_string()))?;

        sqlx::query("UPDATE journal SET status = 'approved' WHERE journal_id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("approve_entry", e))?;

        let mut posted = Vec::with_capacity(payload.entries.len());

        for line in &payload.entries {
            let account_row =
                sqlx::query("SELECT balance FROM accounts WHERE account_id = $1 FOR UPDATE")
                    .bind(line.account_id.as_i64())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("approve_entry", e))?
                    .ok_or_else(|| {
                        JournalStoreError::persistence(
                            "approve_entry",
                            format!("account {} does not exist", line.account_id),
                        )
                    })?;

            let current_balance: i64 = account_row
                .try_get("balance")
                .map_err(|e| map_sqlx_error("approve_entry", e))?;
            let new_balance = line.post(current_balance).ok_or_else(|| {
                JournalStoreError::persistence(
                    "approve_entry",
                    format!("balance overflow on account {}", line.account_id),
                )
            })?;
            let entry_date = Utc::now();

            sqlx::query(
                r#"
                INSERT INTO ledger_entries (
                    journal_id,
                    account_id,
                    debit,
                    credit,
                    entry_date,
                    new_balance
                )
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id.as_uuid())
            .bind(line.account_id.as_i64())
            .bind(line.debit)
            .bind(line.credit)
            .bind(entry_date)
            .bind(new_balance)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("approve_entry", e))?;

            sqlx::query("UPDATE accounts SET balance = $1 WHERE account_id = $2")
                .bind(new_balance)
                .bind(line.account_id.as_i64())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("approve_entry", e))?;

            sqlx::query(
                r#"
                INSERT INTO account_events (
                    account_id,
                    before_image,
                    after_image,
                    changed_by_user_id,
                    event_time
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(line.account_id.as_i64())
            .bind(current_balance)
            .bind(new_balance)
            .bind(approver.as_uuid())
            .bind(entry_date)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("approve_entry", e))?;

            posted.push(LedgerEntry {
                journal_id: id,
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                entry_date,
                new_balance,
            });
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(posted)
    }

    #[instrument(skip(self, comment), fields(journal_id = %id), err)]
    async fn reject_entry(&self, id: JournalId, comment: &str) -> Result<(), JournalStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE journal
            SET status = 'rejected',
                payload = jsonb_set(payload, '{rejection_comment}', to_jsonb($2::text))
            WHERE journal_id = $1 AND status = 'pending'
            "#,
        )
        .bind(id.as_uuid())
        .bind(comment)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reject_entry", e))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing updated: distinguish missing from already-terminal.
        let row = sqlx::query("SELECT status FROM journal WHERE journal_id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("reject_entry", e))?
            .ok_or_else(JournalStoreError::not_found)?;

        let status_text: String = row
            .try_get("status")
            .map_err(|e| map_sqlx_error("reject_entry", e))?;
        JournalStatus::parse(&status_text)?.ensure_pending()?;
        Ok(())
    }

    #[instrument(skip(self), fields(journal_id = %id), err)]
    async fn entry(&self, id: JournalId) -> Result<JournalEntry, JournalStoreError> {
        let row = sqlx::query(&format!("{SELECT_JOURNAL} WHERE journal_id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_entry", e))?
            .ok_or_else(JournalStoreError::not_found)?;

        entry_from_row(&row)
    }

    #[instrument(skip(self, filter), err)]
    async fn entries(
        &self,
        filter: &JournalFilter,
    ) -> Result<Vec<JournalEntry>, JournalStoreError> {
        let rows = sqlx::query(&format!(
            r#"
            {SELECT_JOURNAL}
            WHERE ($1::text IS NULL OR status = $1::text)
              AND ($2::timestamptz IS NULL OR transaction_date >= $2::timestamptz)
              AND ($3::timestamptz IS NULL OR transaction_date <= $3::timestamptz)
            "#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    #[instrument(skip(self, text), err)]
    async fn search_entries(&self, text: &str) -> Result<Vec<JournalEntry>, JournalStoreError> {
        let pattern = format!("%{text}%");
        let rows = sqlx::query(&format!(
            "{SELECT_JOURNAL} WHERE payload::text LIKE $1 OR description LIKE $1"
        ))
        .bind(&pattern)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    #[instrument(skip(self, blob), fields(journal_id = %id, bytes = blob.len()), err)]
    async fn attach_documents(
        &self,
        id: JournalId,
        blob: &[u8],
    ) -> Result<(), JournalStoreError> {
        let result = sqlx::query("UPDATE journal SET file_data = $2 WHERE journal_id = $1")
            .bind(id.as_uuid())
            .bind(blob)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("attach_documents", e))?;

        if result.rows_affected() == 0 {
            return Err(JournalStoreError::not_found());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn account(&self, id: AccountId) -> Result<Account, JournalStoreError> {
        let row = sqlx::query("SELECT account_id, name, balance FROM accounts WHERE account_id = $1")
            .bind(id.as_i64())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?
            .ok_or_else(JournalStoreError::not_found)?;

        let account_id: i64 = row
            .try_get("account_id")
            .map_err(|e| map_sqlx_error("get_account", e))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| map_sqlx_error("get_account", e))?;
        let balance: i64 = row
            .try_get("balance")
            .map_err(|e| map_sqlx_error("get_account", e))?;

        Ok(Account {
            account_id: AccountId::new(account_id),
            name,
            balance,
        })
    }

    #[instrument(skip(self), fields(account_id = %account_id), err)]
    async fn account_events(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<AccountEvent>, JournalStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                account_id,
                before_image,
                after_image,
                changed_by_user_id,
                event_time
            FROM account_events
            WHERE account_id = $1
            ORDER BY event_time DESC
            "#,
        )
        .bind(account_id.as_i64())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("account_events", e))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let account_id: i64 = row
                .try_get("account_id")
                .map_err(|e| map_sqlx_error("account_events", e))?;
            let before_image: i64 = row
                .try_get("before_image")
                .map_err(|e| map_sqlx_error("account_events", e))?;
            let after_image: i64 = row
                .try_get("after_image")
                .map_err(|e| map_sqlx_error("account_events", e))?;
            let changed_by: uuid::Uuid = row
                .try_get("changed_by_user_id")
                .map_err(|e| map_sqlx_error("account_events", e))?;
            let event_time: DateTime<Utc> = row
                .try_get("event_time")
                .map_err(|e| map_sqlx_error("account_events", e))?;

            events.push(AccountEvent {
                account_id: AccountId::new(account_id),
                before_image,
                after_image,
                changed_by_user_id: UserId::from_uuid(changed_by),
                event_time,
            });
        }
        Ok(events)
    }
}
