use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{AccountId, DomainError, JournalId, UserId};

/// Lifecycle of a journal entry.
///
/// `Pending` is the only non-terminal status: an entry is approved or
/// rejected exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    Pending,
    Approved,
    Rejected,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Pending => "pending",
            JournalStatus::Approved => "approved",
            JournalStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(JournalStatus::Pending),
            "approved" => Ok(JournalStatus::Approved),
            "rejected" => Ok(JournalStatus::Rejected),
            other => Err(DomainError::validation(format!(
                "status must be one of: pending, approved, rejected (got '{other}')"
            ))),
        }
    }

    /// Guard for the pending-only transition rule.
    pub fn ensure_pending(&self) -> Result<(), DomainError> {
        match self {
            JournalStatus::Pending => Ok(()),
            other => Err(DomainError::conflict(format!(
                "journal entry is already {}, only pending entries can transition",
                other.as_str()
            ))),
        }
    }
}

impl core::fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a journal entry.
///
/// Amounts are in smallest currency unit (e.g. cents) and non-negative; a
/// line typically carries either a debit or a credit, never both sides of
/// the invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: AccountId,
    pub debit: i64,
    pub credit: i64,
}

impl JournalLine {
    /// Balance after posting this line: `before + debit - credit`.
    ///
    /// `None` when the result would leave the `i64` range.
    pub fn post(&self, balance: i64) -> Option<i64> {
        balance
            .checked_add(self.debit)
            .and_then(|b| b.checked_sub(self.credit))
    }
}

/// The serialized body of a journal entry, stored as JSON alongside the row.
///
/// Rejection stores its comment inside the payload (the line items are
/// preserved untouched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalPayload {
    pub entries: Vec<JournalLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_comment: Option<String>,
}

impl JournalPayload {
    pub fn new(entries: Vec<JournalLine>) -> Self {
        Self {
            entries,
            rejection_comment: None,
        }
    }
}

/// A journal entry awaiting creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub transaction_date: DateTime<Utc>,
    pub lines: Vec<JournalLine>,
    pub description: String,
    pub created_by: UserId,
}

impl NewJournalEntry {
    /// Zip the parallel `accounts`/`debits`/`credits` arrays of the HTTP
    /// payload into lines. A missing debit or credit defaults to zero.
    pub fn from_parallel(
        transaction_date: DateTime<Utc>,
        accounts: &[i64],
        debits: &[i64],
        credits: &[i64],
        description: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        let lines = accounts
            .iter()
            .enumerate()
            .map(|(idx, account)| JournalLine {
                account_id: AccountId::new(*account),
                debit: debits.get(idx).copied().unwrap_or(0),
                credit: credits.get(idx).copied().unwrap_or(0),
            })
            .collect();

        Self {
            transaction_date,
            lines,
            description: description.into(),
            created_by,
        }
    }

    /// Enforce the double-entry invariant: at least one line, non-negative
    /// amounts, and `sum(debits) == sum(credits)`.
    ///
    /// Totals are accumulated in `i128` so pathological inputs cannot
    /// overflow the check itself.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.lines.is_empty() {
            return Err(DomainError::validation("journal entry must have lines"));
        }

        let mut debit_total: i128 = 0;
        let mut credit_total: i128 = 0;

        for line in &self.lines {
            if line.debit < 0 || line.credit < 0 {
                return Err(DomainError::validation("amounts must be non-negative"));
            }
            debit_total += line.debit as i128;
            credit_total += line.credit as i128;
        }

        if debit_total != credit_total {
            return Err(DomainError::validation(
                "total debits must equal total credits for a valid journal entry",
            ));
        }

        Ok(())
    }

    pub fn into_payload(self) -> JournalPayload {
        JournalPayload::new(self.lines)
    }
}

/// A persisted journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalId,
    pub transaction_date: DateTime<Utc>,
    pub status: JournalStatus,
    pub payload: JournalPayload,
    pub description: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Optional, conjunctive filters for listing journal entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalFilter {
    pub status: Option<JournalStatus>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl JournalFilter {
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if let Some(status) = self.status {
            if entry.status != status {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if entry.transaction_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if entry.transaction_date > to {
                return false;
            }
        }
        true
    }
}

/// A posted, immutable ledger row (one per account line of an approved
/// journal entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub journal_id: JournalId,
    pub account_id: AccountId,
    pub debit: i64,
    pub credit: i64,
    pub entry_date: DateTime<Utc>,
    pub new_balance: i64,
}

/// A ledger account's current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub name: String,
    pub balance: i64,
}

/// Append-only audit row capturing a balance's before/after images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEvent {
    pub account_id: AccountId,
    pub before_image: i64,
    pub after_image: i64,
    pub changed_by_user_id: UserId,
    pub event_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn line(account: i64, debit: i64, credit: i64) -> JournalLine {
        JournalLine {
            account_id: AccountId::new(account),
            debit,
            credit,
        }
    }

    fn entry_with(lines: Vec<JournalLine>) -> NewJournalEntry {
        NewJournalEntry {
            transaction_date: Utc::now(),
            lines,
            description: "test".to_string(),
            created_by: UserId::new(),
        }
    }

    #[test]
    fn balanced_entry_validates() {
        let entry = entry_with(vec![line(1, 0, 10_000), line(2, 10_000, 0)]);
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn unbalanced_entry_is_rejected() {
        let entry = entry_with(vec![line(1, 100, 0), line(2, 0, 90)]);
        let err = entry.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn empty_entry_is_rejected() {
        let entry = entry_with(vec![]);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let entry = entry_with(vec![line(1, -100, 0), line(2, 0, -100)]);
        assert!(entry.validate().is_err());
    }

    #[test]
    fn parallel_arrays_zip_with_zero_defaults() {
        let entry = NewJournalEntry::from_parallel(
            Utc::now(),
            &[1, 2, 3],
            &[0, 100],
            &[100, 0],
            "rent",
            UserId::new(),
        );
        assert_eq!(entry.lines.len(), 3);
        assert_eq!(entry.lines[0].credit, 100);
        assert_eq!(entry.lines[1].debit, 100);
        // Missing trailing amounts default to zero on both sides.
        assert_eq!(entry.lines[2].debit, 0);
        assert_eq!(entry.lines[2].credit, 0);
    }

    #[test]
    fn posting_applies_debit_minus_credit() {
        let l = line(1, 250, 0);
        assert_eq!(l.post(1_000), Some(1_250));
        let l = line(1, 0, 250);
        assert_eq!(l.post(1_000), Some(750));
    }

    #[test]
    fn posting_refuses_to_overflow() {
        let l = line(1, 1, 0);
        assert_eq!(l.post(i64::MAX), None);
        let l = line(1, 0, 1);
        assert_eq!(l.post(i64::MIN), None);
    }

    #[test]
    fn terminal_statuses_refuse_transition() {
        assert!(JournalStatus::Pending.ensure_pending().is_ok());
        assert!(JournalStatus::Approved.ensure_pending().is_err());
        assert!(JournalStatus::Rejected.ensure_pending().is_err());
    }

    #[test]
    fn rejection_comment_is_omitted_when_absent() {
        let payload = JournalPayload::new(vec![line(1, 5, 0), line(2, 0, 5)]);
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("rejection_comment").is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: pairing every amount as one debit and one credit always
        /// yields a valid entry, and posting all lines moves net balance by
        /// zero across the touched accounts.
        #[test]
        fn balanced_entries_always_validate(
            amounts in prop::collection::vec(1i64..1_000_000i64, 1..10)
        ) {
            let mut lines = Vec::new();
            for (idx, amount) in amounts.iter().enumerate() {
                lines.push(line(idx as i64 * 2, *amount, 0));
                lines.push(line(idx as i64 * 2 + 1, 0, *amount));
            }
            let entry = entry_with(lines.clone());
            prop_assert!(entry.validate().is_ok());

            let net: i128 = lines
                .iter()
                .map(|l| l.post(0).unwrap() as i128)
                .sum();
            prop_assert_eq!(net, 0);
        }

        /// Property: perturbing a single side breaks the invariant.
        #[test]
        fn perturbed_entries_fail_validation(
            amount in 1i64..1_000_000i64,
            skew in 1i64..1_000i64,
        ) {
            let entry = entry_with(vec![
                line(1, amount + skew, 0),
                line(2, 0, amount),
            ]);
            prop_assert!(entry.validate().is_err());
        }
    }
}
