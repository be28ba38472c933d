//! Integration tests for the journal-approval and identity workflows over
//! the in-memory stores.
//!
//! Verifies:
//! - balance validation persists nothing on failure
//! - approval posts exactly one ledger row + balance update + audit event
//!   per line, all-or-nothing
//! - the status lifecycle is pending-only
//! - login credential, expiry, and duplicate-user paths

mod tests {
    use chrono::{Duration, Utc};

    use tally_core::{AccountId, DomainError, JournalId, UserId};
    use tally_identity::{IdentityError, NewUser, PasswordHasher, Role};
    use tally_journal::{JournalLine, JournalStatus, NewJournalEntry};

    use crate::identity::{login, register, InMemoryIdentityStore};
    use crate::journal::{InMemoryJournalStore, JournalStore, JournalStoreError};

    fn line(account: i64, debit: i64, credit: i64) -> JournalLine {
        JournalLine {
            account_id: AccountId::new(account),
            debit,
            credit,
        }
    }

    fn rent_entry() -> NewJournalEntry {
        NewJournalEntry {
            transaction_date: Utc::now(),
            lines: vec![line(1, 0, 100), line(2, 100, 0)],
            description: "rent".to_string(),
            created_by: UserId::new(),
        }
    }

    fn seeded_store() -> InMemoryJournalStore {
        let store = InMemoryJournalStore::new();
        store.seed_account(AccountId::new(1), "Cash", 1_000);
        store.seed_account(AccountId::new(2), "Rent Expense", 0);
        store
    }

    /// Fast stand-in for bcrypt.
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, plain: &str) -> Result<String, IdentityError> {
            Ok(format!("hashed:{plain}"))
        }

        fn verify(&self, plain: &str, hash: &str) -> Result<bool, IdentityError> {
            Ok(hash == format!("hashed:{plain}"))
        }
    }

    fn ian() -> NewUser {
        NewUser {
            first_name: "Ian".to_string(),
            last_name: "Ledger".to_string(),
            username: "ian".to_string(),
            email: "ian@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
        }
    }

    #[tokio::test]
    async fn unbalanced_entry_persists_nothing() {
        let store = seeded_store();
        let mut entry = rent_entry();
        entry.lines[1].debit = 90;

        let err = store.create_entry(&entry).await.unwrap_err();
        assert!(matches!(
            err,
            JournalStoreError::Domain(DomainError::Validation(_))
        ));

        let all = store.entries(&Default::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn rent_scenario_posts_both_sides() {
        let store = seeded_store();
        let approver = UserId::new();

        let id = store.create_entry(&rent_entry()).await.unwrap();
        assert_eq!(
            store.entry(id).await.unwrap().status,
            JournalStatus::Pending
        );

        let posted = store.approve_entry(id, approver).await.unwrap();
        assert_eq!(posted.len(), 2);

        // Account 1 credited 100, account 2 debited 100.
        let cash = store.account(AccountId::new(1)).await.unwrap();
        assert_eq!(cash.balance, 900);
        let rent = store.account(AccountId::new(2)).await.unwrap();
        assert_eq!(rent.balance, 100);

        assert_eq!(store.ledger_rows().len(), 2);
        for row in store.ledger_rows() {
            assert_eq!(row.journal_id, id);
        }

        let cash_events = store.account_events(AccountId::new(1)).await.unwrap();
        assert_eq!(cash_events.len(), 1);
        assert_eq!(cash_events[0].before_image, 1_000);
        assert_eq!(cash_events[0].after_image, 900);
        assert_eq!(cash_events[0].changed_by_user_id, approver);

        assert_eq!(
            store.entry(id).await.unwrap().status,
            JournalStatus::Approved
        );
    }

    #[tokio::test]
    async fn new_balance_tracks_each_line() {
        let store = seeded_store();
        store.seed_account(AccountId::new(3), "Payable", 500);

        let entry = NewJournalEntry {
            transaction_date: Utc::now(),
            lines: vec![line(1, 250, 0), line(2, 0, 150), line(3, 0, 100)],
            description: "settlement".to_string(),
            created_by: UserId::new(),
        };
        let id = store.create_entry(&entry).await.unwrap();
        let posted = store.approve_entry(id, UserId::new()).await.unwrap();

        assert_eq!(posted[0].new_balance, 1_250);
        assert_eq!(posted[1].new_balance, -150);
        assert_eq!(posted[2].new_balance, 400);
    }

    #[tokio::test]
    async fn approving_unknown_id_leaves_no_partial_writes() {
        let store = seeded_store();
        let err = store
            .approve_entry(JournalId::new(), UserId::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JournalStoreError::Domain(DomainError::NotFound)
        ));
        assert!(store.ledger_rows().is_empty());
        assert_eq!(store.account(AccountId::new(1)).await.unwrap().balance, 1_000);
    }

    #[tokio::test]
    async fn missing_account_aborts_the_whole_approval() {
        let store = InMemoryJournalStore::new();
        store.seed_account(AccountId::new(1), "Cash", 1_000);
        // Account 2 is never seeded.
        let id = store.create_entry(&rent_entry()).await.unwrap();

        let err = store.approve_entry(id, UserId::new()).await.unwrap_err();
        assert!(matches!(err, JournalStoreError::Persistence { .. }));

        // Nothing posted, status untouched.
        assert!(store.ledger_rows().is_empty());
        assert_eq!(store.account(AccountId::new(1)).await.unwrap().balance, 1_000);
        assert_eq!(
            store.entry(id).await.unwrap().status,
            JournalStatus::Pending
        );
    }

    #[tokio::test]
    async fn overflowing_balance_aborts_the_whole_approval() {
        let store = seeded_store();
        store.seed_account(AccountId::new(3), "Saturated", i64::MAX);

        let entry = NewJournalEntry {
            transaction_date: Utc::now(),
            lines: vec![line(3, 100, 0), line(1, 0, 100)],
            description: "overflow".to_string(),
            created_by: UserId::new(),
        };
        let id = store.create_entry(&entry).await.unwrap();

        let err = store.approve_entry(id, UserId::new()).await.unwrap_err();
        assert!(matches!(err, JournalStoreError::Persistence { .. }));

        assert!(store.ledger_rows().is_empty());
        assert_eq!(store.account(AccountId::new(1)).await.unwrap().balance, 1_000);
        assert_eq!(
            store.entry(id).await.unwrap().status,
            JournalStatus::Pending
        );
    }

    #[tokio::test]
    async fn rejection_keeps_lines_and_adds_comment() {
        let store = seeded_store();
        let id = store.create_entry(&rent_entry()).await.unwrap();

        store.reject_entry(id, "wrong period").await.unwrap();

        let entry = store.entry(id).await.unwrap();
        assert_eq!(entry.status, JournalStatus::Rejected);
        assert_eq!(entry.payload.entries, rent_entry().lines);
        assert_eq!(entry.payload.rejection_comment.as_deref(), Some("wrong period"));
    }

    #[tokio::test]
    async fn terminal_entries_refuse_further_transitions() {
        let store = seeded_store();
        let id = store.create_entry(&rent_entry()).await.unwrap();
        store.approve_entry(id, UserId::new()).await.unwrap();

        let err = store.approve_entry(id, UserId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            JournalStoreError::Domain(DomainError::Conflict(_))
        ));
        let err = store.reject_entry(id, "too late").await.unwrap_err();
        assert!(matches!(
            err,
            JournalStoreError::Domain(DomainError::Conflict(_))
        ));

        // Re-approval posted nothing extra.
        assert_eq!(store.ledger_rows().len(), 2);
    }

    #[tokio::test]
    async fn filters_are_conjunctive() {
        let store = seeded_store();
        let old = NewJournalEntry {
            transaction_date: Utc::now() - Duration::days(30),
            ..rent_entry()
        };
        let recent = rent_entry();

        let old_id = store.create_entry(&old).await.unwrap();
        let recent_id = store.create_entry(&recent).await.unwrap();
        store.approve_entry(old_id, UserId::new()).await.unwrap();

        let filter = tally_journal::JournalFilter {
            status: Some(JournalStatus::Pending),
            date_from: Some(Utc::now() - Duration::days(7)),
            date_to: None,
        };
        let found = store.entries(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, recent_id);
    }

    #[tokio::test]
    async fn search_matches_payload_and_description() {
        let store = seeded_store();
        let id = store.create_entry(&rent_entry()).await.unwrap();

        let by_description = store.search_entries("rent").await.unwrap();
        assert_eq!(by_description.len(), 1);
        assert_eq!(by_description[0].id, id);

        // "100" only appears inside the serialized payload.
        let by_amount = store.search_entries("100").await.unwrap();
        assert_eq!(by_amount.len(), 1);

        assert!(store.search_entries("payroll").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_attachment_overwrites_the_first() {
        let store = seeded_store();
        let id = store.create_entry(&rent_entry()).await.unwrap();

        store.attach_documents(id, b"first").await.unwrap();
        store.attach_documents(id, b"second").await.unwrap();

        assert_eq!(store.document_blob(id).as_deref(), Some(&b"second"[..]));
    }

    #[tokio::test]
    async fn login_round_trip_returns_role() {
        let store = InMemoryIdentityStore::new();
        let hasher = PlainHasher;

        register(&store, &hasher, &ian()).await.unwrap();
        let user = login(&store, &hasher, "ian", "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(user.username, "ian");
        assert_eq!(user.role, Role::Accountant);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_read_the_same() {
        let store = InMemoryIdentityStore::new();
        let hasher = PlainHasher;
        register(&store, &hasher, &ian()).await.unwrap();

        let err = login(&store, &hasher, "ian", "wrong").await.unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
        let err = login(&store, &hasher, "nobody", "hunter2hunter2")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
    }

    #[tokio::test]
    async fn correct_but_old_password_is_expired() {
        let store = InMemoryIdentityStore::new();
        let hasher = PlainHasher;
        let user_id = register(&store, &hasher, &ian()).await.unwrap();

        store.age_current_password(user_id, Utc::now() - Duration::days(120));

        let err = login(&store, &hasher, "ian", "hunter2hunter2")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::PasswordExpired);
    }

    #[tokio::test]
    async fn missing_current_password_row_is_its_own_error() {
        let store = InMemoryIdentityStore::new();
        let hasher = PlainHasher;
        let user_id = register(&store, &hasher, &ian()).await.unwrap();

        store.clear_current_password(user_id);

        let err = login(&store, &hasher, "ian", "hunter2hunter2")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::NoCurrentPassword);
    }

    #[tokio::test]
    async fn duplicate_username_or_email_inserts_nothing() {
        let store = InMemoryIdentityStore::new();
        let hasher = PlainHasher;
        register(&store, &hasher, &ian()).await.unwrap();

        let mut same_username = ian();
        same_username.email = "other@example.com".to_string();
        let err = register(&store, &hasher, &same_username).await.unwrap_err();
        assert_eq!(err, IdentityError::DuplicateUser);

        let mut same_email = ian();
        same_email.username = "ian2".to_string();
        let err = register(&store, &hasher, &same_email).await.unwrap_err();
        assert_eq!(err, IdentityError::DuplicateUser);

        assert_eq!(store.user_count(), 1);
    }
}
