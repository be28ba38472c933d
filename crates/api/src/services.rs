use std::sync::Arc;

use sqlx::PgPool;

use tally_identity::{BcryptHasher, PasswordHasher};
use tally_store::{
    IdentityStore, InMemoryIdentityStore, InMemoryJournalStore, JournalStore,
    PostgresIdentityStore, PostgresJournalStore,
};

/// Handles the route handlers work against, injected via `Extension`.
///
/// Stores are trait objects so the same router serves the Postgres and the
/// in-memory (dev/test) backends.
#[derive(Clone)]
pub struct AppServices {
    pub journal: Arc<dyn JournalStore>,
    pub identity: Arc<dyn IdentityStore>,
    pub hasher: Arc<dyn PasswordHasher>,
}

impl AppServices {
    pub fn new(
        journal: Arc<dyn JournalStore>,
        identity: Arc<dyn IdentityStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            journal,
            identity,
            hasher,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryJournalStore::new()),
            Arc::new(InMemoryIdentityStore::new()),
            Arc::new(BcryptHasher::new()),
        )
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(PostgresJournalStore::new(pool.clone())),
            Arc::new(PostgresIdentityStore::new(pool)),
            Arc::new(BcryptHasher::new()),
        )
    }
}
