use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_core::UserId;
use tally_identity::{IdentityError, NewUser, Role};

use super::{CurrentCredential, IdentityStore, UserRecord};

#[derive(Debug, Clone)]
struct StoredUser {
    record: UserRecord,
    credential: Option<StoredCredential>,
    role: Role,
}

#[derive(Debug, Clone)]
struct StoredCredential {
    password_hash: String,
    created_at: DateTime<Utc>,
}

/// In-memory identity store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: RwLock<Vec<StoredUser>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate a user's current password (expiry tests).
    pub fn age_current_password(&self, user_id: UserId, created_at: DateTime<Utc>) {
        let mut users = self.users.write().expect("lock poisoned");
        if let Some(credential) = users
            .iter_mut()
            .find(|u| u.record.user_id == user_id)
            .and_then(|u| u.credential.as_mut())
        {
            credential.created_at = created_at;
        }
    }

    /// Drop a user's current password row, leaving the user in place.
    pub fn clear_current_password(&self, user_id: UserId) {
        let mut users = self.users.write().expect("lock poisoned");
        if let Some(user) = users.iter_mut().find(|u| u.record.user_id == user_id) {
            user.credential = None;
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.read().expect("lock poisoned").len()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn create_user(
        &self,
        new: &NewUser,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, IdentityError> {
        let mut users = self.users.write().expect("lock poisoned");

        let taken = users
            .iter()
            .any(|u| u.record.username == new.username || u.record.email == new.email);
        if taken {
            return Err(IdentityError::DuplicateUser);
        }

        let user_id = UserId::new();
        users.push(StoredUser {
            record: UserRecord {
                user_id,
                first_name: new.first_name.clone(),
                last_name: new.last_name.clone(),
                username: new.username.clone(),
                email: new.email.clone(),
            },
            credential: Some(StoredCredential {
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            }),
            role,
        });

        Ok(user_id)
    }

    async fn user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, IdentityError> {
        let users = self.users.read().expect("lock poisoned");
        Ok(users
            .iter()
            .find(|u| u.record.username == username)
            .map(|u| u.record.clone()))
    }

    async fn current_credential(
        &self,
        user_id: UserId,
    ) -> Result<Option<CurrentCredential>, IdentityError> {
        let users = self.users.read().expect("lock poisoned");
        Ok(users
            .iter()
            .find(|u| u.record.user_id == user_id)
            .and_then(|u| {
                u.credential.as_ref().map(|c| CurrentCredential {
                    password_hash: c.password_hash.clone(),
                    created_at: c.created_at,
                    role: u.role,
                })
            }))
    }
}
