//! Identity store and the account-identity workflows.
//!
//! The trait exposes persistence primitives (user lookup, current-credential
//! lookup, transactional account creation); [`login`] and [`register`]
//! compose them with a [`PasswordHasher`] into the workflows the HTTP layer
//! calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::UserId;
use tally_identity::{password_expired, IdentityError, NewUser, PasswordHasher, Role, User};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryIdentityStore;
pub use postgres::PostgresIdentityStore;

/// A user row without its role (the role rides on the credential lookup,
/// mirroring the join the login flow performs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

/// The single password row flagged current for a user, joined with the role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentCredential {
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub role: Role,
}

/// Persistence contract of the account-identity layer.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Create user + current password + role assignment in one unit of work.
    ///
    /// Fails with `DuplicateUser` when the username or email is taken,
    /// inserting nothing.
    async fn create_user(
        &self,
        new: &NewUser,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, IdentityError>;

    async fn user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, IdentityError>;

    async fn current_credential(
        &self,
        user_id: UserId,
    ) -> Result<Option<CurrentCredential>, IdentityError>;
}

/// Verify a username/password pair and return the user with their role.
///
/// Order matters: the hash is verified before the age policy, so an expired
/// password with a wrong hash still reads as `InvalidCredentials`.
pub async fn login(
    store: &dyn IdentityStore,
    hasher: &dyn PasswordHasher,
    username: &str,
    password: &str,
) -> Result<User, IdentityError> {
    let record = store
        .user_by_username(username)
        .await?
        .ok_or(IdentityError::InvalidCredentials)?;

    let credential = store
        .current_credential(record.user_id)
        .await?
        .ok_or(IdentityError::NoCurrentPassword)?;

    if !hasher.verify(password, &credential.password_hash)? {
        return Err(IdentityError::InvalidCredentials);
    }

    if password_expired(credential.created_at, Utc::now()) {
        return Err(IdentityError::PasswordExpired);
    }

    Ok(User {
        user_id: record.user_id,
        first_name: record.first_name,
        last_name: record.last_name,
        username: record.username,
        email: record.email,
        role: credential.role,
    })
}

/// Hash the password and create the account with the default role.
pub async fn register(
    store: &dyn IdentityStore,
    hasher: &dyn PasswordHasher,
    new: &NewUser,
) -> Result<UserId, IdentityError> {
    let password_hash = hasher.hash(&new.password)?;
    store.create_user(new, &password_hash, Role::default()).await
}
