//! Identity error taxonomy.

use thiserror::Error;

/// Failures of the account-identity layer.
///
/// `InvalidCredentials` deliberately covers both "unknown username" and
/// "wrong password" so responses do not leak which half failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("no current password found")]
    NoCurrentPassword,

    #[error("Password is Expired")]
    PasswordExpired,

    #[error("username or email already exists")]
    DuplicateUser,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl IdentityError {
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
