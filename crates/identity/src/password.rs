//! Password hashing seam and the age policy.

use chrono::{DateTime, Duration, Utc};

use crate::error::IdentityError;

/// Passwords older than this many days no longer authenticate, even when the
/// hash matches.
pub const PASSWORD_MAX_AGE_DAYS: i64 = 90;

/// True when a password created at `created_at` has exceeded the age policy
/// as of `now`.
pub fn password_expired(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    created_at < now - Duration::days(PASSWORD_MAX_AGE_DAYS)
}

/// Hashing/verification seam.
///
/// The store and the login workflow only see this trait; production wires
/// [`BcryptHasher`], tests may use a cheap cost factor or a fake.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, IdentityError>;
    fn verify(&self, plain: &str, hash: &str) -> Result<bool, IdentityError>;
}

/// bcrypt-backed implementation.
#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Lower cost factors are only appropriate for tests.
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> Result<String, IdentityError> {
        bcrypt::hash(plain, self.cost).map_err(|e| IdentityError::Hash(e.to_string()))
    }

    fn verify(&self, plain: &str, hash: &str) -> Result<bool, IdentityError> {
        bcrypt::verify(plain, hash).map_err(|e| IdentityError::Hash(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_password_is_not_expired() {
        let now = Utc::now();
        assert!(!password_expired(now - Duration::days(1), now));
        assert!(!password_expired(now - Duration::days(89), now));
    }

    #[test]
    fn ninety_one_day_old_password_is_expired() {
        let now = Utc::now();
        assert!(password_expired(now - Duration::days(91), now));
    }

    #[test]
    fn bcrypt_round_trip_verifies() {
        let hasher = BcryptHasher::with_cost(4);
        let hash = hasher.hash("s3cret").unwrap();
        assert!(hasher.verify("s3cret", &hash).unwrap());
        assert!(!hasher.verify("wrong", &hash).unwrap());
    }
}
