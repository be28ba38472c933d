//! `tally-identity`: users, roles, and the password policy.
//!
//! Pure identity domain: who a user is, what role they carry, and whether a
//! stored password is still acceptable. Persistence lives in `tally-store`;
//! hashing is behind the [`PasswordHasher`] trait so the store and tests can
//! swap the bcrypt implementation out.

pub mod error;
pub mod password;
pub mod user;

pub use error::IdentityError;
pub use password::{password_expired, BcryptHasher, PasswordHasher, PASSWORD_MAX_AGE_DAYS};
pub use user::{NewUser, Role, User};
