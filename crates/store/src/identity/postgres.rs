//! Postgres-backed identity store.
//!
//! Account creation inserts user, password, and role assignment in one
//! transaction; the original three-statement sequence could leave a user
//! without a password or role on a mid-flight failure. Unique-constraint
//! violations (Postgres `23505`) on username/email map to `DuplicateUser`,
//! covering the race between the existence check and the insert.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use tally_core::UserId;
use tally_identity::{IdentityError, NewUser, Role};

use super::{CurrentCredential, IdentityStore, UserRecord};

#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn map_sqlx_error(op: &'static str, err: sqlx::Error) -> IdentityError {
    if is_unique_violation(&err) {
        return IdentityError::DuplicateUser;
    }
    IdentityError::persistence(format!("{op}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn record_from_row(row: &PgRow) -> Result<UserRecord, IdentityError> {
    let user_id: uuid::Uuid = row
        .try_get("user_id")
        .map_err(|e| map_sqlx_error("decode_user_row", e))?;
    let first_name: String = row
        .try_get("first_name")
        .map_err(|e| map_sqlx_error("decode_user_row", e))?;
    let last_name: String = row
        .try_get("last_name")
        .map_err(|e| map_sqlx_error("decode_user_row", e))?;
    let username: String = row
        .try_get("username")
        .map_err(|e| map_sqlx_error("decode_user_row", e))?;
    let email: String = row
        .try_get("email")
        .map_err(|e| map_sqlx_error("decode_user_row", e))?;

    Ok(UserRecord {
        user_id: UserId::from_uuid(user_id),
        first_name,
        last_name,
        username,
        email,
    })
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    #[instrument(skip(self, new, password_hash), fields(username = %new.username), err)]
    async fn create_user(
        &self,
        new: &NewUser,
        password_hash: &str,
        role: Role,
    ) -> Result<UserId, IdentityError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let existing = sqlx::query("SELECT 1 FROM users WHERE username = $1 OR email = $2")
            .bind(&new.username)
            .bind(&new.email)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_user", e))?;
        if existing.is_some() {
            return Err(IdentityError::DuplicateUser);
        }

        let user_id = UserId::new();

        sqlx::query(
            r#"
            INSERT INTO users (user_id, first_name, last_name, username, email)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.username)
        .bind(&new.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_passwords (user_id, password_hash, is_current)
            VALUES ($1, $2, TRUE)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(password_hash)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, role_id FROM roles WHERE role_name = $2
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))?;

        Ok(user_id)
    }

    #[instrument(skip(self, username), err)]
    async fn user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, IdentityError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, first_name, last_name, username, email
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("user_by_username", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn current_credential(
        &self,
        user_id: UserId,
    ) -> Result<Option<CurrentCredential>, IdentityError> {
        let row = sqlx::query(
            r#"
            SELECT p.password_hash, p.created_at, r.role_name
            FROM user_passwords p
            JOIN user_roles ur ON p.user_id = ur.user_id
            JOIN roles r ON ur.role_id = r.role_id
            WHERE p.user_id = $1 AND p.is_current = TRUE
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("current_credential", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let password_hash: String = row
            .try_get("password_hash")
            .map_err(|e| map_sqlx_error("current_credential", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("current_credential", e))?;
        let role_name: String = row
            .try_get("role_name")
            .map_err(|e| map_sqlx_error("current_credential", e))?;
        let role = Role::parse(&role_name).ok_or_else(|| {
            IdentityError::persistence(format!("unknown role_name '{role_name}'"))
        })?;

        Ok(Some(CurrentCredential {
            password_hash,
            created_at,
            role,
        }))
    }
}
