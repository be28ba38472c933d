use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tally_core::DomainError;
use tally_identity::IdentityError;
use tally_store::JournalStoreError;

pub fn journal_error_to_response(err: JournalStoreError) -> axum::response::Response {
    match err {
        JournalStoreError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        JournalStoreError::Domain(DomainError::InvalidId(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
        }
        JournalStoreError::Domain(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "journal entry not found")
        }
        JournalStoreError::Domain(DomainError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        JournalStoreError::Persistence { .. } => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            err.to_string(),
        ),
    }
}

pub fn identity_error_to_response(err: IdentityError) -> axum::response::Response {
    match err {
        IdentityError::InvalidCredentials => json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            err.to_string(),
        ),
        IdentityError::NoCurrentPassword => json_error(
            StatusCode::FORBIDDEN,
            "no_current_password",
            err.to_string(),
        ),
        // Message shape is load-bearing: the client branches on it to send
        // the user to the reset flow.
        IdentityError::PasswordExpired => {
            json_error(StatusCode::FORBIDDEN, "password_expired", "Password is Expired")
        }
        IdentityError::DuplicateUser => {
            json_error(StatusCode::CONFLICT, "duplicate_user", err.to_string())
        }
        IdentityError::Hash(_) | IdentityError::Persistence(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
