use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tally_core::{JournalId, UserId};
use tally_journal::{JournalFilter, JournalStatus, NewJournalEntry};

use crate::errors::{journal_error_to_response, json_error};
use crate::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/search", get(search_entries))
        .route("/:id", get(get_entry))
        .route("/:id/approve", post(approve_entry))
        .route("/:id/reject", post(reject_entry))
        .route("/:id/documents", post(attach_documents))
}

fn parse_journal_id(raw: &str) -> Result<JournalId, axum::response::Response> {
    raw.parse::<JournalId>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))
}

/// Mirrors the client payload: parallel accounts/debits/credits arrays.
#[derive(Debug, Deserialize)]
struct CreateJournalRequest {
    transaction_date: DateTime<Utc>,
    accounts: Vec<i64>,
    debits: Vec<i64>,
    credits: Vec<i64>,
    #[serde(default)]
    description: String,
    created_by: UserId,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    approver_id: UserId,
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    comment: String,
}

#[derive(Debug, Deserialize)]
struct AttachRequest {
    documents: serde_json::Value,
}

async fn create_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CreateJournalRequest>,
) -> axum::response::Response {
    let entry = NewJournalEntry::from_parallel(
        body.transaction_date,
        &body.accounts,
        &body.debits,
        &body.credits,
        body.description,
        body.created_by,
    );

    match services.journal.create_entry(&entry).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "journal_id": id,
                "message": "Journal entry created successfully",
            })),
        )
            .into_response(),
        Err(e) => journal_error_to_response(e),
    }
}

async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ListQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref() {
        Some(raw) => match JournalStatus::parse(raw) {
            Ok(s) => Some(s),
            Err(e) => return json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        },
        None => None,
    };

    let filter = JournalFilter {
        status,
        date_from: query.date_from,
        date_to: query.date_to,
    };

    match services.journal.entries(&filter).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => journal_error_to_response(e),
    }
}

async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_journal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.journal.entry(id).await {
        Ok(entry) => (StatusCode::OK, Json(entry)).into_response(),
        Err(e) => journal_error_to_response(e),
    }
}

async fn search_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SearchQuery>,
) -> axum::response::Response {
    match services.journal.search_entries(&query.q).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => journal_error_to_response(e),
    }
}

async fn approve_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> axum::response::Response {
    let id = match parse_journal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.journal.approve_entry(id, body.approver_id).await {
        Ok(posted) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Journal entry approved, ledger entries created, account balances updated, and account events recorded successfully",
                "ledger_entries": posted,
            })),
        )
            .into_response(),
        Err(e) => journal_error_to_response(e),
    }
}

async fn reject_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> axum::response::Response {
    let id = match parse_journal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.journal.reject_entry(id, &body.comment).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Journal entry rejected successfully",
            })),
        )
            .into_response(),
        Err(e) => journal_error_to_response(e),
    }
}

async fn attach_documents(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<AttachRequest>,
) -> axum::response::Response {
    let id = match parse_journal_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let blob = match serde_json::to_vec(&body.documents) {
        Ok(blob) => blob,
        Err(e) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("documents are not serializable: {e}"),
            )
        }
    };

    match services.journal.attach_documents(id, &blob).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Source documents attached successfully",
            })),
        )
            .into_response(),
        Err(e) => journal_error_to_response(e),
    }
}
